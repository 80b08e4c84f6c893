//! Example walking through the StatsEngine API on a short session.
//!
//! Run with: cargo run --example basic_engine

use timestat::config::{StatsConfig, TrimPolicy, WindowSpec};
use timestat::engine::{RecordEvent, StatsEngine};
use timestat::range::{sliding_window_stats, trimmed_positions};
use timestat::reading::NaturalOrder;

fn main() {
    println!("=== StatsEngine Example ===\n");

    let config = StatsConfig::builder()
        .windows([WindowSpec::untrimmed(3), WindowSpec::trimmed(5)])
        .trim(TrimPolicy::Fixed(1))
        .build();

    // The host owns the readings; the engine only tracks how far it has read.
    let mut times: Vec<i64> = Vec::new();
    let mut engine =
        StatsEngine::new(config).with_sink(|event: &RecordEvent| println!("   >> {event}"));

    // Example 1: appending readings one at a time
    println!("1. Appending readings");
    for ms in [12_340, 11_020, -1, 10_870, 11_500, 9_990, 10_420] {
        times.push(ms);
        engine.append(&times);
        let mo3 = engine
            .current_window(0)
            .map_or("-".to_string(), |s| s.mean.to_string());
        let ao5 = engine
            .current_window(1)
            .map_or("-".to_string(), |s| s.mean.to_string());
        println!("   #{:<2} {:>6}  mo3 {:>8}  ao5 {:>8}", times.len(), ms, mo3, ao5);
    }
    println!();

    // Example 2: session summary
    println!("2. Session summary");
    let stats = engine.current_stats();
    println!("   DNFs: {}, mean: {}", stats.dnf_count, stats.mean);
    if let Some(spread) = engine.spread() {
        println!(
            "   best {} / worst {} (bucket {} ms)",
            spread.best, spread.worst, spread.bucket
        );
    }
    for (j, spec) in engine.window_specs().enumerate() {
        if let Some(best) = engine.best_of_window(j) {
            println!("   best {spec}: {} starting at #{}", best.mean(), best.start_index + 1);
        }
    }
    println!();

    // Example 3: what the next reading needs to set a record
    println!("3. Record-break thresholds");
    let thresholds = engine.record_break_thresholds(&times);
    for (spec, threshold) in engine.window_specs().zip(thresholds) {
        match threshold {
            Some(t) => println!("   {spec}: {t}"),
            None => println!("   {spec}: not enough readings"),
        }
    }
    println!();

    // Example 4: undo the last reading
    println!("4. Undo");
    engine.pop(&times);
    times.pop();
    println!("   length after pop: {}", engine.len());
    println!();

    // Example 5: range helpers over an arbitrary slice of the session
    println!("5. Range helpers");
    if let Ok(stats) = sliding_window_stats(&times, NaturalOrder, 0, times.len(), 5, 1) {
        for (i, window) in stats.iter().enumerate() {
            if let Ok(trimmed) =
                trimmed_positions(&times, &NaturalOrder, i, 5, 1, window.lower, window.upper)
            {
                println!("   ao5 at #{}: {window}, trimmed {:?}", i + 1, trimmed);
            }
        }
    }
}
