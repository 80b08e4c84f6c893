#![no_main]

use libfuzzer_sys::fuzz_target;
use timestat::config::{StatsConfig, TrimPolicy, WindowSpec};
use timestat::engine::StatsEngine;

// Fuzz arbitrary append / pop / truncate sequences on StatsEngine
//
// The host sequence grows and shrinks with the engine. After every step the
// engine must agree with its own invariant check, and at the end with a
// fresh rebuild of the same prefix.
fuzz_target!(|data: &[u8]| {
    let config = StatsConfig::builder()
        .windows([WindowSpec::untrimmed(3), WindowSpec::trimmed(5), WindowSpec::trimmed(12)])
        .trim(TrimPolicy::Fixed(1))
        .build();
    let mut engine = StatsEngine::new(config.clone());
    let mut times: Vec<i64> = Vec::new();

    for chunk in data.chunks_exact(2) {
        match chunk[0] % 4 {
            0 | 1 => {
                times.push(if chunk[1] == 0 { -1 } else { 100 * i64::from(chunk[1]) });
                engine.append(&times);
            }
            2 => {
                engine.pop(&times);
                times.pop();
            }
            3 => {
                let target = usize::from(chunk[1]) % (times.len() + 1);
                engine.truncate(&times, target);
                times.truncate(target);
            }
            _ => unreachable!(),
        }
        assert_eq!(engine.len(), times.len());
        engine.check_invariants(&times).unwrap();
        let _ = engine.record_break_thresholds(&times);
    }

    let mut fresh = StatsEngine::new(config);
    fresh.truncate(&times, times.len());
    for j in 0..3 {
        assert_eq!(engine.current_window(j), fresh.current_window(j));
        assert_eq!(engine.best_history(j), fresh.best_history(j));
    }
});
