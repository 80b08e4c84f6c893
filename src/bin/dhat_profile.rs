//! DHAT heap profiler for timestat.
//!
//! Run with: cargo run --bin dhat_profile --release --features dhat-heap
//! View results: Open dhat-heap.json in <https://nnethercote.github.io/dh_view/dh_view.html>

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use timestat::config::{StatsConfig, TrimPolicy, WindowSpec};
use timestat::ds::OrderStatTree;
use timestat::engine::StatsEngine;
use timestat::range::sliding_window_stats;
use timestat::reading::{NaturalOrder, Reading};

/// Simple XorShift64 RNG for deterministic workloads.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

/// Readings between 8s and 20s with roughly 3% DNFs.
fn session(len: usize, seed: u64) -> Vec<i64> {
    let mut rng = XorShift64::new(seed);
    (0..len)
        .map(|_| {
            if rng.next_u64() % 32 == 0 {
                -1
            } else {
                8_000 + (rng.next_u64() % 12_000) as i64
            }
        })
        .collect()
}

fn profile_tree() {
    println!("=== Profiling OrderStatTree ===");
    let times = session(100_000, 7);
    let mut tree = OrderStatTree::new();
    for (pos, &ms) in times.iter().enumerate() {
        tree.insert(Reading::from_millis(ms), pos);
    }
    for &ms in times.iter().step_by(2) {
        tree.remove(&Reading::from_millis(ms));
    }
    println!("  Final size: {}", tree.len());
}

fn profile_engine_appends() {
    println!("=== Profiling StatsEngine appends ===");
    let times = session(50_000, 42);
    let mut engine = StatsEngine::new(StatsConfig::default());
    for _ in 0..times.len() {
        engine.append_silent(&times);
    }
    println!("  Final length: {}", engine.len());
    println!("  ao100 records: {}", engine.best_history(4).len());
}

fn profile_engine_truncate() {
    println!("=== Profiling StatsEngine truncate churn ===");
    let times = session(20_000, 99);
    let config = StatsConfig::builder()
        .windows([WindowSpec::untrimmed(3), WindowSpec::trimmed(5), WindowSpec::trimmed(12)])
        .trim(TrimPolicy::Percent(5))
        .build();
    let mut engine = StatsEngine::new(config);
    for target in [20_000, 5_000, 15_000, 0, 10_000] {
        engine.truncate(&times, target);
    }
    println!("  Final length: {}", engine.len());
}

fn profile_range() {
    println!("=== Profiling sliding_window_stats ===");
    let times = session(50_000, 3);
    let stats = sliding_window_stats(&times, NaturalOrder, 0, times.len(), 100, 5);
    println!("  Windows: {}", stats.map_or(0, |s| s.len()));
}

fn main() {
    let _profiler = dhat::Profiler::new_heap();

    println!("timestat DHAT Heap Profiling");
    println!("============================\n");

    profile_tree();
    profile_engine_appends();
    profile_engine_truncate();
    profile_range();

    println!("\n============================");
    println!("Profiling complete!");
    println!(
        "View results: Open dhat-heap.json in <https://nnethercote.github.io/dh_view/dh_view.html>"
    );
}
