//! Performance regression tests
//!
//! These tests verify complexity guarantees and catch major performance regressions.
//! They are NOT micro-benchmarks - use `cargo bench` for detailed performance analysis.
//!
//! ## Purpose
//!
//! - Verify logarithmic cost for append, pop and tree updates
//! - Verify that window size barely affects per-append cost
//! - Catch catastrophic regressions such as recomputing windows from scratch
//!
//! ## What NOT to test here
//!
//! - Exact nanosecond timings (use benchmarks)
//! - Detailed throughput analysis (use benchmarks)

use std::time::{Duration, Instant};

use timestat::config::{StatsConfig, TrimPolicy, WindowSpec};
use timestat::ds::OrderStatTree;
use timestat::engine::StatsEngine;
use timestat::range::sliding_window_stats;
use timestat::reading::{NaturalOrder, Reading};

/// Helper to measure operation duration
fn measure_time<F, R>(operation: F) -> (R, Duration)
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let result = operation();
    (result, start.elapsed())
}

fn session(len: usize) -> Vec<i64> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            if state % 40 == 0 {
                -1
            } else {
                7_000 + (state % 10_000) as i64
            }
        })
        .collect()
}

/// Asserts per-item time grows far slower than input size.
fn assert_sublinear(name: &str, sizes: &[usize], per_item: &[f64]) {
    for i in 1..per_item.len() {
        let size_ratio = sizes[i] as f64 / sizes[i - 1] as f64;
        let time_ratio = per_item[i] / per_item[i - 1];

        println!(
            "[{}] Size {}→{} ({:.2}x): time {:.1}ns→{:.1}ns ({:.2}x)",
            name,
            sizes[i - 1],
            sizes[i],
            size_ratio,
            per_item[i - 1],
            per_item[i],
            time_ratio
        );

        assert!(
            time_ratio < 15.0,
            "[{}] per-item cost appears to be linear:\n\
             Size increased by {:.2}x but time increased by {:.2}x",
            name,
            size_ratio,
            time_ratio
        );
    }
}

// =============================================================================
// Complexity Tests - Verify logarithmic behavior
// =============================================================================

mod complexity_tree {
    use super::*;

    #[test]
    fn test_insert_remove_is_logarithmic() {
        let sizes = [2_000, 4_000, 8_000, 16_000];
        let mut per_item = Vec::new();

        for &size in &sizes {
            let times = session(size);
            let (_, duration) = measure_time(|| {
                let mut tree = OrderStatTree::new();
                for (pos, &ms) in times.iter().enumerate() {
                    tree.insert(Reading::from_millis(ms), pos);
                }
                for &ms in &times {
                    tree.remove(&Reading::from_millis(ms));
                }
                tree.len()
            });
            let avg = duration.as_nanos() as f64 / (2 * size) as f64;
            println!("[tree] Size: {}, Avg op time: {:.2} ns", size, avg);
            per_item.push(avg);
        }

        assert_sublinear("tree", &sizes, &per_item);
    }

    #[test]
    fn test_rank_queries_are_logarithmic() {
        let sizes = [2_000, 4_000, 8_000, 16_000];
        let mut per_item = Vec::new();

        for &size in &sizes {
            let times = session(size);
            let mut tree = OrderStatTree::new();
            for (pos, &ms) in times.iter().enumerate() {
                tree.insert(Reading::from_millis(ms), pos);
            }
            let (total, duration) = measure_time(|| {
                (0..size)
                    .map(|k| tree.cum_sum(k) + tree.rank(k).map_or(0, |r| r.as_millis() as i128))
                    .fold(0i128, i128::wrapping_add)
            });
            std::hint::black_box(total);
            let avg = duration.as_nanos() as f64 / size as f64;
            per_item.push(avg);
        }

        assert_sublinear("tree rank", &sizes, &per_item);
    }
}

mod complexity_engine {
    use super::*;

    fn engine() -> StatsEngine {
        StatsEngine::new(StatsConfig::default())
    }

    #[test]
    fn test_append_is_logarithmic_in_session_length() {
        let sizes = [2_000, 4_000, 8_000, 16_000];
        let mut per_item = Vec::new();

        for &size in &sizes {
            let times = session(size);
            let mut engine = engine();
            let (_, duration) = measure_time(|| {
                for _ in 0..size {
                    engine.append_silent(&times);
                }
            });
            let avg = duration.as_nanos() as f64 / size as f64;
            println!("[engine] Size: {}, Avg append time: {:.2} ns", size, avg);
            per_item.push(avg);
        }

        assert_sublinear("engine append", &sizes, &per_item);
    }

    #[test]
    fn test_pop_is_logarithmic_in_session_length() {
        let sizes = [2_000, 4_000, 8_000, 16_000];
        let mut per_item = Vec::new();

        for &size in &sizes {
            let times = session(size);
            let mut engine = engine();
            engine.truncate(&times, size);
            let (_, duration) = measure_time(|| {
                for _ in 0..size {
                    engine.pop(&times);
                }
            });
            assert!(engine.is_empty());
            per_item.push(duration.as_nanos() as f64 / size as f64);
        }

        assert_sublinear("engine pop", &sizes, &per_item);
    }

    #[test]
    fn test_window_size_barely_affects_append() {
        let window_sizes = [12, 100, 1_000, 5_000];
        let times = session(20_000);
        let mut per_item = Vec::new();

        for &w in &window_sizes {
            let config = StatsConfig::builder()
                .window(WindowSpec::trimmed(w))
                .trim(TrimPolicy::Percent(5))
                .build();
            let mut engine = StatsEngine::new(config);
            let (_, duration) = measure_time(|| engine.truncate(&times, times.len()));
            per_item.push(duration.as_nanos() as f64 / times.len() as f64);
        }

        assert_sublinear("window size", &window_sizes, &per_item);
    }

    #[test]
    fn test_threshold_cost_independent_of_window_size() {
        let window_sizes = [12, 100, 1_000, 5_000];
        let times = session(10_000);
        let mut per_item = Vec::new();

        for &w in &window_sizes {
            let config = StatsConfig::builder().window(WindowSpec::trimmed(w)).build();
            let mut engine = StatsEngine::new(config);
            engine.truncate(&times, times.len());
            let (_, duration) = measure_time(|| {
                for _ in 0..1_000 {
                    std::hint::black_box(engine.record_break_thresholds(&times));
                }
            });
            per_item.push(duration.as_nanos() as f64 / 1_000.0);
        }

        assert_sublinear("threshold", &window_sizes, &per_item);
    }
}

// =============================================================================
// Reasonable bounds
// =============================================================================

mod bounds {
    use super::*;

    #[test]
    fn test_full_session_rebuild_is_fast() {
        let times = session(50_000);
        let mut engine = StatsEngine::new(StatsConfig::default());
        let (_, duration) = measure_time(|| engine.rebuild(&times, times.len()));
        println!("[bounds] rebuild of 50k readings: {:?}", duration);
        assert!(
            duration < Duration::from_secs(10),
            "rebuild of 50k readings took {:?}",
            duration
        );
    }

    #[test]
    fn test_sliding_range_is_fast() {
        let times = session(50_000);
        let (stats, duration) =
            measure_time(|| sliding_window_stats(&times, NaturalOrder, 0, times.len(), 100, 5));
        assert_eq!(stats.map(|s| s.len()).ok(), Some(50_000 - 99));
        assert!(
            duration < Duration::from_secs(5),
            "sliding ao100 over 50k readings took {:?}",
            duration
        );
    }
}
