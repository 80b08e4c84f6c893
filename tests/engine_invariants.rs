// ==============================================
// ENGINE INVARIANT TESTS (integration)
// ==============================================
//
// Properties that span the engine, the range helpers and the tree. Window
// statistics are checked against a naive sort-and-sum recomputation.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use timestat::prelude::*;
use timestat::range::sliding_window_stats;

/// Sorts the window and averages the kept middle, the slow way.
fn naive_mean(window: &[i64], trim: usize) -> Mean {
    let mut sorted: Vec<Reading> = window.iter().map(|&ms| Reading::from_millis(ms)).collect();
    sorted.sort();
    let kept = &sorted[trim..sorted.len() - trim];
    if kept.iter().any(|r| r.is_dnf()) {
        return Mean::Dnf;
    }
    let sum: i64 = kept.iter().filter_map(|r| r.finite()).sum();
    Mean::Finite(sum as f64 / kept.len() as f64)
}

fn config(windows: &[WindowSpec], trim: TrimPolicy) -> StatsConfig {
    StatsConfig::builder()
        .windows(windows.iter().copied())
        .trim(trim)
        .build()
}

fn random_session(rng: &mut StdRng, len: usize) -> Vec<i64> {
    (0..len)
        .map(|_| {
            if rng.gen_ratio(1, 20) {
                -1
            } else {
                rng.gen_range(5_000..15_000)
            }
        })
        .collect()
}

// ==============================================
// Concrete scenarios
// ==============================================

mod scenarios {
    use super::*;

    #[test]
    fn mean_of_three() {
        let times: Vec<i64> = vec![1000, 2000, 3000];
        let mut engine = StatsEngine::new(config(&[WindowSpec::untrimmed(3)], TrimPolicy::default()));
        engine.truncate(&times, 3);
        let stats = engine.current_window(0).unwrap();
        assert_eq!(stats.mean, Mean::Finite(2000.0));
        assert_eq!(stats.lower, Reading::Finite(1000));
        assert_eq!(stats.upper, Reading::Finite(3000));
        assert_eq!(engine.current_stats().dnf_count, 0);
    }

    #[test]
    fn mean_of_three_with_dnf() {
        let times: Vec<i64> = vec![1000, -1, 3000];
        let mut engine = StatsEngine::new(config(&[WindowSpec::untrimmed(3)], TrimPolicy::default()));
        engine.truncate(&times, 3);
        assert_eq!(engine.current_window(0).unwrap().mean, Mean::Dnf);
        assert_eq!(engine.current_window(0).unwrap().mean.as_millis(), -1.0);
    }

    #[test]
    fn average_of_five_trim_one() {
        let times: Vec<i64> = vec![5000, 1000, 3000, 2000, 4000];
        let mut engine = StatsEngine::new(config(&[WindowSpec::trimmed(5)], TrimPolicy::Fixed(1)));
        engine.truncate(&times, 5);
        let stats = engine.current_window(0).unwrap();
        assert_eq!(stats.mean, Mean::Finite(3000.0));
        assert_eq!((stats.lower, stats.upper), (Reading::Finite(2000), Reading::Finite(4000)));
    }

    #[test]
    fn threshold_predicts_next_record() {
        let base: Vec<i64> = vec![1500, 1300, 1400];
        let mut engine = StatsEngine::new(config(&[WindowSpec::untrimmed(3)], TrimPolicy::default()));
        engine.truncate(&base, 3);
        let Some(Threshold::Below(limit)) = engine.record_break_thresholds(&base)[0] else {
            panic!("expected a finite threshold");
        };

        for (next, expect_record) in [(limit - 1, true), (limit + 1, false)] {
            let mut times = base.clone();
            times.push(next);
            let mut trial = engine.clone();
            let event = trial.append(&times);
            assert_eq!(trial.best_history(0).len(), if expect_record { 2 } else { 1 });
            let announced = event.is_some_and(|e| e.kinds().contains(&RecordKind::Window(WindowSpec::untrimmed(3))));
            assert_eq!(announced, expect_record);
        }
    }

    #[test]
    fn default_windows_follow_host_defaults() {
        let mut rng = StdRng::seed_from_u64(11);
        let times = random_session(&mut rng, 1200);
        let mut engine = StatsEngine::new(StatsConfig::default());
        engine.truncate(&times, times.len());
        let specs: Vec<String> = engine.window_specs().map(|w| w.to_string()).collect();
        assert_eq!(specs, ["mo3", "ao5", "ao12", "ao50", "ao100", "ao1000"]);
        assert!(engine.current_window(5).is_some());
        engine.check_invariants(&times).unwrap();
    }
}

// ==============================================
// Engine vs. naive recomputation
// ==============================================

mod naive_agreement {
    use super::*;

    #[test]
    fn every_append_matches_naive_mean() {
        let mut rng = StdRng::seed_from_u64(5);
        let times = random_session(&mut rng, 300);
        let windows = [WindowSpec::untrimmed(3), WindowSpec::trimmed(5), WindowSpec::trimmed(12)];
        let policy = TrimPolicy::Percent(5);
        let mut engine = StatsEngine::new(config(&windows, policy));

        for len in 1..=times.len() {
            engine.append(&times);
            for (j, spec) in windows.iter().enumerate() {
                let size = spec.size();
                let got = engine.current_window(j).map(|s| s.mean);
                let want = (len >= size).then(|| naive_mean(&times[len - size..len], spec.trim(policy)));
                assert_eq!(got, want, "window {spec} at length {len}");
            }
        }
    }

    #[test]
    fn session_mean_ignores_dnf() {
        let times: Vec<i64> = vec![1000, -1, 2000, -1, 6000];
        let mut engine = StatsEngine::new(config(&[], TrimPolicy::default()));
        engine.truncate(&times, times.len());
        let stats = engine.current_stats();
        assert_eq!(stats.dnf_count, 2);
        assert_eq!(stats.mean, Mean::Finite(3000.0));
    }
}

// ==============================================
// Helper vs. engine
// ==============================================

proptest! {
    /// Sliding over a range reproduces the engine's per-append window stats.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_helper_matches_engine(
        times in prop::collection::vec(prop_oneof![1 => Just(-1i64), 8 => 0i64..100], 1..80),
        size in 1usize..8,
        trim in 0usize..3,
    ) {
        prop_assume!(size > 2 * trim);
        let spec = WindowSpec::trimmed(size);
        let mut engine = StatsEngine::new(config(&[spec], TrimPolicy::Fixed(trim)));

        let mut per_append = Vec::new();
        for _ in 0..times.len() {
            engine.append(&times);
            if let Some(stats) = engine.current_window(0) {
                per_append.push(*stats);
            }
        }

        match sliding_window_stats(&times, NaturalOrder, 0, times.len(), size, trim) {
            Ok(helper) => prop_assert_eq!(helper, per_append),
            Err(_) => prop_assert!(size > times.len()),
        }
    }

    /// Popping one reading restores exactly the state before it was appended.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_pop_inverts_append(
        times in prop::collection::vec(prop_oneof![1 => Just(-1i64), 8 => 0i64..100], 1..60),
    ) {
        let windows = [WindowSpec::untrimmed(3), WindowSpec::trimmed(5)];
        let mut engine = StatsEngine::new(config(&windows, TrimPolicy::Fixed(1)));
        engine.truncate(&times, times.len() - 1);
        let before: Vec<_> = (0..2)
            .map(|j| (engine.best_history(j).to_vec(), engine.current_window(j).copied()))
            .collect();

        engine.append(&times);
        engine.pop(&times);
        let after: Vec<_> = (0..2)
            .map(|j| (engine.best_history(j).to_vec(), engine.current_window(j).copied()))
            .collect();
        prop_assert_eq!(before, after);
        prop_assert!(engine.check_invariants(&times).is_ok());
    }

    /// Trimmed positions hold exactly the readings outside the kept bounds.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_trimmed_positions_complement_kept(
        times in prop::collection::vec(0i64..20, 3..40),
        trim in 1usize..3,
    ) {
        let count = times.len();
        prop_assume!(count > 2 * trim);
        let stats = sliding_window_stats(&times, NaturalOrder, 0, count, count, trim).unwrap();
        let (lower, upper) = (stats[0].lower, stats[0].upper);
        let trimmed = timestat::range::trimmed_positions(
            &times, &NaturalOrder, 0, count, trim, lower, upper,
        ).unwrap();
        prop_assert_eq!(trimmed.len(), 2 * trim);

        let kept_sum: i64 = (0..count)
            .filter(|p| !trimmed.contains(p))
            .map(|p| times[p])
            .sum();
        let mean = stats[0].mean.finite().unwrap();
        prop_assert!((kept_sum as f64 / (count - 2 * trim) as f64 - mean).abs() < 1e-9);
    }
}
