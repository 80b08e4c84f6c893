//! Per-window statistics: trimmed mean, deviation, kept bounds, records and
//! record-break thresholds.

use std::fmt;

use crate::ds::OrderStatTree;
use crate::reading::{Comparator, Mean, Reading};

/// Statistics of one window of readings after trimming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Trimmed mean, or [`Mean::Dnf`] when fewer than `N - trim` readings
    /// finished.
    pub mean: Mean,
    /// Sample standard deviation of the kept readings, in seconds. Zero when
    /// the mean is DNF or only one value is kept.
    pub deviation: f64,
    /// Smallest kept reading.
    pub lower: Reading,
    /// Largest kept reading.
    pub upper: Reading,
}

impl WindowStats {
    /// Result for a window that keeps nothing after trimming.
    pub const fn degenerate() -> Self {
        Self {
            mean: Mean::Dnf,
            deviation: 0.0,
            lower: Reading::Dnf,
            upper: Reading::Dnf,
        }
    }

    /// Measures a full window held in `tree`, dropping `trim` entries from
    /// each end. Returns the stats and the exact sum of kept measures.
    ///
    /// Callers guarantee `tree.len() > 2 * trim`.
    pub(crate) fn measure<C>(tree: &OrderStatTree<Reading, usize, C>, trim: usize) -> (Self, i128)
    where
        C: Comparator<Reading>,
    {
        let size = tree.len();
        let keep_end = size - trim;
        let neff = keep_end - trim;
        let sum = tree.cum_sum(keep_end) - tree.cum_sum(trim);
        let sum_sq = tree.cum_sum_sq(keep_end) - tree.cum_sum_sq(trim);
        let lower = tree.rank(trim).copied().unwrap_or(Reading::Dnf);
        let upper = tree.rank(keep_end - 1).copied().unwrap_or(Reading::Dnf);

        if tree.rank_of(&Reading::Dnf) < keep_end {
            let stats = Self {
                mean: Mean::Dnf,
                deviation: 0.0,
                lower,
                upper,
            };
            return (stats, sum);
        }

        let n = neff as i128;
        let deviation = if neff > 1 {
            // n * sum(x^2) - sum(x)^2 is exact and never negative.
            let spread = (n * sum_sq - sum * sum).max(0);
            (spread as f64 / (n * (n - 1)) as f64).sqrt() / 1000.0
        } else {
            0.0
        };
        let stats = Self {
            mean: Mean::Finite(sum as f64 / neff as f64),
            deviation,
            lower,
            upper,
        };
        (stats, sum)
    }
}

impl Default for WindowStats {
    fn default() -> Self {
        Self::degenerate()
    }
}

impl fmt::Display for WindowStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (σ={:.2}, {}..{})",
            self.mean, self.deviation, self.lower, self.upper
        )
    }
}

/// A record-setting window: its stats and the position of its oldest reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestRecord {
    pub stats: WindowStats,
    pub start_index: usize,
    pub(crate) kept_sum: i128,
}

impl BestRecord {
    pub(crate) fn new(stats: WindowStats, start_index: usize, kept_sum: i128) -> Self {
        Self {
            stats,
            start_index,
            kept_sum,
        }
    }

    /// The record mean.
    pub fn mean(&self) -> Mean {
        self.stats.mean
    }
}

/// What the next finite reading has to be for a window to set a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    /// A next reading strictly below this many milliseconds sets a record.
    Below(i64),
    /// No next reading can set a record.
    Never,
    /// Any finite next reading sets a record.
    Always,
}

impl Threshold {
    /// Numeric host encoding: `-1` for never, `-2` for always.
    pub fn as_millis(self) -> i64 {
        match self {
            Threshold::Below(ms) => ms,
            Threshold::Never => -1,
            Threshold::Always => -2,
        }
    }

    /// Returns `true` if a next reading of `millis` would set a record.
    pub fn is_broken_by(self, millis: i64) -> bool {
        match self {
            Threshold::Below(ms) => millis < ms,
            Threshold::Never => false,
            Threshold::Always => true,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Below(ms) => write!(f, "<{ms}ms"),
            Threshold::Never => f.write_str("never"),
            Threshold::Always => f.write_str("always"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(values: &[i64]) -> OrderStatTree<Reading> {
        let mut tree = OrderStatTree::new();
        for (pos, &ms) in values.iter().enumerate() {
            tree.insert(Reading::from_millis(ms), pos);
        }
        tree
    }

    #[test]
    fn untrimmed_mean_and_bounds() {
        let (stats, sum) = WindowStats::measure(&window(&[1000, 2000, 3000]), 0);
        assert_eq!(stats.mean, Mean::Finite(2000.0));
        assert_eq!(stats.lower, Reading::Finite(1000));
        assert_eq!(stats.upper, Reading::Finite(3000));
        assert_eq!(sum, 6000);
        assert!((stats.deviation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn any_dnf_spoils_untrimmed_mean() {
        let (stats, _) = WindowStats::measure(&window(&[1000, -1, 3000]), 0);
        assert_eq!(stats.mean, Mean::Dnf);
        assert_eq!(stats.deviation, 0.0);
        assert_eq!(stats.upper, Reading::Dnf);
    }

    #[test]
    fn trimmed_mean_keeps_middle() {
        let (stats, sum) = WindowStats::measure(&window(&[5000, 1000, 3000, 2000, 4000]), 1);
        assert_eq!(stats.mean, Mean::Finite(3000.0));
        assert_eq!(sum, 9000);
        assert_eq!(stats.lower, Reading::Finite(2000));
        assert_eq!(stats.upper, Reading::Finite(4000));
    }

    /// Sample standard deviation of the sorted middle, in seconds.
    fn naive_deviation(values: &[i64], trim: usize) -> f64 {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let kept = &sorted[trim..sorted.len() - trim];
        let n = kept.len() as f64;
        let mean = kept.iter().sum::<i64>() as f64 / n;
        let var = kept.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt() / 1000.0
    }

    #[test]
    fn trimmed_deviation_covers_kept_values_only() {
        let values = [5000, 1000, 3000, 2000, 4000];
        let (stats, _) = WindowStats::measure(&window(&values), 1);
        assert!((stats.deviation - 1.0).abs() < 1e-12);
        assert!((stats.deviation - naive_deviation(&values, 1)).abs() < 1e-12);

        let values = [9870, 12_004, 8123, 30_000, 10_555, 9_999, 11_230, 7_001, 10_420];
        for trim in [1, 2, 3] {
            let (stats, _) = WindowStats::measure(&window(&values), trim);
            let expected = naive_deviation(&values, trim);
            assert!(
                (stats.deviation - expected).abs() < 1e-9,
                "trim {trim}: {} vs {expected}",
                stats.deviation
            );
        }
    }

    #[test]
    fn one_dnf_is_trimmed_away() {
        let (stats, _) = WindowStats::measure(&window(&[5000, -1, 3000, 2000, 4000]), 1);
        assert_eq!(stats.mean, Mean::Finite(4000.0));
        let (stats, _) = WindowStats::measure(&window(&[-1, -1, 3000, 2000, 4000]), 1);
        assert_eq!(stats.mean, Mean::Dnf);
    }

    #[test]
    fn single_kept_value_has_zero_deviation() {
        let (stats, _) = WindowStats::measure(&window(&[7, 3, 5]), 1);
        assert_eq!(stats.mean, Mean::Finite(5.0));
        assert_eq!(stats.deviation, 0.0);
    }

    #[test]
    fn threshold_encoding() {
        assert_eq!(Threshold::Never.as_millis(), -1);
        assert_eq!(Threshold::Always.as_millis(), -2);
        assert!(Threshold::Below(900).is_broken_by(899));
        assert!(!Threshold::Below(900).is_broken_by(900));
        assert_eq!(Threshold::Below(900).to_string(), "<900ms");
    }

    #[test]
    fn degenerate_is_dnf_everywhere() {
        let stats = WindowStats::degenerate();
        assert!(stats.mean.is_dnf());
        assert!(stats.lower.is_dnf() && stats.upper.is_dnf());
        assert_eq!(WindowStats::default(), stats);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[cfg_attr(miri, ignore)]
            #[test]
            fn deviation_matches_naive(
                values in prop::collection::vec(0i64..60_000, 3..40),
                trim in 0usize..5,
            ) {
                prop_assume!(values.len() > 2 * trim + 1);
                let (stats, _) = WindowStats::measure(&window(&values), trim);
                let expected = naive_deviation(&values, trim);
                prop_assert!((stats.deviation - expected).abs() <= 1e-9 * expected.max(1.0));
            }
        }
    }
}
