//! Stateless queries over an arbitrary sub-range of a reading sequence.
//!
//! Both helpers build a private [`OrderStatTree`] per call and drop it on
//! return. [`StatsEngine`](crate::engine::StatsEngine) exposes wrappers that
//! fill in the configured trim policy and ordering.

use std::cmp::Ordering;

use crate::ds::OrderStatTree;
use crate::error::RangeError;
use crate::reading::{Comparator, Reading, ReadingSource};
use crate::window::WindowStats;

/// Statistics of every `size`-reading window inside `[start, start + length)`.
///
/// Returns `length - size + 1` results in order. A window that keeps nothing
/// after trimming yields the single [`WindowStats::degenerate`] result.
///
/// # Errors
///
/// [`RangeError`] when the range runs past `source`, or `size` is zero or
/// longer than the range.
///
/// ```
/// use timestat::range::sliding_window_stats;
/// use timestat::reading::{Mean, NaturalOrder};
///
/// let times: Vec<i64> = vec![1000, 2000, 3000, 4000];
/// let stats = sliding_window_stats(&times, NaturalOrder, 0, 4, 3, 0).unwrap();
/// let means: Vec<_> = stats.iter().map(|s| s.mean).collect();
/// assert_eq!(means, vec![Mean::Finite(2000.0), Mean::Finite(3000.0)]);
///
/// assert!(sliding_window_stats(&times, NaturalOrder, 2, 3, 3, 0).is_err());
/// ```
pub fn sliding_window_stats<S, C>(
    source: &S,
    order: C,
    start: usize,
    length: usize,
    size: usize,
    trim: usize,
) -> Result<Vec<WindowStats>, RangeError>
where
    S: ReadingSource + ?Sized,
    C: Comparator<Reading>,
{
    let out_of_range = start
        .checked_add(length)
        .is_none_or(|end| end > source.len());
    if out_of_range || size == 0 || size > length {
        return Err(RangeError {
            start,
            length,
            window: size,
            available: source.len(),
        });
    }
    if size <= trim.saturating_mul(2) {
        return Ok(vec![WindowStats::degenerate()]);
    }

    let mut tree = OrderStatTree::with_capacity_and_order(size, order);
    for pos in start..start + size {
        tree.insert(source.reading_at(pos), pos);
    }
    let mut results = Vec::with_capacity(length - size + 1);
    results.push(WindowStats::measure(&tree, trim).0);
    for pos in start + size..start + length {
        let leaving = source.reading_at(pos - size);
        let removed = tree.remove(&leaving);
        debug_assert!(removed.is_some(), "range window lost {leaving}");
        tree.insert(source.reading_at(pos), pos);
        results.push(WindowStats::measure(&tree, trim).0);
    }
    Ok(results)
}

/// Positions inside `[start, start + count)` excluded as trim outliers.
///
/// `lower` and `upper` are the kept extremes of the range. Readings strictly
/// outside them are always trimmed; readings equal to a bound fill whatever
/// of the `trim` slots on that side remain, later positions first. The
/// result is sorted.
///
/// # Errors
///
/// [`RangeError`] when the range runs past `source`.
///
/// ```
/// use timestat::range::trimmed_positions;
/// use timestat::reading::{NaturalOrder, Reading};
///
/// let times: Vec<i64> = vec![2000, 1000, 2000, 3000, 2000];
/// let trimmed = trimmed_positions(
///     &times,
///     &NaturalOrder,
///     0,
///     5,
///     1,
///     Reading::Finite(2000),
///     Reading::Finite(2000),
/// )
/// .unwrap();
/// assert_eq!(trimmed, vec![1, 3]);
/// ```
pub fn trimmed_positions<S, C>(
    source: &S,
    order: &C,
    start: usize,
    count: usize,
    trim: usize,
    lower: Reading,
    upper: Reading,
) -> Result<Vec<usize>, RangeError>
where
    S: ReadingSource + ?Sized,
    C: Comparator<Reading> + ?Sized,
{
    let end = match start.checked_add(count) {
        Some(end) if end <= source.len() => end,
        _ => {
            return Err(RangeError {
                start,
                length: count,
                window: count,
                available: source.len(),
            });
        }
    };
    if trim == 0 {
        return Ok(Vec::new());
    }

    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut low_ties = Vec::new();
    let mut high_ties = Vec::new();
    for pos in start..end {
        let reading = source.reading_at(pos);
        let below = order.compare(&reading, &lower);
        let above = order.compare(&upper, &reading);
        if below == Ordering::Less {
            low.push(pos);
        } else if above == Ordering::Less {
            high.push(pos);
        } else {
            if below == Ordering::Equal {
                low_ties.push(pos);
            }
            if above == Ordering::Equal {
                high_ties.push(pos);
            }
        }
    }

    fill(&mut low, &low_ties, trim, &[]);
    fill(&mut high, &high_ties, trim, &low);
    low.extend(high);
    low.sort_unstable();
    Ok(low)
}

/// Keeps the latest `trim` strict outliers, then tops up from `ties`
/// (latest first) skipping anything in `taken`.
fn fill(side: &mut Vec<usize>, ties: &[usize], trim: usize, taken: &[usize]) {
    if side.len() > trim {
        side.drain(..side.len() - trim);
    }
    for &pos in ties.iter().rev() {
        if side.len() >= trim {
            break;
        }
        if !taken.contains(&pos) {
            side.push(pos);
        }
    }
}
