//! Timing readings, averages and the orderings used to rank them.
//!
//! A [`Reading`] is either a finite time in milliseconds or a DNF
//! ("did not finish"). DNF sorts after every finite value. The numeric
//! sentinel `-1` only exists at the boundary: [`Reading::from_millis`],
//! [`Reading::as_millis`] and [`Measure::measure`].
//!
//! ## Example
//!
//! ```
//! use timestat::reading::{Mean, Reading};
//!
//! let mut readings = vec![Reading::Dnf, Reading::Finite(900), Reading::Finite(850)];
//! readings.sort();
//! assert_eq!(readings, vec![Reading::Finite(850), Reading::Finite(900), Reading::Dnf]);
//!
//! assert_eq!(Reading::from_millis(-1), Reading::Dnf);
//! assert!(Mean::Finite(1200.0) < Mean::Dnf);
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Numeric sentinel used for DNF at numeric boundaries.
pub const DNF_SENTINEL: i64 = -1;

/// A single timing reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading {
    /// Finished, in milliseconds.
    Finite(i64),
    /// Did not finish.
    Dnf,
}

impl Reading {
    /// Converts a host value, mapping any negative value to [`Reading::Dnf`].
    pub fn from_millis(millis: i64) -> Self {
        if millis < 0 {
            Reading::Dnf
        } else {
            Reading::Finite(millis)
        }
    }

    /// Returns the host encoding (`-1` for DNF).
    pub fn as_millis(self) -> i64 {
        match self {
            Reading::Finite(ms) => ms,
            Reading::Dnf => DNF_SENTINEL,
        }
    }

    /// Returns the finite time, if any.
    pub fn finite(self) -> Option<i64> {
        match self {
            Reading::Finite(ms) => Some(ms),
            Reading::Dnf => None,
        }
    }

    pub fn is_dnf(self) -> bool {
        matches!(self, Reading::Dnf)
    }
}

impl Ord for Reading {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Reading::Finite(a), Reading::Finite(b)) => a.cmp(b),
            (Reading::Finite(_), Reading::Dnf) => Ordering::Less,
            (Reading::Dnf, Reading::Finite(_)) => Ordering::Greater,
            (Reading::Dnf, Reading::Dnf) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Reading {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i64> for Reading {
    fn from(millis: i64) -> Self {
        Reading::from_millis(millis)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Finite(ms) => write!(f, "{ms}ms"),
            Reading::Dnf => f.write_str("DNF"),
        }
    }
}

/// A (possibly trimmed) mean over readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mean {
    /// Mean in milliseconds.
    Finite(f64),
    /// Too many DNFs for a finite mean.
    Dnf,
}

impl Mean {
    pub fn finite(self) -> Option<f64> {
        match self {
            Mean::Finite(v) => Some(v),
            Mean::Dnf => None,
        }
    }

    pub fn is_dnf(self) -> bool {
        matches!(self, Mean::Dnf)
    }

    /// Returns the host encoding (`-1.0` for DNF).
    pub fn as_millis(self) -> f64 {
        match self {
            Mean::Finite(v) => v,
            Mean::Dnf => DNF_SENTINEL as f64,
        }
    }
}

impl Eq for Mean {}

impl Ord for Mean {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Mean::Finite(a), Mean::Finite(b)) => a.total_cmp(b),
            (Mean::Finite(_), Mean::Dnf) => Ordering::Less,
            (Mean::Dnf, Mean::Finite(_)) => Ordering::Greater,
            (Mean::Dnf, Mean::Dnf) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Mean {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Mean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mean::Finite(v) => write!(f, "{v:.2}ms"),
            Mean::Dnf => f.write_str("DNF"),
        }
    }
}

/// Integer weight summed into tree aggregates.
pub trait Measure {
    fn measure(&self) -> i64;
}

impl Measure for Reading {
    /// DNF contributes the sentinel; gate sums on the finite count.
    fn measure(&self) -> i64 {
        self.as_millis()
    }
}

impl Measure for i64 {
    fn measure(&self) -> i64 {
        *self
    }
}

impl Measure for u32 {
    fn measure(&self) -> i64 {
        i64::from(*self)
    }
}

/// Total order over `T`.
///
/// Implemented for closures `Fn(&T, &T) -> Ordering`. The statistics engine
/// needs an order over both [`Reading`] and [`Mean`]; implement the trait
/// twice on one type for custom engine orderings.
pub trait Comparator<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

impl<T: ?Sized, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Uses `T`'s [`Ord`]; for readings and means that puts DNF last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> Comparator<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Index-addressable sequence of readings owned by the host.
pub trait ReadingSource {
    fn len(&self) -> usize;

    /// Reading at `pos`; callers only ask for `pos < len()`.
    fn reading_at(&self, pos: usize) -> Reading;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadingSource for [Reading] {
    fn len(&self) -> usize {
        <[Reading]>::len(self)
    }

    fn reading_at(&self, pos: usize) -> Reading {
        self[pos]
    }
}

impl ReadingSource for Vec<Reading> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn reading_at(&self, pos: usize) -> Reading {
        self[pos]
    }
}

impl ReadingSource for [i64] {
    fn len(&self) -> usize {
        <[i64]>::len(self)
    }

    fn reading_at(&self, pos: usize) -> Reading {
        Reading::from_millis(self[pos])
    }
}

impl ReadingSource for Vec<i64> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn reading_at(&self, pos: usize) -> Reading {
        Reading::from_millis(self[pos])
    }
}

impl<S: ReadingSource + ?Sized> ReadingSource for &S {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn reading_at(&self, pos: usize) -> Reading {
        (**self).reading_at(pos)
    }
}

/// Adapts a `position -> reading` function of known length.
pub struct FnSource<F> {
    len: usize,
    at: F,
}

impl<F> FnSource<F>
where
    F: Fn(usize) -> Reading,
{
    pub fn new(len: usize, at: F) -> Self {
        Self { len, at }
    }
}

impl<F> ReadingSource for FnSource<F>
where
    F: Fn(usize) -> Reading,
{
    fn len(&self) -> usize {
        self.len
    }

    fn reading_at(&self, pos: usize) -> Reading {
        (self.at)(pos)
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dnf_sorts_after_finite() {
        assert!(Reading::Finite(i64::MAX) < Reading::Dnf);
        assert_eq!(Reading::Dnf.cmp(&Reading::Dnf), Ordering::Equal);
        assert!(Mean::Finite(f64::MAX) < Mean::Dnf);
    }

    #[test]
    fn sentinel_round_trip_at_boundary() {
        assert_eq!(Reading::from_millis(-1), Reading::Dnf);
        assert_eq!(Reading::from_millis(0), Reading::Finite(0));
        assert_eq!(Reading::Dnf.as_millis(), DNF_SENTINEL);
        assert_eq!(Reading::Dnf.measure(), -1);
        assert_eq!(Mean::Dnf.as_millis(), -1.0);
    }

    #[test]
    fn closure_comparator_reverses_order() {
        let desc = |a: &i64, b: &i64| b.cmp(a);
        assert_eq!(desc.compare(&1, &2), Ordering::Greater);
        assert_eq!(NaturalOrder.compare(&1, &2), Ordering::Less);
    }

    #[test]
    fn sources_translate_sentinel() {
        let raw: Vec<i64> = vec![1200, -1, 900];
        assert_eq!(raw.reading_at(1), Reading::Dnf);
        assert_eq!(ReadingSource::len(&raw), 3);

        let f = FnSource::new(2, |i| Reading::Finite(i as i64 * 10));
        assert_eq!(f.reading_at(1), Reading::Finite(10));
        assert!(!f.is_empty());
    }

    #[test]
    fn display_formats() {
        assert_eq!(Reading::Finite(1234).to_string(), "1234ms");
        assert_eq!(Reading::Dnf.to_string(), "DNF");
        assert_eq!(Mean::Finite(1000.0 / 3.0).to_string(), "333.33ms");
    }
}
