//! Error types for the timestat library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: returned when engine configuration is invalid (zero
//!   window size, trim policy leaving nothing to average, unknown precision).
//! - [`RangeError`]: returned by range queries whose window does not fit in
//!   the known readings.
//! - [`InvariantError`]: returned by `check_invariants` methods when internal
//!   bookkeeping is inconsistent.
//!
//! Frame decoding errors live with the decoder in
//! [`device::FrameError`](crate::device::FrameError).
//!
//! ## Example Usage
//!
//! ```
//! use timestat::config::{StatsConfig, TrimPolicy, WindowSpec};
//!
//! let bad = StatsConfig::builder()
//!     .window(WindowSpec::trimmed(2))
//!     .trim(TrimPolicy::Fixed(1))
//!     .try_build();
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal invariants are violated.
///
/// Produced by [`OrderStatTree::check_invariants`](crate::ds::OrderStatTree::check_invariants)
/// and [`StatsEngine::check_invariants`](crate::engine::StatsEngine::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when configuration parameters are invalid.
///
/// Produced by [`StatsConfigBuilder::try_build`](crate::config::StatsConfigBuilder::try_build)
/// and by the `FromStr` impls of the host-encoded settings.
///
/// # Example
///
/// ```
/// use timestat::config::TrimPolicy;
///
/// let err = "q7".parse::<TrimPolicy>().unwrap_err();
/// assert!(err.to_string().contains("trim"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// RangeError
// ---------------------------------------------------------------------------

/// A range query asked for readings outside `[0, available)`, or for a window
/// that does not fit in the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeError {
    pub start: usize,
    pub length: usize,
    pub window: usize,
    pub available: usize,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.saturating_add(self.length) > self.available {
            write!(
                f,
                "range {}..{} exceeds the {} known readings",
                self.start,
                self.start.saturating_add(self.length),
                self.available
            )
        } else {
            write!(
                f,
                "window of {} does not fit in a range of {} readings",
                self.window, self.length
            )
        }
    }
}

impl std::error::Error for RangeError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
