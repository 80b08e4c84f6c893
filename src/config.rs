//! Engine configuration: tracked windows, trim policy and display precision.
//!
//! Host settings arrive as short strings (`"p5"`, `"m"`, `"a"`); they are
//! parsed once into enums here and validated together by
//! [`StatsConfigBuilder::try_build`], so the engine never re-reads them.
//!
//! ## Trim policies
//!
//! | Policy             | Host string | Trim count for window `N`  |
//! |--------------------|-------------|----------------------------|
//! | `Percent(p)`       | `"p5"`      | `ceil(N * p / 100)`        |
//! | `MedianOnly`       | `"m"`       | `(N - 1) / 2`              |
//! | `Fixed(k)`         | `"1"`       | `k`                        |
//!
//! Untrimmed windows (`moN`) always use trim 0. Every window must keep at
//! least one value after trimming both ends.
//!
//! ## Example Usage
//!
//! ```
//! use timestat::config::{DisplayPrecision, StatsConfig, TrimPolicy, WindowSpec};
//!
//! let config = StatsConfig::builder()
//!     .window(WindowSpec::untrimmed(3))
//!     .window(WindowSpec::trimmed(5))
//!     .window(WindowSpec::trimmed(12))
//!     .trim("p5".parse().unwrap())
//!     .precision(DisplayPrecision::Auto)
//!     .try_build()
//!     .unwrap();
//!
//! assert_eq!(config.trim_for(WindowSpec::trimmed(5)), 1);
//! assert_eq!(config.trim_for(WindowSpec::untrimmed(3)), 0);
//! assert_eq!(config.windows().len(), 3);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Display buckets in milliseconds used by [`DisplayPrecision::gap_bucket`].
pub const GAP_BUCKETS: [i64; 10] = [
    100, 200, 500, 1000, 2000, 5000, 10000, 20000, 50000, 100000,
];

/// How many readings are dropped from each end of a trimmed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimPolicy {
    /// Drop exactly `k` from each end.
    Fixed(usize),
    /// Drop `ceil(N * p / 100)` from each end.
    Percent(u32),
    /// Keep only the central value (or the two central values for even `N`).
    MedianOnly,
}

impl TrimPolicy {
    /// Trim count for a trimmed window of `size` readings.
    pub fn trim_for(self, size: usize) -> usize {
        match self {
            TrimPolicy::Fixed(k) => k,
            TrimPolicy::Percent(p) => (size * p as usize).div_ceil(100),
            TrimPolicy::MedianOnly => size.saturating_sub(1) / 2,
        }
    }
}

impl Default for TrimPolicy {
    fn default() -> Self {
        TrimPolicy::Percent(5)
    }
}

impl FromStr for TrimPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "m" {
            return Ok(TrimPolicy::MedianOnly);
        }
        if let Some(pct) = s.strip_prefix('p') {
            return pct
                .parse()
                .map(TrimPolicy::Percent)
                .map_err(|_| ConfigError::new(format!("invalid trim percentage {s:?}")));
        }
        s.parse()
            .map(TrimPolicy::Fixed)
            .map_err(|_| ConfigError::new(format!("invalid trim policy {s:?}")))
    }
}

impl fmt::Display for TrimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrimPolicy::Fixed(k) => write!(f, "{k}"),
            TrimPolicy::Percent(p) => write!(f, "p{p}"),
            TrimPolicy::MedianOnly => f.write_str("m"),
        }
    }
}

/// A tracked window: the `size` most recent readings, trimmed or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSpec {
    size: usize,
    trimmed: bool,
}

impl WindowSpec {
    /// "Average of N": trimmed per the configured [`TrimPolicy`].
    pub const fn trimmed(size: usize) -> Self {
        Self {
            size,
            trimmed: true,
        }
    }

    /// "Mean of N": no trimming.
    pub const fn untrimmed(size: usize) -> Self {
        Self {
            size,
            trimmed: false,
        }
    }

    /// Decodes the host's signed form: negative sizes are untrimmed.
    pub fn from_signed(size: i64) -> Result<Self, ConfigError> {
        let abs = usize::try_from(size.unsigned_abs())
            .map_err(|_| ConfigError::new(format!("window size {size} is too large")))?;
        if abs == 0 {
            return Err(ConfigError::new("window size must be non-zero"));
        }
        Ok(if size < 0 {
            Self::untrimmed(abs)
        } else {
            Self::trimmed(abs)
        })
    }

    pub fn size(self) -> usize {
        self.size
    }

    pub fn is_trimmed(self) -> bool {
        self.trimmed
    }

    /// Trim count under `policy`.
    pub fn trim(self, policy: TrimPolicy) -> usize {
        if self.trimmed {
            policy.trim_for(self.size)
        } else {
            0
        }
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.trimmed { "ao" } else { "mo" };
        write!(f, "{prefix}{}", self.size)
    }
}

/// Selects the display bucket reported next to best/worst spreads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayPrecision {
    /// Pick the first bucket above a tenth of the spread.
    #[default]
    Auto,
    /// Always use `GAP_BUCKETS[i]`.
    Fixed(usize),
}

impl DisplayPrecision {
    /// Bucket size for a best-to-worst spread of `gap` milliseconds.
    ///
    /// ```
    /// use timestat::config::DisplayPrecision;
    ///
    /// assert_eq!(DisplayPrecision::Auto.gap_bucket(4_000), 500.0);
    /// assert_eq!(DisplayPrecision::Fixed(3).gap_bucket(4_000), 1000.0);
    /// // Past the table the raw tenth is used.
    /// assert_eq!(DisplayPrecision::Auto.gap_bucket(2_000_000), 200_000.0);
    /// ```
    pub fn gap_bucket(self, gap: i64) -> f64 {
        match self {
            DisplayPrecision::Auto => {
                let tenth = gap as f64 / 10.0;
                GAP_BUCKETS
                    .iter()
                    .map(|&b| b as f64)
                    .find(|&b| tenth < b)
                    .unwrap_or(tenth)
            }
            DisplayPrecision::Fixed(i) => GAP_BUCKETS.get(i).copied().unwrap_or(0) as f64,
        }
    }
}

impl FromStr for DisplayPrecision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "a" {
            return Ok(DisplayPrecision::Auto);
        }
        match s.parse::<usize>() {
            Ok(i) if i < GAP_BUCKETS.len() => Ok(DisplayPrecision::Fixed(i)),
            _ => Err(ConfigError::new(format!("invalid display precision {s:?}"))),
        }
    }
}

/// Default tracked windows: mo3, ao5, ao12, ao50, ao100, ao1000.
pub const DEFAULT_WINDOWS: [WindowSpec; 6] = [
    WindowSpec::untrimmed(3),
    WindowSpec::trimmed(5),
    WindowSpec::trimmed(12),
    WindowSpec::trimmed(50),
    WindowSpec::trimmed(100),
    WindowSpec::trimmed(1000),
];

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsConfig {
    windows: Vec<WindowSpec>,
    trim: TrimPolicy,
    precision: DisplayPrecision,
}

impl StatsConfig {
    pub fn builder() -> StatsConfigBuilder {
        StatsConfigBuilder::default()
    }

    pub fn windows(&self) -> &[WindowSpec] {
        &self.windows
    }

    pub fn trim_policy(&self) -> TrimPolicy {
        self.trim
    }

    pub fn precision(&self) -> DisplayPrecision {
        self.precision
    }

    /// Trim count for `window` under this configuration's policy.
    pub fn trim_for(&self, window: WindowSpec) -> usize {
        window.trim(self.trim)
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOWS.to_vec(),
            trim: TrimPolicy::default(),
            precision: DisplayPrecision::default(),
        }
    }
}

/// Builder for [`StatsConfig`]. Starts with no windows, `p5` trim and
/// automatic precision.
#[derive(Debug, Clone, Default)]
pub struct StatsConfigBuilder {
    windows: Vec<WindowSpec>,
    trim: TrimPolicy,
    precision: DisplayPrecision,
}

impl StatsConfigBuilder {
    /// Tracks one more window.
    pub fn window(mut self, window: WindowSpec) -> Self {
        self.windows.push(window);
        self
    }

    /// Replaces the tracked windows.
    pub fn windows(mut self, windows: impl IntoIterator<Item = WindowSpec>) -> Self {
        self.windows = windows.into_iter().collect();
        self
    }

    pub fn trim(mut self, trim: TrimPolicy) -> Self {
        self.trim = trim;
        self
    }

    pub fn precision(mut self, precision: DisplayPrecision) -> Self {
        self.precision = precision;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a window has size zero, a trim count leaves
    /// no value to average, or a fixed precision is out of range.
    pub fn try_build(self) -> Result<StatsConfig, ConfigError> {
        for &window in &self.windows {
            if window.size() == 0 {
                return Err(ConfigError::new("window size must be greater than zero"));
            }
            let trim = window.trim(self.trim);
            if window.size() <= 2 * trim {
                return Err(ConfigError::new(format!(
                    "trim policy {} removes {trim} from each end of {window}, leaving nothing to average",
                    self.trim
                )));
            }
        }
        if let DisplayPrecision::Fixed(i) = self.precision {
            if i >= GAP_BUCKETS.len() {
                return Err(ConfigError::new(format!(
                    "display precision index {i} out of range (max {})",
                    GAP_BUCKETS.len() - 1
                )));
            }
        }
        Ok(StatsConfig {
            windows: self.windows,
            trim: self.trim,
            precision: self.precision,
        })
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. See [`try_build`](Self::try_build).
    pub fn build(self) -> StatsConfig {
        match self.try_build() {
            Ok(config) => config,
            Err(e) => panic!("{}", e),
        }
    }
}
