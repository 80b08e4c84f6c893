//! Incremental windowed statistics over a growing or shrinking sequence.
//!
//! ## Architecture
//!
//! ```text
//!   ReadingSource (host owned)          StatsEngine
//!   ┌───┬───┬───┬───┬───┬───┐          ┌──────────────────────────────┐
//!   │ 0 │ 1 │ 2 │ 3 │ 4 │ 5 │ ◄─read── │ main tree: positions 0..len  │
//!   └───┴───┴───┴───┴───┴───┘          │ mo3 tree:  positions 3..6    │
//!                 └── ao5 ──┘          │ ao5 tree:  positions 1..6    │
//!                                      │ histories: [BestRecord; ..]  │
//!                                      └──────────────┬───────────────┘
//!                                                     ▼
//!                                           RecordSink ("Session best ao5!")
//! ```
//!
//! The engine mirrors a prefix `0..len` of a host-owned sequence. It never
//! stores the source; every mutating call borrows it and reads only the
//! positions entering or leaving a tree.
//!
//! ## Operations
//!
//! | Operation                  | Description                                        | Complexity        |
//! |----------------------------|----------------------------------------------------|-------------------|
//! | `append`                   | Take reading `len`, slide windows, record, notify   | O(w log n)        |
//! | `append_silent`            | As `append` without notifying                       | O(w log n)        |
//! | `pop`                      | Inverse of `append`, retracting stale records      | O(w log n)        |
//! | `truncate`                 | Step to a target length without notifying          | O(Δ · w log n)    |
//! | `current_stats`            | DNF count and mean of finite readings               | O(log n)          |
//! | `record_break_thresholds`  | Per window, what the next reading must beat        | O(w log n)        |
//! | `sliding_window_stats`     | Fresh window stats over a sub-range                | O(len log size)   |
//!
//! `w` is the number of tracked windows.
//!
//! ## Example Usage
//!
//! ```
//! use timestat::config::{StatsConfig, TrimPolicy, WindowSpec};
//! use timestat::engine::StatsEngine;
//! use timestat::reading::Mean;
//! use timestat::window::Threshold;
//!
//! let config = StatsConfig::builder()
//!     .window(WindowSpec::untrimmed(3))
//!     .trim(TrimPolicy::Fixed(1))
//!     .build();
//! let mut engine = StatsEngine::new(config);
//!
//! let mut times: Vec<i64> = vec![1000, 2000, 3000];
//! engine.truncate(&times, times.len());
//! assert_eq!(engine.current_window(0).unwrap().mean, Mean::Finite(2000.0));
//!
//! // Without 1000 the window keeps 5000ms, so the next time must beat 1000.
//! assert_eq!(engine.record_break_thresholds(&times), vec![Some(Threshold::Below(1000))]);
//!
//! times.push(900);
//! let event = engine.append(&times).unwrap();
//! assert_eq!(event.to_string(), "Session best single mo3!");
//! ```

use std::cmp::Ordering;
use std::fmt;
#[cfg(feature = "concurrency")]
use std::sync::Arc;

#[cfg(feature = "concurrency")]
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::{StatsConfig, WindowSpec};
use crate::ds::OrderStatTree;
use crate::error::{InvariantError, RangeError};
use crate::range;
use crate::reading::{Comparator, Mean, Measure, NaturalOrder, Reading, ReadingSource};
use crate::window::{BestRecord, Threshold, WindowStats};

/// Orderings the engine can rank both readings and means with.
///
/// Blanket-implemented; implement [`Comparator`] for [`Reading`] and
/// [`Mean`] on one type to get it. Thresholds assume lower is better and DNF
/// sorts last.
pub trait EngineOrder: Comparator<Reading> + Comparator<Mean> + Clone {}

impl<T> EngineOrder for T where T: Comparator<Reading> + Comparator<Mean> + Clone {}

// ---------------------------------------------------------------------------
// Record events
// ---------------------------------------------------------------------------

/// What a record was set for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Best single reading.
    Single,
    /// Best result of a tracked window.
    Window(WindowSpec),
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Single => f.write_str("single"),
            RecordKind::Window(spec) => write!(f, "{spec}"),
        }
    }
}

/// Records improved by one append.
///
/// Only improvements on an existing record are reported: the first result of
/// a window, or the first finite single, starts a history silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEvent {
    position: usize,
    kinds: Vec<RecordKind>,
}

impl RecordEvent {
    /// Position of the reading that set the records.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Improved records: `Single` first, then windows in configured order.
    pub fn kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    pub fn is_single(&self) -> bool {
        self.kinds.contains(&RecordKind::Single)
    }
}

impl fmt::Display for RecordEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Session best")?;
        for kind in &self.kinds {
            write!(f, " {kind}")?;
        }
        f.write_str("!")
    }
}

/// Receives record notifications from [`StatsEngine::append`].
pub trait RecordSink {
    fn record(&mut self, event: &RecordEvent);
}

impl<F> RecordSink for F
where
    F: FnMut(&RecordEvent),
{
    fn record(&mut self, event: &RecordEvent) {
        self(event)
    }
}

/// Sink that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSink;

impl RecordSink for NoSink {
    fn record(&mut self, _event: &RecordEvent) {}
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Whole-session summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStats {
    pub dnf_count: usize,
    /// Mean of finite readings; DNF when there are none.
    pub mean: Mean,
}

/// Best and worst finite singles with the display bucket for their gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub worst: i64,
    pub best: i64,
    pub bucket: f64,
}

/// Counters for engine operations.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct EngineMetrics {
    /// Readings appended, including truncate steps.
    pub appends: u64,
    /// Readings popped, including truncate steps.
    pub pops: u64,
    /// Window trees built from scratch.
    pub window_builds: u64,
    /// Window trees discarded on shrink.
    pub window_discards: u64,
    /// History entries pushed.
    pub records_set: u64,
    /// History entries retracted on pop.
    pub records_retracted: u64,
    /// Events delivered to the sink.
    pub notifications: u64,
}

#[cfg(feature = "metrics")]
impl fmt::Display for EngineMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineMetrics {{ appends: {}, pops: {}, window_builds: {}, window_discards: {}, \
             records_set: {}, records_retracted: {}, notifications: {} }}",
            self.appends,
            self.pops,
            self.window_builds,
            self.window_discards,
            self.records_set,
            self.records_retracted,
            self.notifications
        )
    }
}

// ---------------------------------------------------------------------------
// StatsEngine
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct WindowState<C> {
    spec: WindowSpec,
    trim: usize,
    tree: Option<OrderStatTree<Reading, usize, C>>,
    last: Option<WindowStats>,
    history: Vec<BestRecord>,
}

impl<C> WindowState<C> {
    fn deactivate(&mut self) {
        self.tree = None;
        self.last = None;
        self.history.clear();
    }
}

/// Windowed statistics engine over a host-owned reading sequence.
///
/// # Type Parameters
///
/// - `C`: ordering of readings and means, [`NaturalOrder`] by default
/// - `K`: record notification sink, [`NoSink`] by default
#[derive(Clone)]
pub struct StatsEngine<C = NaturalOrder, K = NoSink> {
    config: StatsConfig,
    order: C,
    len: usize,
    main: OrderStatTree<Reading, usize, C>,
    windows: Vec<WindowState<C>>,
    best: Option<(Reading, usize)>,
    worst: Option<(Reading, usize)>,
    sink: K,
    #[cfg(feature = "metrics")]
    metrics: EngineMetrics,
}

impl StatsEngine {
    /// Creates an empty engine ranking readings with DNF last.
    pub fn new(config: StatsConfig) -> Self {
        Self::with_order(config, NaturalOrder)
    }
}

impl<C: EngineOrder> StatsEngine<C, NoSink> {
    /// Creates an empty engine with a custom ordering.
    pub fn with_order(config: StatsConfig, order: C) -> Self {
        let windows = config
            .windows()
            .iter()
            .map(|&spec| WindowState {
                spec,
                trim: config.trim_for(spec),
                tree: None,
                last: None,
                history: Vec::new(),
            })
            .collect();
        Self {
            main: OrderStatTree::with_order(order.clone()),
            config,
            order,
            len: 0,
            windows,
            best: None,
            worst: None,
            sink: NoSink,
            #[cfg(feature = "metrics")]
            metrics: EngineMetrics::default(),
        }
    }
}

impl<C: EngineOrder, K: RecordSink> StatsEngine<C, K> {
    /// Replaces the notification sink.
    ///
    /// ```
    /// use timestat::config::{StatsConfig, WindowSpec};
    /// use timestat::engine::{RecordEvent, StatsEngine};
    ///
    /// let config = StatsConfig::builder().window(WindowSpec::untrimmed(3)).build();
    /// let mut messages = Vec::new();
    /// let mut engine =
    ///     StatsEngine::new(config).with_sink(|e: &RecordEvent| messages.push(e.to_string()));
    ///
    /// let times: Vec<i64> = vec![3000, 2000];
    /// engine.append(&times);
    /// engine.append(&times);
    /// drop(engine);
    /// assert_eq!(messages, vec!["Session best single!"]);
    /// ```
    pub fn with_sink<K2: RecordSink>(self, sink: K2) -> StatsEngine<C, K2> {
        StatsEngine {
            config: self.config,
            order: self.order,
            len: self.len,
            main: self.main,
            windows: self.windows,
            best: self.best,
            worst: self.worst,
            sink,
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Number of readings mirrored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tracked windows in configured order.
    pub fn window_specs(&self) -> impl Iterator<Item = WindowSpec> + '_ {
        self.windows.iter().map(|w| w.spec)
    }

    /// Takes reading `len` from `source`, updates every window and notifies
    /// the sink if a record improved.
    ///
    /// # Panics
    ///
    /// Panics if `source` holds no reading at position `len`.
    pub fn append<S>(&mut self, source: &S) -> Option<RecordEvent>
    where
        S: ReadingSource + ?Sized,
    {
        let event = self.push_step(source, false);
        if let Some(event) = &event {
            self.sink.record(event);
            #[cfg(feature = "metrics")]
            {
                self.metrics.notifications += 1;
            }
        }
        event
    }

    /// As [`append`](Self::append), but never notifies the sink.
    pub fn append_silent<S>(&mut self, source: &S) -> Option<RecordEvent>
    where
        S: ReadingSource + ?Sized,
    {
        self.push_step(source, false)
    }

    /// Drops the newest reading.
    ///
    /// `source` must still hold the readings the engine was fed at every
    /// position `< len`. Popping an empty engine does nothing.
    pub fn pop<S>(&mut self, source: &S)
    where
        S: ReadingSource + ?Sized,
    {
        self.pop_step(source, false);
    }

    /// Steps one reading at a time to `target` without notifying.
    ///
    /// Intermediate steps skip best/worst and window statistics refresh.
    pub fn truncate<S>(&mut self, source: &S, target: usize)
    where
        S: ReadingSource + ?Sized,
    {
        if target != self.len {
            trace!(from = self.len, to = target, "truncate");
        }
        while self.len > target {
            let intermediate = self.len - 1 != target;
            self.pop_step(source, intermediate);
        }
        while self.len < target {
            let intermediate = self.len + 1 != target;
            self.push_step(source, intermediate);
        }
    }

    /// Drops every reading, tree and history.
    pub fn reset(&mut self) {
        self.main.clear();
        for w in &mut self.windows {
            w.deactivate();
        }
        self.len = 0;
        self.best = None;
        self.worst = None;
    }

    /// Recomputes everything from the first `len` readings of `source`.
    pub fn rebuild<S>(&mut self, source: &S, len: usize)
    where
        S: ReadingSource + ?Sized,
    {
        self.reset();
        self.truncate(source, len);
    }

    /// Number of DNFs and mean of finite readings.
    pub fn current_stats(&self) -> SessionStats {
        let finite = self.main.rank_of(&Reading::Dnf);
        let mean = if finite == 0 {
            Mean::Dnf
        } else {
            Mean::Finite(self.main.cum_sum(finite) as f64 / finite as f64)
        };
        SessionStats {
            dnf_count: self.len - finite,
            mean,
        }
    }

    /// Best single reading and its position.
    pub fn best_single(&self) -> Option<(Reading, usize)> {
        self.best
    }

    /// Worst finite single reading and its position; DNF when all are DNF.
    pub fn worst_single(&self) -> Option<(Reading, usize)> {
        self.worst
    }

    /// Best and worst finite singles, or `None` when nothing finished.
    pub fn spread(&self) -> Option<Spread> {
        let (Reading::Finite(best), _) = self.best? else {
            return None;
        };
        let (Reading::Finite(worst), _) = self.worst? else {
            return None;
        };
        Some(Spread {
            worst,
            best,
            bucket: self.config.precision().gap_bucket(worst - best),
        })
    }

    /// Statistics of the most recent `size` readings of window `index`.
    pub fn current_window(&self, index: usize) -> Option<&WindowStats> {
        self.windows.get(index)?.last.as_ref()
    }

    /// Current record of window `index`.
    pub fn best_of_window(&self, index: usize) -> Option<&BestRecord> {
        self.windows.get(index)?.history.last()
    }

    /// Every record of window `index`, oldest first.
    pub fn best_history(&self, index: usize) -> &[BestRecord] {
        self.windows
            .get(index)
            .map(|w| w.history.as_slice())
            .unwrap_or_default()
    }

    /// For each window, what the next finite reading has to be to set a new
    /// record. `None` while the window holds fewer than `size` readings.
    ///
    /// `source` must hold the readings at positions `< len`.
    pub fn record_break_thresholds<S>(&self, source: &S) -> Vec<Option<Threshold>>
    where
        S: ReadingSource + ?Sized,
    {
        self.windows
            .iter()
            .map(|w| {
                let tree = w.tree.as_ref()?;
                Some(self.threshold(w, tree, source))
            })
            .collect()
    }

    /// Window statistics over `length` readings from `start`, sliding one at
    /// a time. `size` defaults to `length`, `trim` to the configured policy
    /// for `size`.
    pub fn sliding_window_stats<S>(
        &self,
        source: &S,
        start: usize,
        length: usize,
        size: Option<usize>,
        trim: Option<usize>,
    ) -> Result<Vec<WindowStats>, RangeError>
    where
        S: ReadingSource + ?Sized,
    {
        let size = size.unwrap_or(length);
        if start.checked_add(length).is_none_or(|end| end > self.len) {
            return Err(RangeError {
                start,
                length,
                window: size,
                available: self.len,
            });
        }
        let trim = trim.unwrap_or_else(|| self.config.trim_policy().trim_for(size));
        range::sliding_window_stats(source, self.order.clone(), start, length, size, trim)
    }

    /// Positions in `[start, start + count)` trimmed away by the configured
    /// policy, given the kept bounds of that range.
    ///
    /// # Errors
    ///
    /// [`RangeError`] when the range runs past the readings seen so far.
    pub fn trimmed_positions<S>(
        &self,
        source: &S,
        start: usize,
        count: usize,
        lower: Reading,
        upper: Reading,
    ) -> Result<Vec<usize>, RangeError>
    where
        S: ReadingSource + ?Sized,
    {
        if start.checked_add(count).is_none_or(|end| end > self.len) {
            return Err(RangeError {
                start,
                length: count,
                window: count,
                available: self.len,
            });
        }
        let trim = self.config.trim_policy().trim_for(count);
        range::trimmed_positions(source, &self.order, start, count, trim, lower, upper)
    }

    /// Validates tree contents against `source`, window activity and
    /// history ordering.
    pub fn check_invariants<S>(&self, source: &S) -> Result<(), InvariantError>
    where
        S: ReadingSource + ?Sized,
    {
        if self.main.len() != self.len {
            return Err(InvariantError::new(format!(
                "main tree holds {} readings but len is {}",
                self.main.len(),
                self.len
            )));
        }
        self.main.check_invariants()?;
        self.check_contents(&self.main, source, 0)?;

        for w in &self.windows {
            let size = w.spec.size();
            match (&w.tree, self.len >= size) {
                (Some(tree), true) => {
                    tree.check_invariants()?;
                    self.check_contents(tree, source, self.len - size)?;
                }
                (None, false) => {
                    if !w.history.is_empty() || w.last.is_some() {
                        return Err(InvariantError::new(format!(
                            "inactive window {} keeps state",
                            w.spec
                        )));
                    }
                }
                (Some(_), false) => {
                    return Err(InvariantError::new(format!(
                        "window {} active with only {} readings",
                        w.spec, self.len
                    )));
                }
                (None, true) => {
                    return Err(InvariantError::new(format!(
                        "window {} inactive with {} readings",
                        w.spec, self.len
                    )));
                }
            }

            for pair in w.history.windows(2) {
                if self.cmp_mean(pair[1].stats.mean, pair[0].stats.mean) != Ordering::Less {
                    return Err(InvariantError::new(format!(
                        "window {} history does not strictly improve",
                        w.spec
                    )));
                }
                if pair[1].start_index <= pair[0].start_index {
                    return Err(InvariantError::new(format!(
                        "window {} history start indices not increasing",
                        w.spec
                    )));
                }
            }
            if let Some(latest) = w.history.last() {
                if latest.start_index + size > self.len {
                    return Err(InvariantError::new(format!(
                        "window {} record starts at {} past the sequence",
                        w.spec, latest.start_index
                    )));
                }
            }
        }
        Ok(())
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    #[cfg(feature = "metrics")]
    pub fn reset_metrics(&mut self) {
        self.metrics = EngineMetrics::default();
    }

    fn cmp_reading(&self, a: &Reading, b: &Reading) -> Ordering {
        Comparator::<Reading>::compare(&self.order, a, b)
    }

    fn cmp_mean(&self, a: Mean, b: Mean) -> Ordering {
        Comparator::<Mean>::compare(&self.order, &a, &b)
    }

    fn refresh_extremes(&mut self) {
        let located = |tree: &OrderStatTree<Reading, usize, C>, k: usize| {
            let value = *tree.rank(k)?;
            tree.find(&value).map(|&pos| (value, pos))
        };
        let finite = self.main.rank_of(&Reading::Dnf);
        self.best = located(&self.main, 0);
        self.worst = located(&self.main, finite.saturating_sub(1));
    }

    fn push_step<S>(&mut self, source: &S, intermediate: bool) -> Option<RecordEvent>
    where
        S: ReadingSource + ?Sized,
    {
        let pos = self.len;
        self.len += 1;
        let reading = source.reading_at(pos);
        self.main.insert(reading, pos);
        #[cfg(feature = "metrics")]
        {
            self.metrics.appends += 1;
        }

        let mut kinds = Vec::new();
        if !intermediate {
            let previous = self.best.map(|(value, _)| value);
            self.refresh_extremes();
            if let Some(previous) = previous {
                if !previous.is_dnf() && self.cmp_reading(&reading, &previous) == Ordering::Less {
                    kinds.push(RecordKind::Single);
                }
            }
        }

        let len = self.len;
        let order = &self.order;
        for w in &mut self.windows {
            let size = w.spec.size();
            if len < size {
                continue;
            }
            if len == size {
                let mut tree = OrderStatTree::with_capacity_and_order(size, order.clone());
                for p in 0..size {
                    tree.insert(source.reading_at(p), p);
                }
                w.tree = Some(tree);
                w.history.clear();
                debug!(window = %w.spec, "window activated");
                #[cfg(feature = "metrics")]
                {
                    self.metrics.window_builds += 1;
                }
            } else if let Some(tree) = w.tree.as_mut() {
                let leaving = source.reading_at(pos - size);
                let removed = tree.remove(&leaving);
                debug_assert!(removed.is_some(), "window {} lost {leaving}", w.spec);
                tree.insert(reading, pos);
            }
            let Some(tree) = w.tree.as_ref() else {
                continue;
            };

            let (stats, kept_sum) = WindowStats::measure(tree, w.trim);
            let current = w.history.last().map_or(Mean::Dnf, |best| best.stats.mean);
            if Comparator::<Mean>::compare(order, &stats.mean, &current) == Ordering::Less {
                if !w.history.is_empty() && !intermediate {
                    kinds.push(RecordKind::Window(w.spec));
                }
                let start = pos + 1 - size;
                w.history.push(BestRecord::new(stats, start, kept_sum));
                trace!(window = %w.spec, start, mean = %stats.mean, "record set");
                #[cfg(feature = "metrics")]
                {
                    self.metrics.records_set += 1;
                }
            }
            w.last = Some(stats);
        }

        if kinds.is_empty() {
            return None;
        }
        let event = RecordEvent {
            position: pos,
            kinds,
        };
        debug!(position = pos, %event, "record event");
        Some(event)
    }

    fn pop_step<S>(&mut self, source: &S, intermediate: bool)
    where
        S: ReadingSource + ?Sized,
    {
        let Some(pos) = self.len.checked_sub(1) else {
            return;
        };
        let reading = source.reading_at(pos);
        let removed = self.main.remove(&reading);
        debug_assert!(removed.is_some(), "main tree lost {reading}");
        #[cfg(feature = "metrics")]
        {
            self.metrics.pops += 1;
        }

        let len = self.len;
        for w in &mut self.windows {
            let size = w.spec.size();
            if len < size {
                continue;
            }
            if len == size {
                w.deactivate();
                debug!(window = %w.spec, "window discarded");
                #[cfg(feature = "metrics")]
                {
                    self.metrics.window_discards += 1;
                }
                continue;
            }
            let Some(tree) = w.tree.as_mut() else {
                continue;
            };
            let removed = tree.remove(&reading);
            debug_assert!(removed.is_some(), "window {} lost {reading}", w.spec);
            let reentering = pos - size;
            tree.insert(source.reading_at(reentering), reentering);
            if !intermediate {
                w.last = Some(WindowStats::measure(tree, w.trim).0);
            }

            let start = pos + 1 - size;
            if w.history.last().is_some_and(|best| best.start_index == start) {
                w.history.pop();
                trace!(window = %w.spec, start, "record retracted");
                #[cfg(feature = "metrics")]
                {
                    self.metrics.records_retracted += 1;
                }
            }
        }

        self.len -= 1;
        if !intermediate {
            self.refresh_extremes();
        }
    }

    /// Solves `best * neff = kept(next window)` for the next reading.
    ///
    /// The next window is `rest + {t}` where `rest` is the current window
    /// without its oldest reading. With `lo`/`hi` the readings of `rest` at
    /// ranks `trim - 1` and `size - trim - 1`, the kept sum of the next
    /// window is `mid + clamp(t, lo, hi)`, `mid` being the sum of `rest` over
    /// ranks `trim..size - trim - 1`. A record needs that sum strictly below
    /// the record's kept sum.
    fn threshold<S>(
        &self,
        w: &WindowState<C>,
        tree: &OrderStatTree<Reading, usize, C>,
        source: &S,
    ) -> Threshold
    where
        S: ReadingSource + ?Sized,
    {
        let size = w.spec.size();
        let trim = w.trim;
        let oldest = source.reading_at(self.len - size);
        let at = tree.rank_of(&oldest);

        let rest_rank = |i: usize| {
            let k = if i < at { i } else { i + 1 };
            tree.rank(k).copied().unwrap_or(Reading::Dnf)
        };
        let rest_sum = |k: usize| {
            if k <= at {
                tree.cum_sum(k)
            } else {
                tree.cum_sum(k + 1) - i128::from(oldest.measure())
            }
        };

        let finite = tree.rank_of(&Reading::Dnf) - usize::from(!oldest.is_dnf());
        if finite + 1 < size - trim {
            return Threshold::Never;
        }
        let Some(best) = w.history.last() else {
            return Threshold::Always;
        };

        let mid = rest_sum(size - trim - 1) - rest_sum(trim);
        let target = best.kept_sum - mid;
        let (lo, hi) = if trim > 0 {
            (
                rest_rank(trim - 1).finite(),
                rest_rank(size - trim - 1).finite(),
            )
        } else {
            (None, None)
        };

        if target <= 0 || lo.is_some_and(|lo| target <= i128::from(lo)) {
            Threshold::Never
        } else if hi.is_some_and(|hi| target > i128::from(hi)) {
            Threshold::Always
        } else {
            Threshold::Below(i64::try_from(target).unwrap_or(i64::MAX))
        }
    }

    fn check_contents<S>(
        &self,
        tree: &OrderStatTree<Reading, usize, C>,
        source: &S,
        from: usize,
    ) -> Result<(), InvariantError>
    where
        S: ReadingSource + ?Sized,
    {
        if source.len() < self.len {
            return Err(InvariantError::new(format!(
                "source holds {} readings but engine mirrors {}",
                source.len(),
                self.len
            )));
        }
        let mut expected: Vec<Reading> = (from..self.len).map(|p| source.reading_at(p)).collect();
        expected.sort_by(|a, b| self.cmp_reading(a, b));
        let matches = expected.len() == tree.len()
            && tree
                .iter()
                .zip(&expected)
                .all(|((held, _), want)| self.cmp_reading(held, want) == Ordering::Equal);
        if matches {
            Ok(())
        } else {
            Err(InvariantError::new(format!(
                "tree over {from}..{} disagrees with the source",
                self.len
            )))
        }
    }
}

impl<C, K> fmt::Debug for StatsEngine<C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsEngine")
            .field("len", &self.len)
            .field("windows", &self.windows.iter().map(|w| w.spec).collect::<Vec<_>>())
            .field("best", &self.best)
            .field("worst", &self.worst)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Concurrent wrapper
// ---------------------------------------------------------------------------

/// Shared handle to one engine behind a `parking_lot::Mutex`.
///
/// Clones share the engine. Every call takes the lock for its duration.
///
/// ```
/// use timestat::config::StatsConfig;
/// use timestat::engine::{ConcurrentStatsEngine, StatsEngine};
///
/// let shared = ConcurrentStatsEngine::new(StatsEngine::new(StatsConfig::default()));
/// let times: Vec<i64> = vec![1200, 1100];
/// let worker = shared.clone();
/// std::thread::spawn(move || worker.truncate(&times, 2)).join().unwrap();
/// assert_eq!(shared.len(), 2);
/// ```
#[cfg(feature = "concurrency")]
pub struct ConcurrentStatsEngine<C = NaturalOrder, K = NoSink> {
    inner: Arc<Mutex<StatsEngine<C, K>>>,
}

#[cfg(feature = "concurrency")]
impl<C, K> Clone for ConcurrentStatsEngine<C, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "concurrency")]
impl<C: EngineOrder, K: RecordSink> ConcurrentStatsEngine<C, K> {
    pub fn new(engine: StatsEngine<C, K>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn append<S>(&self, source: &S) -> Option<RecordEvent>
    where
        S: ReadingSource + ?Sized,
    {
        self.inner.lock().append(source)
    }

    pub fn append_silent<S>(&self, source: &S) -> Option<RecordEvent>
    where
        S: ReadingSource + ?Sized,
    {
        self.inner.lock().append_silent(source)
    }

    pub fn pop<S>(&self, source: &S)
    where
        S: ReadingSource + ?Sized,
    {
        self.inner.lock().pop(source)
    }

    pub fn truncate<S>(&self, source: &S, target: usize)
    where
        S: ReadingSource + ?Sized,
    {
        self.inner.lock().truncate(source, target)
    }

    pub fn current_stats(&self) -> SessionStats {
        self.inner.lock().current_stats()
    }

    pub fn best_of_window(&self, index: usize) -> Option<BestRecord> {
        self.inner.lock().best_of_window(index).copied()
    }

    pub fn record_break_thresholds<S>(&self, source: &S) -> Vec<Option<Threshold>>
    where
        S: ReadingSource + ?Sized,
    {
        self.inner.lock().record_break_thresholds(source)
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut StatsEngine<C, K>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(feature = "concurrency")]
impl<C, K> fmt::Debug for ConcurrentStatsEngine<C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStatsEngine").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
