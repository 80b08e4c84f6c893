pub use crate::config::{DisplayPrecision, StatsConfig, StatsConfigBuilder, TrimPolicy, WindowSpec};
pub use crate::ds::{OrderStatTree, SlotArena, SlotId};
#[cfg(feature = "concurrency")]
pub use crate::engine::ConcurrentStatsEngine;
#[cfg(feature = "metrics")]
pub use crate::engine::EngineMetrics;
pub use crate::engine::{
    EngineOrder, NoSink, RecordEvent, RecordKind, RecordSink, SessionStats, Spread, StatsEngine,
};
pub use crate::error::{ConfigError, InvariantError, RangeError};
pub use crate::reading::{Comparator, FnSource, Mean, NaturalOrder, Reading, ReadingSource};
pub use crate::window::{BestRecord, Threshold, WindowStats};
