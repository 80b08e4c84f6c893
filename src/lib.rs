//! timestat: incremental trimmed-window statistics and best-record tracking
//! over timing readings.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod config;
pub mod device;
pub mod ds;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod range;
pub mod reading;
pub mod window;
