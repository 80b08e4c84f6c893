//! Timer device boundary: frame validation and the connection session.
//!
//! Nothing here feeds the statistics engine directly. The host appends
//! [`RecordedTime::as_reading`] values to its own sequence and then calls
//! [`StatsEngine::append`](crate::engine::StatsEngine::append).
//!
//! - [`crc`]: CRC-16/CCITT-FALSE
//! - [`frame`]: frame layout, [`decode_frame`], [`FrameError`]
//! - [`session`]: [`TimerLink`] and the owned [`TimerSession`], which
//!   disconnects on drop

pub mod crc;
pub mod frame;
pub mod session;

pub use crc::crc16;
pub use frame::{
    FRAME_MAGIC, FrameError, Hexdump, MIN_FRAME_LEN, MIN_STOPPED_FRAME_LEN, RecordedTime,
    TimerEvent, TimerState, decode_frame, encode_frame,
};
pub use session::{NotificationError, TimerLink, TimerSession};
