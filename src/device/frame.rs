//! Timer state frames.
//!
//! ```text
//!   byte:  0      1     2     3       4     5     6..8        len-2..len
//!        ┌──────┬─────┬─────┬───────┬─────┬─────┬───────────┬────────────┐
//!        │ 0xFE │ len │ ... │ state │ min │ sec │ ms (u16le)│ crc (u16le)│
//!        └──────┴─────┴─────┴───────┴─────┴─────┴───────────┴────────────┘
//!                     └──────────── checksummed ────────────┘
//! ```
//!
//! The time fields are only read when the state is [`TimerState::Stopped`].
//! Bytes 1 and 2 are not interpreted.

use std::fmt;

use crate::device::crc::crc16;
use crate::reading::Reading;

/// First byte of every valid frame.
pub const FRAME_MAGIC: u8 = 0xFE;

/// Shortest frame that carries a state byte and a checksum.
pub const MIN_FRAME_LEN: usize = 6;

/// Shortest frame that carries a recorded time.
pub const MIN_STOPPED_FRAME_LEN: usize = 10;

const STATE_OFFSET: usize = 3;
const TIME_OFFSET: usize = 4;
const CHECKSUM_START: usize = 2;

/// Timer states reported over the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerState {
    /// The link went away.
    Disconnect = 0,
    /// Grace delay expired; ready to start.
    GetSet = 1,
    /// Hands lifted before the grace delay expired.
    HandsOff = 2,
    Running = 3,
    /// Stopped; the frame carries the recorded time.
    Stopped = 4,
    Idle = 5,
    HandsOn = 6,
    /// Follows `Stopped` immediately.
    Finished = 7,
}

impl TryFrom<u8> for TimerState {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TimerState::Disconnect,
            1 => TimerState::GetSet,
            2 => TimerState::HandsOff,
            3 => TimerState::Running,
            4 => TimerState::Stopped,
            5 => TimerState::Idle,
            6 => TimerState::HandsOn,
            7 => TimerState::Finished,
            other => return Err(FrameError::UnknownState(other)),
        })
    }
}

/// Time recorded by the timer when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordedTime {
    pub minutes: u8,
    pub seconds: u8,
    pub milliseconds: u16,
}

impl RecordedTime {
    pub fn new(minutes: u8, seconds: u8, milliseconds: u16) -> Self {
        Self {
            minutes,
            seconds,
            milliseconds,
        }
    }

    pub fn total_millis(self) -> i64 {
        60_000 * i64::from(self.minutes) + 1000 * i64::from(self.seconds) + i64::from(self.milliseconds)
    }

    pub fn as_reading(self) -> Reading {
        Reading::Finite(self.total_millis())
    }
}

impl fmt::Display for RecordedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:02}.{:03}",
            self.minutes, self.seconds, self.milliseconds
        )
    }
}

/// One decoded state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub state: TimerState,
    /// Present only for [`TimerState::Stopped`].
    pub recorded_time: Option<RecordedTime>,
}

impl TimerEvent {
    pub fn disconnected() -> Self {
        Self {
            state: TimerState::Disconnect,
            recorded_time: None,
        }
    }
}

/// Why a frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Shorter than the state requires.
    Truncated { len: usize, needed: usize },
    /// First byte is not [`FRAME_MAGIC`].
    BadMagic(u8),
    /// Stored and computed checksums differ.
    Checksum { stored: u16, computed: u16 },
    /// State byte outside `0..=7`.
    UnknownState(u8),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Truncated { len, needed } => {
                write!(f, "frame of {len} bytes is shorter than {needed}")
            }
            FrameError::BadMagic(b) => write!(f, "bad frame magic {b:#04x}"),
            FrameError::Checksum { stored, computed } => write!(
                f,
                "frame checksum {stored:#06x} does not match computed {computed:#06x}"
            ),
            FrameError::UnknownState(s) => write!(f, "unknown timer state {s}"),
        }
    }
}

impl std::error::Error for FrameError {}

/// Validates and decodes one frame.
///
/// ```
/// use timestat::device::{decode_frame, encode_frame, RecordedTime, TimerState};
///
/// let time = RecordedTime::new(0, 12, 345);
/// let frame = encode_frame(TimerState::Stopped, Some(time));
/// let event = decode_frame(&frame).unwrap();
/// assert_eq!(event.state, TimerState::Stopped);
/// assert_eq!(event.recorded_time.map(|t| t.total_millis()), Some(12_345));
/// ```
pub fn decode_frame(bytes: &[u8]) -> Result<TimerEvent, FrameError> {
    let &first = bytes.first().ok_or(FrameError::Truncated {
        len: 0,
        needed: MIN_FRAME_LEN,
    })?;
    if first != FRAME_MAGIC {
        return Err(FrameError::BadMagic(first));
    }
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::Truncated {
            len: bytes.len(),
            needed: MIN_FRAME_LEN,
        });
    }

    let crc_at = bytes.len() - 2;
    let stored = u16::from_le_bytes([bytes[crc_at], bytes[crc_at + 1]]);
    let computed = crc16(&bytes[CHECKSUM_START..crc_at]);
    if stored != computed {
        return Err(FrameError::Checksum { stored, computed });
    }

    let state = TimerState::try_from(bytes[STATE_OFFSET])?;
    let recorded_time = if state == TimerState::Stopped {
        if bytes.len() < MIN_STOPPED_FRAME_LEN {
            return Err(FrameError::Truncated {
                len: bytes.len(),
                needed: MIN_STOPPED_FRAME_LEN,
            });
        }
        let t = &bytes[TIME_OFFSET..TIME_OFFSET + 4];
        Some(RecordedTime::new(t[0], t[1], u16::from_le_bytes([t[2], t[3]])))
    } else {
        None
    };
    Ok(TimerEvent {
        state,
        recorded_time,
    })
}

/// Builds a frame the way the timer sends it.
pub fn encode_frame(state: TimerState, recorded_time: Option<RecordedTime>) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MIN_STOPPED_FRAME_LEN);
    frame.extend_from_slice(&[FRAME_MAGIC, 0, 0x01, state as u8]);
    let time = recorded_time.unwrap_or(RecordedTime::new(0, 0, 0));
    frame.extend_from_slice(&[time.minutes, time.seconds]);
    frame.extend_from_slice(&time.milliseconds.to_le_bytes());
    frame[1] = (frame.len() + 2) as u8;
    let crc = crc16(&frame[CHECKSUM_START..]);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Lazily formats bytes as space-separated hex for log fields.
pub struct Hexdump<'a>(pub &'a [u8]);

impl fmt::Display for Hexdump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stopped_time() {
        let frame = encode_frame(TimerState::Stopped, Some(RecordedTime::new(1, 2, 3)));
        assert_eq!(frame.len(), MIN_STOPPED_FRAME_LEN);
        let event = decode_frame(&frame).unwrap();
        let time = event.recorded_time.unwrap();
        assert_eq!(time.total_millis(), 62_003);
        assert_eq!(time.as_reading(), Reading::Finite(62_003));
        assert_eq!(time.to_string(), "1:02.003");
    }

    #[test]
    fn other_states_carry_no_time() {
        for state in [TimerState::HandsOn, TimerState::Running, TimerState::Finished] {
            let event = decode_frame(&encode_frame(state, None)).unwrap();
            assert_eq!(event.state, state);
            assert_eq!(event.recorded_time, None);
        }
    }

    #[test]
    fn short_non_stopped_frame_is_valid() {
        let mut frame = vec![FRAME_MAGIC, 6, 0x01, TimerState::Idle as u8];
        let crc = crc16(&frame[2..]);
        frame.extend_from_slice(&crc.to_le_bytes());
        assert_eq!(decode_frame(&frame).unwrap().state, TimerState::Idle);

        frame[3] = TimerState::Stopped as u8;
        let crc = crc16(&frame[2..4]);
        frame[4..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(
            decode_frame(&frame),
            Err(FrameError::Truncated {
                len: 6,
                needed: MIN_STOPPED_FRAME_LEN
            })
        );
    }

    #[test]
    fn rejects_bad_magic_and_empty() {
        let mut frame = encode_frame(TimerState::Idle, None);
        frame[0] = 0xFF;
        assert_eq!(decode_frame(&frame), Err(FrameError::BadMagic(0xFF)));
        assert!(matches!(decode_frame(&[]), Err(FrameError::Truncated { len: 0, .. })));
        assert!(matches!(
            decode_frame(&[FRAME_MAGIC, 0, 0]),
            Err(FrameError::Truncated { len: 3, .. })
        ));
    }

    #[test]
    fn rejects_corrupt_payload() {
        let mut frame = encode_frame(TimerState::Stopped, Some(RecordedTime::new(0, 9, 999)));
        frame[5] ^= 0x01;
        assert!(matches!(decode_frame(&frame), Err(FrameError::Checksum { .. })));
    }

    #[test]
    fn rejects_unknown_state() {
        let mut frame = encode_frame(TimerState::Idle, None);
        frame[3] = 9;
        let crc_at = frame.len() - 2;
        let crc = crc16(&frame[2..crc_at]);
        frame[crc_at..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(decode_frame(&frame), Err(FrameError::UnknownState(9)));
    }

    #[test]
    fn hexdump_formats_bytes() {
        assert_eq!(Hexdump(&[0xfe, 0x0a, 0x01]).to_string(), "fe 0a 01");
        assert_eq!(Hexdump(&[]).to_string(), "");
    }
}
