//! Owned connection to one timer.
//!
//! A [`TimerSession`] owns the transport ([`TimerLink`]) and the subscriber
//! that receives decoded [`TimerEvent`]s. The host transport pushes raw
//! notification bytes into [`TimerSession::on_notification`] and reports
//! link loss through [`TimerSession::on_link_lost`].
//!
//! ```
//! use std::convert::Infallible;
//!
//! use timestat::device::{encode_frame, RecordedTime, TimerEvent, TimerLink, TimerSession, TimerState};
//!
//! struct Loopback;
//!
//! impl TimerLink for Loopback {
//!     type Error = Infallible;
//!     fn connect(&mut self) -> Result<(), Infallible> { Ok(()) }
//!     fn disconnect(&mut self) -> Result<(), Infallible> { Ok(()) }
//! }
//!
//! let mut times = Vec::new();
//! let mut session = TimerSession::open(Loopback, |event: &TimerEvent| {
//!     if let Some(t) = event.recorded_time {
//!         times.push(t.total_millis());
//!     }
//! })
//! .unwrap();
//!
//! let frame = encode_frame(TimerState::Stopped, Some(RecordedTime::new(0, 9, 870)));
//! session.on_notification(&frame).unwrap();
//! assert!(session.on_notification(&[0x00, 0x01]).is_err());
//! session.close().unwrap();
//! assert_eq!(times, vec![9870]);
//! ```

use std::fmt;

use tracing::{debug, trace, warn};

use crate::device::frame::{FrameError, Hexdump, TimerEvent, decode_frame};

/// Transport to a timer, implemented by the host.
pub trait TimerLink {
    type Error: std::error::Error;

    /// Opens the link and starts state notifications.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Stops notifications and closes the link.
    fn disconnect(&mut self) -> Result<(), Self::Error>;
}

/// Why a notification was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationError {
    /// The link was reported lost; late frames are discarded.
    Disconnected,
    /// The frame failed validation.
    Frame(FrameError),
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationError::Disconnected => f.write_str("timer link is disconnected"),
            NotificationError::Frame(e) => write!(f, "invalid timer frame: {e}"),
        }
    }
}

impl std::error::Error for NotificationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotificationError::Disconnected => None,
            NotificationError::Frame(e) => Some(e),
        }
    }
}

impl From<FrameError> for NotificationError {
    fn from(e: FrameError) -> Self {
        NotificationError::Frame(e)
    }
}

/// Connected timer delivering events to a subscriber.
///
/// Dropping a session that is still connected disconnects the link; use
/// [`close`](Self::close) to observe the result and get the link back.
pub struct TimerSession<L: TimerLink, F> {
    // Some until `close` hands the link back.
    link: Option<L>,
    subscriber: F,
    connected: bool,
    delivered: u64,
    dropped: u64,
}

impl<L, F> TimerSession<L, F>
where
    L: TimerLink,
    F: FnMut(&TimerEvent),
{
    /// Connects `link` and starts delivering events to `subscriber`.
    pub fn open(mut link: L, subscriber: F) -> Result<Self, L::Error> {
        link.connect()?;
        debug!("timer session opened");
        Ok(Self {
            link: Some(link),
            subscriber,
            connected: true,
            delivered: 0,
            dropped: 0,
        })
    }

    /// Validates one notification and delivers it.
    ///
    /// Invalid frames are logged with a hex dump, counted and returned as
    /// errors. After [`on_link_lost`](Self::on_link_lost) every frame is
    /// counted as dropped and rejected with
    /// [`NotificationError::Disconnected`]. The subscriber sees neither.
    pub fn on_notification(&mut self, bytes: &[u8]) -> Result<TimerEvent, NotificationError> {
        if !self.connected {
            self.dropped += 1;
            trace!(frame = %Hexdump(bytes), "discarding frame after link loss");
            return Err(NotificationError::Disconnected);
        }
        match decode_frame(bytes) {
            Ok(event) => {
                (self.subscriber)(&event);
                self.delivered += 1;
                Ok(event)
            }
            Err(e) => {
                self.dropped += 1;
                warn!(error = %e, frame = %Hexdump(bytes), "dropping invalid timer frame");
                Err(e.into())
            }
        }
    }

    /// The link dropped without [`close`](Self::close); delivers a
    /// `Disconnect` event.
    pub fn on_link_lost(&mut self) {
        if self.connected {
            self.connected = false;
            debug!("timer link lost");
            (self.subscriber)(&TimerEvent::disconnected());
        }
    }

    /// Disconnects if still connected and hands the link back.
    ///
    /// # Errors
    ///
    /// When the link fails to disconnect, the still-connected session is
    /// returned with the error so the caller can retry or drop it.
    pub fn close(mut self) -> Result<L, (Self, L::Error)> {
        if self.connected {
            if let Some(link) = self.link.as_mut() {
                if let Err(e) = link.disconnect() {
                    warn!(error = %e, "timer disconnect failed");
                    return Err((self, e));
                }
            }
            self.connected = false;
        }
        debug!(
            delivered = self.delivered,
            dropped = self.dropped,
            "timer session closed"
        );
        match self.link.take() {
            Some(link) => Ok(link),
            None => unreachable!("timer link is held until close"),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Events delivered to the subscriber.
    pub fn delivered_frames(&self) -> u64 {
        self.delivered
    }

    /// Frames rejected by validation or received after link loss.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    pub fn link(&self) -> Option<&L> {
        self.link.as_ref()
    }
}

impl<L: TimerLink, F> Drop for TimerSession<L, F> {
    fn drop(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        if let Some(link) = self.link.as_mut() {
            match link.disconnect() {
                Ok(()) => debug!("timer session dropped while connected, link closed"),
                Err(e) => warn!(error = %e, "timer disconnect failed on drop"),
            }
        }
    }
}

impl<L: TimerLink, F> fmt::Debug for TimerSession<L, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerSession")
            .field("connected", &self.connected)
            .field("delivered", &self.delivered)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}
