use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// The connection's lifecycle state. Only the lifecycle controller (and, for
/// the OPEN->CLOSING edge, whichever of the reader/writer notices the close
/// handshake begin) ever writes this; everyone else only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Created = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Created,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

#[derive(Clone)]
pub struct SharedState {
    state: Arc<AtomicU8>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ConnectionState::Created as u8)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks which side has written a CLOSE frame to the wire, so the reader
/// knows whether an incoming CLOSE needs an echo and whether the close was
/// server- or client-initiated.
#[derive(Clone)]
pub struct CloseTracker {
    close_sent: Arc<AtomicBool>,
}

impl CloseTracker {
    pub fn new() -> Self {
        Self {
            close_sent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks a CLOSE frame as sent. Returns `true` if this call was the one
    /// that transitioned the flag (i.e. no CLOSE had been written yet).
    pub fn mark_sent(&self) -> bool {
        !self.close_sent.swap(true, Ordering::AcqRel)
    }

    pub fn was_sent(&self) -> bool {
        self.close_sent.load(Ordering::Acquire)
    }
}

impl Default for CloseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrips() {
        let state = SharedState::new();
        assert_eq!(state.get(), ConnectionState::Created);
        state.set(ConnectionState::Open);
        assert_eq!(state.get(), ConnectionState::Open);
    }

    #[test]
    fn close_tracker_reports_first_sender() {
        let tracker = CloseTracker::new();
        assert!(tracker.mark_sent());
        assert!(!tracker.mark_sent());
        assert!(tracker.was_sent());
    }
}
