// Stream lifecycle states and the lock-free state mirror

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle state of an [`AudioIOStream`](crate::AudioIOStream)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamState {
    /// Constructed, no session yet
    Created = 0,
    /// Validating config and opening a backend session
    Opening = 1,
    /// Session open, no data flowing
    Open = 2,
    /// Data is flowing
    Running = 3,
    /// Halting data flow
    Stopping = 4,
    /// Tearing down the session during release
    Closing = 5,
    /// Terminal; only `release` is accepted
    Released = 6,
    /// Open failed or the device was lost
    Error = 7,
}

impl StreamState {
    pub fn code(self) -> i32 {
        self as i32
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => StreamState::Created,
            1 => StreamState::Opening,
            2 => StreamState::Open,
            3 => StreamState::Running,
            4 => StreamState::Stopping,
            5 => StreamState::Closing,
            6 => StreamState::Released,
            _ => StreamState::Error,
        }
    }

    /// States in which no transition is in flight.
    pub fn is_stable(self) -> bool {
        !matches!(
            self,
            StreamState::Opening | StreamState::Stopping | StreamState::Closing
        )
    }

    /// Whether `from -> to` is an edge of the lifecycle graph.
    pub fn can_transition(from: StreamState, to: StreamState) -> bool {
        use StreamState::*;

        match (from, to) {
            (Created, Opening) | (Error, Opening) => true,
            (Opening, Open) | (Opening, Error) => true,
            (Open, Running) | (Open, Error) => true,
            (Running, Stopping) | (Running, Error) => true,
            (Stopping, Open) | (Stopping, Running) | (Stopping, Error) => true,
            (Closing, Released) | (Closing, Error) => true,
            (Released, _) => false,
            (_, Closing) => true,
            _ => false,
        }
    }
}

/// Shared, lock-free view of a stream's state.
///
/// Written only while the stream's lifecycle lock is held; read from any
/// thread, including backend callback threads.
#[derive(Clone)]
pub(crate) struct StateCell {
    value: Arc<AtomicU8>,
}

impl StateCell {
    pub fn new(state: StreamState) -> Self {
        Self {
            value: Arc::new(AtomicU8::new(state as u8)),
        }
    }

    pub fn get(&self) -> StreamState {
        StreamState::from_u8(self.value.load(Ordering::Acquire))
    }

    pub fn set(&self, state: StreamState) -> StreamState {
        let old = StreamState::from_u8(self.value.swap(state as u8, Ordering::AcqRel));
        debug_assert!(
            old == state || StreamState::can_transition(old, state),
            "illegal transition {:?} -> {:?}",
            old,
            state
        );
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_cell() {
        let cell = StateCell::new(StreamState::Created);
        assert_eq!(cell.get(), StreamState::Created);
        assert_eq!(cell.set(StreamState::Opening), StreamState::Created);
        assert_eq!(cell.get().code(), 1);
    }

    #[test]
    fn test_released_is_terminal() {
        for to in [
            StreamState::Created,
            StreamState::Opening,
            StreamState::Open,
            StreamState::Running,
            StreamState::Closing,
            StreamState::Error,
        ] {
            assert!(!StreamState::can_transition(StreamState::Released, to));
        }
    }

    #[test]
    fn test_every_live_state_can_close() {
        for from in [
            StreamState::Created,
            StreamState::Open,
            StreamState::Running,
            StreamState::Error,
        ] {
            assert!(StreamState::can_transition(from, StreamState::Closing));
        }
    }

    #[test]
    fn test_transient_states() {
        assert!(!StreamState::Opening.is_stable());
        assert!(!StreamState::Stopping.is_stable());
        assert!(StreamState::Open.is_stable());
        assert!(StreamState::Error.is_stable());
    }
}
