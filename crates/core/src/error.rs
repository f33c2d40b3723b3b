// Error taxonomy for stream configuration, backend and lifecycle failures

use crate::state::StreamState;

/// Reasons an [`AudioIOBuilder`](crate::AudioIOBuilder) fails validation.
///
/// Always recoverable by the caller: fix the request and call `open` again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {0}Hz")]
    InvalidSampleRate(i32),

    #[error("unsupported channel count: {0} (only mono and stereo)")]
    UnsupportedChannelCount(i32),

    #[error("unsupported sample format code: {0}")]
    UnsupportedFormat(i32),

    #[error("unsupported stream direction code: {0}")]
    UnsupportedDirection(i32),

    #[error("invalid buffer size: {0} frames")]
    InvalidBufferSize(i32),

    #[error("unsupported audio api code: {0}")]
    UnsupportedAudioApi(i32),

    #[error("unsupported sharing mode code: {0}")]
    UnsupportedSharingMode(i32),
}

/// Errors reported by a [`NativeAudioBackend`](crate::NativeAudioBackend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("stream configuration not supported by device: {0}")]
    UnsupportedConfig(String),

    #[error("permission denied for audio device")]
    PermissionDenied,

    #[error("audio device lost")]
    DeviceLost,

    #[error("stream already running")]
    AlreadyRunning,

    #[error("audio backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Fatal errors invalidate the session; the stream moves to ERROR.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::DeviceLost)
    }
}

/// Errors returned by [`AudioIOStream`](crate::AudioIOStream) lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("invalid stream configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("cannot {operation} a stream in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: StreamState,
    },
}

/// Result type alias for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_device_lost_is_fatal() {
        assert!(BackendError::DeviceLost.is_fatal());
        assert!(!BackendError::AlreadyRunning.is_fatal());
        assert!(!BackendError::PermissionDenied.is_fatal());
        assert!(!BackendError::DeviceUnavailable("busy".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err: StreamError = ConfigError::InvalidSampleRate(0).into();
        assert_eq!(err.to_string(), "invalid stream configuration: invalid sample rate: 0Hz");

        let err = StreamError::InvalidState {
            operation: "start",
            state: StreamState::Released,
        };
        assert_eq!(err.to_string(), "cannot start a stream in state Released");
    }
}
