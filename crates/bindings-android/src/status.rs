// Status codes returned across the managed boundary

use audioio_core::{BackendError, StreamError, StreamState};

/// Failures of the boundary glue itself
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    #[error("JNI error: {0}")]
    Jni(#[from] jni::errors::Error),

    #[error("native_init has not been called")]
    NotInitialized,

    #[error("malformed AudioIOBuilder: {0}")]
    MalformedBuilder(String),
}

/// Integer status handed back to the managed caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    InvalidHandle = -1,
    InvalidState = -2,
    ConfigInvalid = -3,
    DeviceUnavailable = -4,
    UnsupportedConfig = -5,
    PermissionDenied = -6,
    DeviceLost = -7,
    AlreadyRunning = -8,
    NotInitialized = -9,
    BoundaryFailure = -10,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_result(result: &Result<StreamState, StreamError>) -> Self {
        match result {
            Ok(_) => StatusCode::Ok,
            Err(e) => e.into(),
        }
    }
}

impl From<&StreamError> for StatusCode {
    fn from(error: &StreamError) -> Self {
        match error {
            StreamError::ConfigInvalid(_) => StatusCode::ConfigInvalid,
            StreamError::InvalidState { .. } => StatusCode::InvalidState,
            StreamError::Backend(backend) => match backend {
                BackendError::DeviceUnavailable(_) | BackendError::Other(_) => {
                    StatusCode::DeviceUnavailable
                }
                BackendError::UnsupportedConfig(_) => StatusCode::UnsupportedConfig,
                BackendError::PermissionDenied => StatusCode::PermissionDenied,
                BackendError::DeviceLost => StatusCode::DeviceLost,
                BackendError::AlreadyRunning => StatusCode::AlreadyRunning,
            },
        }
    }
}

impl From<&BoundaryError> for StatusCode {
    fn from(error: &BoundaryError) -> Self {
        match error {
            BoundaryError::NotInitialized => StatusCode::NotInitialized,
            BoundaryError::Jni(_) | BoundaryError::MalformedBuilder(_) => StatusCode::BoundaryFailure,
        }
    }
}
