// Android audio backend using Oboe

mod frames;

#[cfg(target_os = "android")]
mod oboe_backend;

#[cfg(target_os = "android")]
pub use oboe_backend::OboeBackend;

pub use frames::{FrameBytes, Sample};

#[cfg(not(target_os = "android"))]
mod host {
    use audioio_core::{BackendError, DataCallback, NativeAudioBackend, SessionHandle, StreamConfig};
    use std::sync::Arc;

    /// Placeholder off Android: every open reports the device unavailable.
    #[derive(Default)]
    pub struct OboeBackend;

    impl OboeBackend {
        pub fn new() -> Self {
            Self
        }
    }

    impl NativeAudioBackend for OboeBackend {
        fn open(
            &self,
            _config: &StreamConfig,
            _callback: Arc<dyn DataCallback>,
        ) -> Result<SessionHandle, BackendError> {
            Err(BackendError::DeviceUnavailable(
                "Oboe backend is only available on Android".to_string(),
            ))
        }

        fn start(&self, _session: &SessionHandle) -> Result<(), BackendError> {
            Err(BackendError::DeviceLost)
        }

        fn stop(&self, _session: &SessionHandle) -> Result<(), BackendError> {
            Ok(())
        }

        fn close(&self, _session: SessionHandle) -> Result<(), BackendError> {
            Ok(())
        }
    }

}

#[cfg(not(target_os = "android"))]
pub use host::OboeBackend;
