// Translation between managed-side calls and stream lifecycle operations

use crate::status::{BoundaryError, StatusCode};
use audioio_core::{
    AudioIOBuilder, AudioIOStream, DataCallback, Handle, NativeAudioBackend,
    NativeHandleRegistry, Result, StreamState,
};
use std::sync::Arc;

/// The caller-held slot that stores a stream handle.
///
/// In production this is the `long mNativeContext` field of the managed
/// object; tests use a plain `i64`.
pub trait HandleField {
    fn load(&mut self) -> std::result::Result<i64, BoundaryError>;

    fn store(&mut self, raw: i64) -> std::result::Result<(), BoundaryError>;
}

impl HandleField for i64 {
    fn load(&mut self) -> std::result::Result<i64, BoundaryError> {
        Ok(*self)
    }

    fn store(&mut self, raw: i64) -> std::result::Result<(), BoundaryError> {
        *self = raw;
        Ok(())
    }
}

/// Resolves caller handles and forwards to the stream. Holds no audio state.
#[derive(Clone)]
pub struct BoundaryAdapter {
    registry: Arc<NativeHandleRegistry>,
    backend: Arc<dyn NativeAudioBackend>,
}

impl BoundaryAdapter {
    pub fn new(backend: Arc<dyn NativeAudioBackend>) -> Self {
        Self {
            registry: Arc::new(NativeHandleRegistry::new()),
            backend,
        }
    }

    pub fn registry(&self) -> &Arc<NativeHandleRegistry> {
        &self.registry
    }

    /// Create and register a stream, storing its handle in `field`.
    ///
    /// A live stream already referenced by `field` is released first so it
    /// cannot leak.
    pub fn create<F: HandleField>(
        &self,
        field: &mut F,
        request: AudioIOBuilder,
    ) -> std::result::Result<Handle, BoundaryError> {
        if let Some(previous) = self.resolve(field)? {
            log::warn!("Replacing live stream {:?} on create", previous.handle());
            if let Err(e) = previous.release() {
                log::error!("Failed to release replaced stream: {}", e);
            }
        }

        let stream = Arc::new(AudioIOStream::create(request, self.backend.clone()));
        let handle = self.registry.register(stream.clone());

        if let Err(e) = field.store(handle.as_raw()) {
            // The caller will never see this handle
            let _ = stream.release();
            return Err(e);
        }

        log::info!("Created stream {}", handle);
        Ok(handle)
    }

    pub fn open<F: HandleField>(&self, field: &mut F) -> StatusCode {
        self.forward(field, "open", AudioIOStream::open)
    }

    pub fn start<F: HandleField>(&self, field: &mut F) -> StatusCode {
        self.forward(field, "start", AudioIOStream::start)
    }

    pub fn stop<F: HandleField>(&self, field: &mut F) -> StatusCode {
        self.forward(field, "stop", AudioIOStream::stop)
    }

    /// Release the stream and always clear `field`, whatever the outcome.
    pub fn release<F: HandleField>(&self, field: &mut F) -> StatusCode {
        let status = match self.resolve(field) {
            Ok(Some(stream)) => StatusCode::from_result(&stream.release()),
            // Already released or never created
            Ok(None) => StatusCode::Ok,
            Err(e) => {
                log::error!("Failed to read stream handle on release: {}", e);
                StatusCode::from(&e)
            }
        };

        match field.store(Handle::NONE) {
            Ok(()) => status,
            Err(e) => {
                log::error!("Failed to clear stream handle: {}", e);
                StatusCode::from(&e)
            }
        }
    }

    /// Raw state code, or a negative status when the handle is unknown
    pub fn state<F: HandleField>(&self, field: &mut F) -> i32 {
        match self.resolve(field) {
            Ok(Some(stream)) => stream.state().code(),
            Ok(None) => StatusCode::InvalidHandle.code(),
            Err(e) => StatusCode::from(&e).code(),
        }
    }

    pub fn set_data_listener<F: HandleField>(
        &self,
        field: &mut F,
        listener: Option<Arc<dyn DataCallback>>,
    ) -> StatusCode {
        match self.resolve(field) {
            Ok(Some(stream)) => {
                stream.set_data_listener(listener);
                StatusCode::Ok
            }
            Ok(None) => StatusCode::InvalidHandle,
            Err(e) => StatusCode::from(&e),
        }
    }

    fn resolve<F: HandleField>(
        &self,
        field: &mut F,
    ) -> std::result::Result<Option<Arc<AudioIOStream>>, BoundaryError> {
        let raw = field.load()?;
        Ok(Handle::from_raw(raw).and_then(|handle| self.registry.resolve(handle)))
    }

    fn forward<F: HandleField>(
        &self,
        field: &mut F,
        operation: &str,
        op: impl FnOnce(&AudioIOStream) -> Result<StreamState>,
    ) -> StatusCode {
        match self.resolve(field) {
            Ok(Some(stream)) => {
                let result = op(&stream);
                if let Err(e) = &result {
                    log::warn!("{} failed: {}", operation, e);
                }
                StatusCode::from_result(&result)
            }
            Ok(None) => {
                log::error!("{} called without a live stream handle", operation);
                StatusCode::InvalidHandle
            }
            Err(e) => {
                log::error!("{} could not read stream handle: {}", operation, e);
                StatusCode::from(&e)
            }
        }
    }
}
