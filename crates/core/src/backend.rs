// Contract between the stream core and a platform audio driver

use crate::config::StreamConfig;
use crate::error::BackendError;
use std::sync::Arc;

/// Token for one open device session.
///
/// Not `Clone`: `close` consumes it, so a session cannot be closed twice or
/// used after closing.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    /// Backends mint their own ids; the core never interprets them.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Receiver for device data and errors.
///
/// Invoked on backend-owned threads, never on the caller's thread.
/// Implementations must return quickly and must not call stream lifecycle
/// operations.
pub trait DataCallback: Send + Sync {
    /// Captured interleaved samples (native endian)
    fn on_input(&self, data: &[u8]);

    /// Fill `data` with interleaved samples; returns bytes written.
    /// Anything past the returned length is played as silence.
    fn on_output(&self, data: &mut [u8]) -> usize;

    /// Asynchronous device error (e.g. disconnect)
    fn on_error(&self, error: BackendError);
}

/// Platform audio driver.
///
/// One backend instance serves many streams; each session it opens is owned
/// by exactly one stream.
pub trait NativeAudioBackend: Send + Sync {
    /// Allocate a device session matching `config`; data flows into
    /// `callback` once started.
    fn open(
        &self,
        config: &StreamConfig,
        callback: Arc<dyn DataCallback>,
    ) -> Result<SessionHandle, BackendError>;

    /// Begin data flow
    fn start(&self, session: &SessionHandle) -> Result<(), BackendError>;

    /// Halt data flow without releasing the session. Stopping a stopped
    /// session succeeds.
    fn stop(&self, session: &SessionHandle) -> Result<(), BackendError>;

    /// Release device resources. Callers treat failure as best-effort.
    fn close(&self, session: SessionHandle) -> Result<(), BackendError>;
}
