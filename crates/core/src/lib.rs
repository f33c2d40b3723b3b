// Core types for the native audio I/O stream library

pub mod backend;
pub mod callback;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod registry;
pub mod state;
pub mod stream;

// Re-export commonly used types
pub use backend::{DataCallback, NativeAudioBackend, SessionHandle};
pub use callback::{CallbackManager, StreamCallback, StreamEvent};
pub use config::{AudioApi, AudioIOBuilder, ChannelCount, Direction, SampleFormat, SharingMode, StreamConfig};
pub use error::{BackendError, ConfigError, Result, StreamError};
pub use registry::{Handle, NativeHandleRegistry};
pub use state::StreamState;
pub use stream::AudioIOStream;
