// Process-wide native state: the adapter (registry + backend) and the init flag

use crate::adapter::{BoundaryAdapter, HandleField};
use crate::status::BoundaryError;
use audioio_core::{AudioIOBuilder, Handle, NativeAudioBackend};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

// The only global mutable state in the library
static NATIVE_STATE: Lazy<RwLock<Option<BoundaryAdapter>>> = Lazy::new(|| RwLock::new(None));

/// Install the process state once. Returns `false` if it already existed.
pub fn init<B>(make_backend: B) -> bool
where
    B: FnOnce() -> Arc<dyn NativeAudioBackend>,
{
    let mut state = NATIVE_STATE.write();
    if state.is_some() {
        log::debug!("Native state already initialized");
        return false;
    }

    *state = Some(BoundaryAdapter::new(make_backend()));
    log::info!("Native state initialized");
    true
}

pub fn is_initialized() -> bool {
    NATIVE_STATE.read().is_some()
}

/// Clone of the adapter; the global lock is not held while streams work.
pub fn adapter() -> Result<BoundaryAdapter, BoundaryError> {
    NATIVE_STATE
        .read()
        .clone()
        .ok_or(BoundaryError::NotInitialized)
}

/// Create a stream for `field`, or store the 0 sentinel when there is no
/// process state or the request could not be read.
pub fn create<F: HandleField>(
    field: &mut F,
    request: Result<AudioIOBuilder, BoundaryError>,
) -> Result<Handle, BoundaryError> {
    let prepared = adapter().and_then(|adapter| request.map(|request| (adapter, request)));
    match prepared {
        Ok((adapter, request)) => adapter.create(field, request),
        Err(e) => {
            if let Err(store_error) = field.store(Handle::NONE) {
                log::error!("Failed to clear stream handle: {}", store_error);
            }
            Err(e)
        }
    }
}

/// Release every stream and drop the process state (library unload).
pub fn teardown() {
    let state = NATIVE_STATE.write().take();
    if let Some(adapter) = state {
        adapter.registry().release_all();
        log::info!("Native state torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;
    use audioio_core::mock::MockBackend;
    use audioio_core::StreamState;

    // Single test: the state is process-global
    #[test]
    fn test_init_teardown_reinit_never_reissues_handles() {
        teardown();
        assert!(matches!(adapter(), Err(BoundaryError::NotInitialized)));

        // Before init, create clears whatever the field held
        let mut early: i64 = 99;
        assert!(matches!(
            create(&mut early, Ok(AudioIOBuilder::new())),
            Err(BoundaryError::NotInitialized)
        ));
        assert_eq!(early, Handle::NONE);

        let backend = Arc::new(MockBackend::new());
        let first: Arc<dyn NativeAudioBackend> = backend.clone();
        assert!(init(move || first));
        assert!(!init(|| Arc::new(MockBackend::new()) as Arc<dyn NativeAudioBackend>));
        assert!(is_initialized());

        let mut unreadable: i64 = 42;
        let malformed = Err(BoundaryError::MalformedBuilder("format: missing".to_string()));
        assert!(create(&mut unreadable, malformed).is_err());
        assert_eq!(unreadable, Handle::NONE);

        let mut field = Handle::NONE;
        create(&mut field, Ok(AudioIOBuilder::new())).unwrap();
        let adapter = adapter().unwrap();
        adapter.open(&mut field);
        assert_eq!(backend.open_count(), 1);

        teardown();
        assert!(!is_initialized());
        assert_eq!(backend.close_count(), 1);
        assert!(adapter.registry().is_empty());

        // The managed object still holds its old handle across re-init
        let mut stale = field.load().unwrap();
        assert_ne!(stale, Handle::NONE);
        assert!(init(|| Arc::new(MockBackend::new()) as Arc<dyn NativeAudioBackend>));
        let rebuilt = super::adapter().unwrap();
        let mut fresh = Handle::NONE;
        rebuilt.create(&mut fresh, AudioIOBuilder::new()).unwrap();

        assert_ne!(fresh, stale);
        assert_eq!(rebuilt.state(&mut stale), StatusCode::InvalidHandle.code());
        assert_eq!(rebuilt.open(&mut stale), StatusCode::InvalidHandle);
        assert_eq!(rebuilt.state(&mut fresh), StreamState::Created.code());
        teardown();
    }
}
