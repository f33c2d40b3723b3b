// Handle registry mapping opaque managed-side handles to native streams

use crate::stream::AudioIOStream;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::num::NonZeroI64;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Opaque stream handle stored by the managed caller.
///
/// Never an address. Raw value `0` is reserved as the "no handle" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroI64);

impl Handle {
    /// Raw value the managed side stores when it holds no stream
    pub const NONE: i64 = 0;

    pub fn from_raw(raw: i64) -> Option<Self> {
        NonZeroI64::new(raw).map(Handle)
    }

    pub fn as_raw(self) -> i64 {
        self.0.get()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Shared by every registry so a handle is never reissued within the process,
// even after the native state is torn down and rebuilt
static NEXT_HANDLE: AtomicI64 = AtomicI64::new(1);

/// Process-wide table of live streams.
///
/// Handles come from a monotonically increasing process-wide counter and are
/// never reissued, so a stale handle resolves to nothing rather than to
/// another stream. The table has its own lock; lookups never wait on a
/// stream's lifecycle lock.
pub struct NativeHandleRegistry {
    streams: RwLock<HashMap<Handle, Arc<AudioIOStream>>>,
}

impl NativeHandleRegistry {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn issue_handle(&self) -> Handle {
        loop {
            let raw = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
            if let Some(handle) = Handle::from_raw(raw) {
                return handle;
            }
        }
    }

    /// Register a stream and return its handle.
    ///
    /// A stream is registered at most once; registering it again returns the
    /// handle it already has. The stream unregisters itself on release.
    pub fn register(self: &Arc<Self>, stream: Arc<AudioIOStream>) -> Handle {
        let entry = stream.clone();
        stream.bind_registry(self, |handle| {
            self.streams.write().insert(handle, entry);
            log::debug!("Registered stream handle {}", handle);
        })
    }

    pub fn resolve(&self, handle: Handle) -> Option<Arc<AudioIOStream>> {
        self.streams.read().get(&handle).cloned()
    }

    pub fn unregister(&self, handle: Handle) -> Option<Arc<AudioIOStream>> {
        let removed = self.streams.write().remove(&handle);
        if removed.is_some() {
            log::debug!("Unregistered stream handle {}", handle);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }

    /// Release every registered stream (library unload).
    pub fn release_all(&self) {
        let streams: Vec<_> = self.streams.write().drain().collect();
        if !streams.is_empty() {
            log::info!("Releasing {} remaining streams", streams.len());
        }
        for (handle, stream) in streams {
            if let Err(e) = stream.release() {
                log::error!("Failed to release stream {}: {}", handle, e);
            }
        }
    }
}

impl Default for NativeHandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioIOBuilder;
    use crate::mock::MockBackend;
    use crate::state::StreamState;
    use std::collections::HashSet;
    use std::thread;

    fn new_stream(backend: &Arc<MockBackend>) -> Arc<AudioIOStream> {
        Arc::new(AudioIOStream::create(AudioIOBuilder::new(), backend.clone()))
    }

    #[test]
    fn test_handles_are_monotonic_and_distinct() {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(NativeHandleRegistry::new());

        let handles: Vec<Handle> = (0..32)
            .map(|_| registry.register(new_stream(&backend)))
            .collect();

        assert!(handles.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(registry.len(), 32);
        for handle in &handles {
            assert!(registry.resolve(*handle).is_some());
        }
    }

    #[test]
    fn test_register_twice_keeps_first_handle() {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(NativeHandleRegistry::new());
        let stream = new_stream(&backend);

        let first = registry.register(stream.clone());
        let second = registry.register(stream.clone());

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(stream.handle(), Some(first));
    }

    #[test]
    fn test_released_handle_is_never_reused() {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(NativeHandleRegistry::new());

        let old = registry.register(new_stream(&backend));
        registry.resolve(old).unwrap().release().unwrap();
        assert!(registry.resolve(old).is_none());

        let new = registry.register(new_stream(&backend));
        assert_ne!(old, new);
        assert!(registry.resolve(old).is_none());
    }

    #[test]
    fn test_released_stream_is_not_registered() {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(NativeHandleRegistry::new());
        let stream = new_stream(&backend);
        stream.release().unwrap();

        let handle = registry.register(stream);
        assert!(registry.resolve(handle).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registration() {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(NativeHandleRegistry::new());

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let backend = backend.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|_| registry.register(new_stream(&backend)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for handle in worker.join().unwrap() {
                assert!(seen.insert(handle), "handle {} issued twice", handle);
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(registry.len(), 400);
    }

    #[test]
    fn test_release_all_empties_registry() {
        let backend = Arc::new(MockBackend::new());
        let registry = Arc::new(NativeHandleRegistry::new());
        let stream = new_stream(&backend);
        let handle = registry.register(stream.clone());
        stream.open().unwrap();

        registry.release_all();

        assert!(registry.resolve(handle).is_none());
        assert_eq!(stream.state(), StreamState::Released);
        assert_eq!(backend.open_count(), backend.close_count());
    }

    #[test]
    fn test_new_registry_never_reissues_old_handles() {
        let backend = Arc::new(MockBackend::new());
        let first = Arc::new(NativeHandleRegistry::new());
        let stale = first.register(new_stream(&backend));
        first.release_all();
        drop(first);

        let second = Arc::new(NativeHandleRegistry::new());
        let fresh = second.register(new_stream(&backend));

        assert!(fresh > stale);
        assert!(second.resolve(stale).is_none());
    }

    #[test]
    fn test_sentinel_is_not_a_handle() {
        assert!(Handle::from_raw(Handle::NONE).is_none());
        assert_eq!(Handle::from_raw(7).map(Handle::as_raw), Some(7));
    }
}
