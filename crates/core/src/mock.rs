//! In-memory backend for tests and host builds.
//!
//! [`MockBackend`] behaves like a well-mannered device driver: it hands out
//! sessions, records every call in order, and lets a test inject failures,
//! delay `start`, or push data and errors through the registered callbacks.
//! It also watches for lifecycle misuse (a start or stop on a session that
//! was already closed, a double close) and records each as a violation.

use crate::backend::{DataCallback, NativeAudioBackend, SessionHandle};
use crate::config::StreamConfig;
use crate::error::BackendError;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One recorded backend call, tagged with the session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Open(u64),
    Start(u64),
    Stop(u64),
    Close(u64),
}

impl BackendCall {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCall::Open(_) => "open",
            BackendCall::Start(_) => "start",
            BackendCall::Stop(_) => "stop",
            BackendCall::Close(_) => "close",
        }
    }
}

struct MockSession {
    config: StreamConfig,
    callback: Arc<dyn DataCallback>,
    running: bool,
}

#[derive(Default)]
struct Faults {
    open: Option<BackendError>,
    start: VecDeque<BackendError>,
    stop: VecDeque<BackendError>,
    close: Option<BackendError>,
    start_delay: Option<Duration>,
    stop_delay: Option<Duration>,
}

pub struct MockBackend {
    next_session: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    calls: Mutex<Vec<BackendCall>>,
    sessions: Mutex<HashMap<u64, MockSession>>,
    closed_ids: Mutex<HashSet<u64>>,
    faults: Mutex<Faults>,
    violations: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            next_session: AtomicU64::new(1),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
            closed_ids: Mutex::new(HashSet::new()),
            faults: Mutex::new(Faults::default()),
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Every backend call so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(BackendCall::name).collect()
    }

    /// Successful opens
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Config the given session was opened with
    pub fn session_config(&self, session_id: u64) -> Option<StreamConfig> {
        self.sessions.lock().get(&session_id).map(|s| s.config)
    }

    /// Misuse observed so far (start/stop after close, double close)
    pub fn violations(&self) -> Vec<String> {
        self.violations.lock().clone()
    }

    pub fn fail_next_open(&self, error: BackendError) {
        self.faults.lock().open = Some(error);
    }

    pub fn fail_next_start(&self, error: BackendError) {
        self.faults.lock().start.push_back(error);
    }

    pub fn fail_next_stop(&self, error: BackendError) {
        self.faults.lock().stop.push_back(error);
    }

    /// Every close reports `error` (the session is still torn down)
    pub fn fail_close(&self, error: BackendError) {
        self.faults.lock().close = Some(error);
    }

    /// Make `start` block for `delay` before touching the session
    pub fn set_start_delay(&self, delay: Duration) {
        self.faults.lock().start_delay = Some(delay);
    }

    /// Make `stop` block for `delay` before touching the session
    pub fn set_stop_delay(&self, delay: Duration) {
        self.faults.lock().stop_delay = Some(delay);
    }

    /// Deliver captured bytes to every open session's callback
    pub fn emit_input(&self, data: &[u8]) {
        for callback in self.callbacks() {
            callback.on_input(data);
        }
    }

    /// Ask every open session's callback for `len` bytes of output.
    /// Returns `(bytes written, buffer)` per session.
    pub fn pull_output(&self, len: usize) -> Vec<(usize, Vec<u8>)> {
        self.callbacks()
            .into_iter()
            .map(|callback| {
                // Garbage, so silence filling is observable
                let mut buffer = vec![0xAA; len];
                let written = callback.on_output(&mut buffer);
                (written, buffer)
            })
            .collect()
    }

    /// Report an asynchronous device error to every open session
    pub fn emit_error(&self, error: BackendError) {
        for callback in self.callbacks() {
            callback.on_error(error.clone());
        }
    }

    // Cloned out so callbacks run without the session lock held
    fn callbacks(&self) -> Vec<Arc<dyn DataCallback>> {
        self.sessions
            .lock()
            .values()
            .map(|s| s.callback.clone())
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    fn check_not_closed(&self, operation: &str, id: u64) {
        if self.closed_ids.lock().contains(&id) {
            let message = format!("{} on closed session {}", operation, id);
            log::error!("MockBackend: {}", message);
            self.violations.lock().push(message);
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeAudioBackend for MockBackend {
    fn open(
        &self,
        config: &StreamConfig,
        callback: Arc<dyn DataCallback>,
    ) -> Result<SessionHandle, BackendError> {
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        self.record(BackendCall::Open(id));

        if let Some(error) = self.faults.lock().open.take() {
            return Err(error);
        }

        self.sessions.lock().insert(
            id,
            MockSession {
                config: *config,
                callback,
                running: false,
            },
        );
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle::new(id))
    }

    fn start(&self, session: &SessionHandle) -> Result<(), BackendError> {
        let id = session.id();
        self.record(BackendCall::Start(id));
        self.check_not_closed("start", id);

        let delay = self.faults.lock().start_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
            self.check_not_closed("start", id);
        }

        if let Some(error) = self.faults.lock().start.pop_front() {
            return Err(error);
        }

        let mut sessions = self.sessions.lock();
        match sessions.get_mut(&id) {
            Some(s) if s.running => Err(BackendError::AlreadyRunning),
            Some(s) => {
                s.running = true;
                Ok(())
            }
            None => Err(BackendError::DeviceLost),
        }
    }

    fn stop(&self, session: &SessionHandle) -> Result<(), BackendError> {
        let id = session.id();
        self.record(BackendCall::Stop(id));
        self.check_not_closed("stop", id);

        let delay = self.faults.lock().stop_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
            self.check_not_closed("stop", id);
        }

        if let Some(error) = self.faults.lock().stop.pop_front() {
            return Err(error);
        }

        if let Some(s) = self.sessions.lock().get_mut(&id) {
            s.running = false;
        }
        Ok(())
    }

    fn close(&self, session: SessionHandle) -> Result<(), BackendError> {
        let id = session.id();
        self.record(BackendCall::Close(id));

        if self.sessions.lock().remove(&id).is_none() {
            let message = format!("close of unknown session {}", id);
            self.violations.lock().push(message);
        }
        self.closed_ids.lock().insert(id);
        self.closed.fetch_add(1, Ordering::SeqCst);

        match self.faults.lock().close.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioIOBuilder;

    struct Silent;

    impl DataCallback for Silent {
        fn on_input(&self, _data: &[u8]) {}

        fn on_output(&self, _data: &mut [u8]) -> usize {
            0
        }

        fn on_error(&self, _error: BackendError) {}
    }

    #[test]
    fn test_start_is_not_reentrant() {
        let backend = MockBackend::new();
        let config = AudioIOBuilder::new().validate().unwrap();
        let session = backend.open(&config, Arc::new(Silent)).unwrap();

        backend.start(&session).unwrap();
        assert_eq!(backend.start(&session), Err(BackendError::AlreadyRunning));
        backend.stop(&session).unwrap();
        backend.stop(&session).unwrap();
        assert_eq!(backend.session_config(session.id()), Some(config));
    }

    #[test]
    fn test_detects_start_after_close() {
        let backend = MockBackend::new();
        let config = AudioIOBuilder::new().validate().unwrap();
        let session = backend.open(&config, Arc::new(Silent)).unwrap();
        let stale = SessionHandle::new(session.id());

        backend.close(session).unwrap();
        assert!(backend.start(&stale).is_err());
        assert_eq!(backend.violations().len(), 1);
        assert_eq!(backend.call_names(), vec!["open", "close", "start"]);
    }
}
