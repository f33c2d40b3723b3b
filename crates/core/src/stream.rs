// Native audio stream: lifecycle state machine and session ownership

use crate::backend::{DataCallback, NativeAudioBackend, SessionHandle};
use crate::callback::{CallbackManager, StreamCallback, StreamEvent};
use crate::config::{AudioIOBuilder, StreamConfig};
use crate::error::{BackendError, Result, StreamError};
use crate::registry::{Handle, NativeHandleRegistry};
use crate::state::{StateCell, StreamState};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Sits between the backend's callback threads and the data listener.
///
/// Data reaches the listener only while the stream is RUNNING. Never touches
/// the lifecycle lock, so a backend may block in `close` waiting for its
/// callback thread without deadlocking.
struct CallbackGate {
    state: StateCell,
    listener: RwLock<Option<Arc<dyn DataCallback>>>,
    device_lost: AtomicBool,
    events: Arc<CallbackManager>,
}

impl DataCallback for CallbackGate {
    fn on_input(&self, data: &[u8]) {
        if self.state.get() != StreamState::Running {
            return;
        }
        if let Some(listener) = self.listener.read().as_ref() {
            listener.on_input(data);
        }
    }

    fn on_output(&self, data: &mut [u8]) -> usize {
        let written = if self.state.get() == StreamState::Running {
            match self.listener.read().as_ref() {
                Some(listener) => listener.on_output(data).min(data.len()),
                None => 0,
            }
        } else {
            0
        };

        // Never play stale data
        data[written..].fill(0);
        written
    }

    fn on_error(&self, error: BackendError) {
        if error.is_fatal() {
            if !self.device_lost.swap(true, Ordering::AcqRel) {
                log::error!("Audio device lost");
                self.events.dispatch_event(StreamEvent::DeviceLost);
            }
        } else {
            log::warn!("Backend reported error: {}", error);
            self.events.dispatch_event(StreamEvent::Error {
                message: error.to_string(),
            });
        }

        if let Some(listener) = self.listener.read().as_ref() {
            listener.on_error(error);
        }
    }
}

/// State guarded by the per-stream lifecycle lock
struct StreamInner {
    config: Option<StreamConfig>,
    session: Option<SessionHandle>,
    registry: Option<Weak<NativeHandleRegistry>>,
}

/// A native audio stream driven by an external owner.
///
/// All lifecycle transitions (`open`, `start`, `stop`, `release`) are
/// serialized by a per-stream lock that is held across the backend call, so
/// `release` issued while a `start` is in flight waits for the start to land
/// in a stable state before tearing the session down. `state()` reads a
/// lock-free mirror and never blocks.
///
/// Lifecycle callbacks must not be invoked from a backend audio thread.
pub struct AudioIOStream {
    request: AudioIOBuilder,
    backend: Arc<dyn NativeAudioBackend>,
    state: StateCell,
    handle: OnceCell<Handle>,
    inner: Mutex<StreamInner>,
    gate: Arc<CallbackGate>,
    callbacks: Arc<CallbackManager>,
}

impl AudioIOStream {
    /// Construct in CREATED. Never fails; the request is validated by `open`.
    pub fn create(request: AudioIOBuilder, backend: Arc<dyn NativeAudioBackend>) -> Self {
        let state = StateCell::new(StreamState::Created);
        let callbacks = Arc::new(CallbackManager::new());
        let gate = Arc::new(CallbackGate {
            state: state.clone(),
            listener: RwLock::new(None),
            device_lost: AtomicBool::new(false),
            events: callbacks.clone(),
        });

        Self {
            request,
            backend,
            state,
            handle: OnceCell::new(),
            inner: Mutex::new(StreamInner {
                config: None,
                session: None,
                registry: None,
            }),
            gate,
            callbacks,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    /// Handle assigned by a [`NativeHandleRegistry`], if registered
    pub fn handle(&self) -> Option<Handle> {
        self.handle.get().copied()
    }

    pub fn request(&self) -> &AudioIOBuilder {
        &self.request
    }

    /// Validated configuration, once `open` has succeeded
    pub fn config(&self) -> Option<StreamConfig> {
        self.inner.lock().config
    }

    pub fn add_callback(&self, callback: Arc<dyn StreamCallback>) {
        self.callbacks.add_callback(callback);
    }

    /// Install or clear the receiver for device data
    pub fn set_data_listener(&self, listener: Option<Arc<dyn DataCallback>>) {
        *self.gate.listener.write() = listener;
    }

    pub fn open(&self) -> Result<StreamState> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            self.open_locked(&mut inner, &mut events)
        };
        self.finish(events, result)
    }

    pub fn start(&self) -> Result<StreamState> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            self.start_locked(&mut inner, &mut events)
        };
        self.finish(events, result)
    }

    pub fn stop(&self) -> Result<StreamState> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.inner.lock();
            self.stop_locked(&mut inner, &mut events)
        };
        self.finish(events, result)
    }

    /// Close the session (if any), unregister and move to RELEASED.
    ///
    /// Valid from every state and idempotent: releasing a released stream is
    /// a no-op. Backend close failures are logged and swallowed.
    pub fn release(&self) -> Result<StreamState> {
        let mut events = Vec::new();
        {
            let mut inner = self.inner.lock();
            if self.state.get() == StreamState::Released {
                log::debug!("{} release on released stream ignored", self.label());
                return Ok(StreamState::Released);
            }

            self.set_state(StreamState::Closing, &mut events);
            if let Some(session) = inner.session.take() {
                self.close_session(session);
            }

            if let (Some(registry), Some(handle)) = (inner.registry.take(), self.handle()) {
                if let Some(registry) = registry.upgrade() {
                    registry.unregister(handle);
                }
            }

            *self.gate.listener.write() = None;
            self.set_state(StreamState::Released, &mut events);
        }

        self.callbacks.dispatch_all(events);
        self.callbacks.clear_callbacks();
        log::info!("{} released", self.label());
        Ok(StreamState::Released)
    }

    fn open_locked(
        &self,
        inner: &mut StreamInner,
        events: &mut Vec<StreamEvent>,
    ) -> Result<StreamState> {
        self.reconcile_device_loss(inner, events);

        let current = self.state.get();
        let retry = current == StreamState::Error && inner.session.is_none();
        if current != StreamState::Created && !retry {
            return Err(invalid_state("open", current));
        }

        self.set_state(StreamState::Opening, events);

        let config = match self.request.validate() {
            Ok(config) => config,
            Err(e) => {
                log::error!("{} rejected config: {}", self.label(), e);
                self.set_state(StreamState::Error, events);
                return Err(e.into());
            }
        };

        self.gate.device_lost.store(false, Ordering::Release);
        let callback: Arc<dyn DataCallback> = self.gate.clone();
        match self.backend.open(&config, callback) {
            Ok(session) => {
                log::info!(
                    "{} opened session {}: {}Hz, {} channels, {:?}, {:?}",
                    self.label(),
                    session.id(),
                    config.sample_rate(),
                    config.channels().count(),
                    config.format(),
                    config.direction()
                );
                inner.config = Some(config);
                inner.session = Some(session);
                self.set_state(StreamState::Open, events);
                Ok(StreamState::Open)
            }
            Err(e) => {
                log::error!("{} failed to open device: {}", self.label(), e);
                self.set_state(StreamState::Error, events);
                Err(e.into())
            }
        }
    }

    fn start_locked(
        &self,
        inner: &mut StreamInner,
        events: &mut Vec<StreamEvent>,
    ) -> Result<StreamState> {
        self.reconcile_device_loss(inner, events);

        let current = self.state.get();
        let session = match (current, inner.session.as_ref()) {
            (StreamState::Open, Some(session)) => session,
            _ => return Err(invalid_state("start", current)),
        };

        match self.backend.start(session) {
            Ok(()) => {
                self.set_state(StreamState::Running, events);
                Ok(StreamState::Running)
            }
            Err(e) if e.is_fatal() => {
                log::error!("{} lost device while starting: {}", self.label(), e);
                self.fail_session(inner, events);
                Err(e.into())
            }
            Err(e) => {
                // Not fatal; the caller may retry, stop or release
                log::warn!("{} failed to start: {}", self.label(), e);
                Err(e.into())
            }
        }
    }

    fn stop_locked(
        &self,
        inner: &mut StreamInner,
        events: &mut Vec<StreamEvent>,
    ) -> Result<StreamState> {
        self.reconcile_device_loss(inner, events);

        let current = self.state.get();
        match current {
            StreamState::Created | StreamState::Open => {
                log::debug!("{} stop in {:?} is a no-op", self.label(), current);
                Ok(current)
            }
            StreamState::Running => {
                let session = match inner.session.as_ref() {
                    Some(session) => session,
                    None => return Err(invalid_state("stop", current)),
                };

                self.set_state(StreamState::Stopping, events);
                match self.backend.stop(session) {
                    Ok(()) => {
                        self.set_state(StreamState::Open, events);
                        Ok(StreamState::Open)
                    }
                    Err(e) if e.is_fatal() => {
                        log::error!("{} lost device while stopping: {}", self.label(), e);
                        self.fail_session(inner, events);
                        Err(e.into())
                    }
                    Err(e) => {
                        log::warn!("{} failed to stop: {}", self.label(), e);
                        self.set_state(StreamState::Running, events);
                        Err(e.into())
                    }
                }
            }
            other => Err(invalid_state("stop", other)),
        }
    }

    /// Apply a device loss reported on a backend thread.
    fn reconcile_device_loss(&self, inner: &mut StreamInner, events: &mut Vec<StreamEvent>) {
        if !self.gate.device_lost.load(Ordering::Acquire) {
            return;
        }
        if matches!(self.state.get(), StreamState::Open | StreamState::Running) {
            log::warn!("{} device was lost, moving to error", self.label());
            self.fail_session(inner, events);
        }
    }

    fn fail_session(&self, inner: &mut StreamInner, events: &mut Vec<StreamEvent>) {
        if let Some(session) = inner.session.take() {
            self.close_session(session);
        }
        self.set_state(StreamState::Error, events);
    }

    fn close_session(&self, session: SessionHandle) {
        let id = session.id();
        match self.backend.close(session) {
            Ok(()) => log::debug!("{} closed session {}", self.label(), id),
            Err(e) => log::warn!("{} ignoring close failure on session {}: {}", self.label(), id, e),
        }
    }

    fn set_state(&self, new_state: StreamState, events: &mut Vec<StreamEvent>) {
        let old_state = self.state.set(new_state);
        if old_state != new_state {
            log::debug!("{} {:?} -> {:?}", self.label(), old_state, new_state);
            events.push(StreamEvent::StateChanged {
                old_state,
                new_state,
            });
        }
    }

    /// Dispatch collected events after the lifecycle lock is dropped.
    fn finish(&self, mut events: Vec<StreamEvent>, result: Result<StreamState>) -> Result<StreamState> {
        if let Err(e) = &result {
            events.push(StreamEvent::Error {
                message: e.to_string(),
            });
        }
        self.callbacks.dispatch_all(events);
        result
    }

    /// Record the registry and handle, under the lifecycle lock so a
    /// concurrent release cannot miss the registration.
    pub(crate) fn bind_registry(
        &self,
        registry: &Arc<NativeHandleRegistry>,
        insert: impl FnOnce(Handle),
    ) -> Handle {
        let mut inner = self.inner.lock();
        if let Some(handle) = self.handle.get() {
            return *handle;
        }

        let handle = registry.issue_handle();
        let _ = self.handle.set(handle);
        if self.state.get() == StreamState::Released {
            log::warn!("Stream registered after release; handle {} stays unresolvable", handle);
            return handle;
        }

        inner.registry = Some(Arc::downgrade(registry));
        insert(handle);
        handle
    }

    fn label(&self) -> String {
        match self.handle.get() {
            Some(handle) => format!("[stream {}]", handle),
            None => "[stream -]".to_string(),
        }
    }
}

impl Drop for AudioIOStream {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(session) = inner.session.take() {
            log::warn!(
                "Stream dropped without release, closing session {}",
                session.id()
            );
            if let Err(e) = self.backend.close(session) {
                log::warn!("Close during drop failed: {}", e);
            }
        }
    }
}

fn invalid_state(operation: &'static str, state: StreamState) -> StreamError {
    StreamError::InvalidState { operation, state }
}
