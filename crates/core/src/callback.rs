// Thread-safe delivery of stream lifecycle events

use crate::state::StreamState;
use parking_lot::Mutex;
use std::sync::Arc;

/// Stream event types
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Lifecycle state changed
    StateChanged {
        old_state: StreamState,
        new_state: StreamState,
    },

    /// A lifecycle operation failed
    Error { message: String },

    /// The backend reported the device gone; the stream moves to ERROR on
    /// its next lifecycle operation
    DeviceLost,
}

/// Stream callback trait
/// Implementations should be lightweight and non-blocking
pub trait StreamCallback: Send + Sync {
    /// Called when an event occurs. `DeviceLost` arrives on a backend thread.
    fn on_event(&self, event: StreamEvent);
}

/// Callback manager for handling multiple callbacks
pub struct CallbackManager {
    callbacks: Mutex<Vec<Arc<dyn StreamCallback>>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn add_callback(&self, callback: Arc<dyn StreamCallback>) {
        self.callbacks.lock().push(callback);
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.lock().clear();
    }

    pub fn dispatch_event(&self, event: StreamEvent) {
        // Snapshot so a callback may register or clear callbacks
        let callbacks: Vec<_> = self.callbacks.lock().clone();
        for callback in callbacks.iter() {
            callback.on_event(event.clone());
        }
    }

    pub fn dispatch_all(&self, events: Vec<StreamEvent>) {
        for event in events {
            self.dispatch_event(event);
        }
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple callback implementation for testing
#[cfg(test)]
pub struct TestCallback {
    events: Mutex<Vec<StreamEvent>>,
}

#[cfg(test)]
impl TestCallback {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn get_events(&self) -> Vec<StreamEvent> {
        self.events.lock().clone()
    }
}

#[cfg(test)]
impl StreamCallback for TestCallback {
    fn on_event(&self, event: StreamEvent) {
        self.events.lock().push(event);
    }
}
