// Boundary behaviour driven the way the managed side drives it: a raw i64
// handle slot per object, integer status codes back.

use audio_io::{BoundaryAdapter, StatusCode};
use audioio_core::mock::MockBackend;
use audioio_core::{
    AudioIOBuilder, BackendError, DataCallback, Direction, Handle, SampleFormat, StreamState,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup() -> (BoundaryAdapter, Arc<MockBackend>) {
    init_test_logging();
    let backend = Arc::new(MockBackend::new());
    (BoundaryAdapter::new(backend.clone()), backend)
}

#[derive(Default)]
struct RecordingListener {
    captured: Mutex<Vec<u8>>,
}

impl DataCallback for RecordingListener {
    fn on_input(&self, data: &[u8]) {
        self.captured.lock().extend_from_slice(data);
    }

    fn on_output(&self, data: &mut [u8]) -> usize {
        let written = data.len() / 2;
        data[..written].fill(0x11);
        written
    }

    fn on_error(&self, _error: BackendError) {}
}

#[test]
fn test_managed_lifecycle_round() {
    let (adapter, backend) = setup();
    let mut field = Handle::NONE;

    adapter.create(&mut field, AudioIOBuilder::new()).unwrap();
    assert_eq!(adapter.open(&mut field), StatusCode::Ok);
    assert_eq!(adapter.start(&mut field), StatusCode::Ok);
    assert_eq!(adapter.state(&mut field), StreamState::Running.code());
    assert_eq!(adapter.stop(&mut field), StatusCode::Ok);
    assert_eq!(adapter.release(&mut field), StatusCode::Ok);

    assert_eq!(field, Handle::NONE);
    assert_eq!(backend.call_names(), vec!["open", "start", "stop", "close"]);
    assert!(adapter.registry().is_empty());
}

#[test]
fn test_invalid_builder_reports_config_error_and_opens_nothing() {
    let (adapter, backend) = setup();
    let mut field = Handle::NONE;
    let request = AudioIOBuilder::new().direction(Direction::Input).sample_rate(0);

    adapter.create(&mut field, request).unwrap();

    assert_eq!(adapter.open(&mut field), StatusCode::ConfigInvalid);
    assert_eq!(adapter.state(&mut field), StreamState::Error.code());
    assert_eq!(backend.open_count(), 0);
    assert_eq!(adapter.release(&mut field), StatusCode::Ok);
}

#[test]
fn test_device_failures_map_to_status_codes() {
    let (adapter, backend) = setup();
    let mut field = Handle::NONE;
    adapter.create(&mut field, AudioIOBuilder::new()).unwrap();

    backend.fail_next_open(BackendError::PermissionDenied);
    assert_eq!(adapter.open(&mut field), StatusCode::PermissionDenied);

    // ERROR without a session may retry
    assert_eq!(adapter.open(&mut field), StatusCode::Ok);
    backend.fail_next_start(BackendError::DeviceLost);
    assert_eq!(adapter.start(&mut field), StatusCode::DeviceLost);
    assert_eq!(adapter.state(&mut field), StreamState::Error.code());
    assert_eq!(backend.live_sessions(), 0);

    adapter.release(&mut field);
    assert_eq!(backend.open_count(), backend.close_count());
}

#[test]
fn test_device_loss_while_running_surfaces_on_next_call() {
    let (adapter, backend) = setup();
    let mut field = Handle::NONE;
    adapter.create(&mut field, AudioIOBuilder::new()).unwrap();
    adapter.open(&mut field);
    adapter.start(&mut field);

    backend.emit_error(BackendError::DeviceLost);

    assert_eq!(adapter.stop(&mut field), StatusCode::InvalidState);
    assert_eq!(adapter.state(&mut field), StreamState::Error.code());
    assert_eq!(backend.live_sessions(), 0);
    assert_eq!(adapter.release(&mut field), StatusCode::Ok);
    assert!(backend.violations().is_empty());
}

#[test]
fn test_listener_only_sees_data_while_running() {
    let (adapter, backend) = setup();
    let mut field = Handle::NONE;
    let request = AudioIOBuilder::new()
        .direction(Direction::Input)
        .format(SampleFormat::Pcm16);
    adapter.create(&mut field, request).unwrap();

    let listener = Arc::new(RecordingListener::default());
    assert_eq!(
        adapter.set_data_listener(&mut field, Some(listener.clone())),
        StatusCode::Ok
    );

    adapter.open(&mut field);
    backend.emit_input(&[1, 2]);
    adapter.start(&mut field);
    backend.emit_input(&[3, 4]);
    adapter.stop(&mut field);
    backend.emit_input(&[5, 6]);

    assert_eq!(*listener.captured.lock(), vec![3, 4]);
    adapter.release(&mut field);
}

#[test]
fn test_output_listener_fills_and_rest_is_silence() {
    let (adapter, backend) = setup();
    let mut field = Handle::NONE;
    adapter.create(&mut field, AudioIOBuilder::new()).unwrap();
    adapter.set_data_listener(&mut field, Some(Arc::new(RecordingListener::default())));
    adapter.open(&mut field);
    adapter.start(&mut field);

    let pulled = backend.pull_output(8);

    assert_eq!(pulled.len(), 1);
    let (written, buffer) = &pulled[0];
    assert_eq!(*written, 4);
    assert_eq!(buffer[..4], [0x11; 4]);
    assert_eq!(buffer[4..], [0; 4]);
    adapter.release(&mut field);
}

#[test]
fn test_copied_handle_is_dead_after_release() {
    let (adapter, backend) = setup();
    let mut field = Handle::NONE;
    adapter.create(&mut field, AudioIOBuilder::new()).unwrap();
    let mut stale_copy = field;

    adapter.release(&mut field);
    adapter.create(&mut field, AudioIOBuilder::new()).unwrap();

    assert_ne!(field, stale_copy);
    assert_eq!(adapter.open(&mut stale_copy), StatusCode::InvalidHandle);
    assert_eq!(adapter.state(&mut field), StreamState::Created.code());
    assert_eq!(backend.open_count(), 0);
}

#[test]
fn test_concurrent_release_from_many_threads() {
    let (adapter, backend) = setup();

    for _ in 0..20 {
        let mut field = Handle::NONE;
        adapter.create(&mut field, AudioIOBuilder::new()).unwrap();
        adapter.open(&mut field);
        adapter.start(&mut field);

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let adapter = adapter.clone();
                let mut slot = field;
                thread::spawn(move || {
                    if i % 2 == 0 {
                        adapter.release(&mut slot)
                    } else {
                        adapter.stop(&mut slot)
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        adapter.release(&mut field);
    }

    assert!(adapter.registry().is_empty());
    assert_eq!(backend.open_count(), 20);
    assert_eq!(backend.close_count(), 20);
    assert!(backend.violations().is_empty());
}
