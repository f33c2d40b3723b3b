// JNI bindings for com.alan.audioio.audio.AudioIOStream
// Every export resolves the mNativeContext handle and returns a status code

use crate::adapter::{BoundaryAdapter, HandleField};
use crate::native;
use crate::status::{BoundaryError, StatusCode};
use audioio_backend_oboe::OboeBackend;
use audioio_core::{AudioIOBuilder, BackendError, DataCallback, Handle, NativeAudioBackend};
use jni::objects::{GlobalRef, JClass, JObject, JValue};
use jni::sys::{jint, JNI_VERSION_1_6};
use jni::{JNIEnv, JavaVM};
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const CONTEXT_FIELD: &str = "mNativeContext";
const CONTEXT_SIG: &str = "J";

/// The `long mNativeContext` field of a managed AudioIOStream
struct JniHandleField<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    obj: &'a JObject<'local>,
}

impl<'a, 'local> JniHandleField<'a, 'local> {
    fn new(env: &'a mut JNIEnv<'local>, obj: &'a JObject<'local>) -> Self {
        Self { env, obj }
    }
}

impl HandleField for JniHandleField<'_, '_> {
    fn load(&mut self) -> Result<i64, BoundaryError> {
        Ok(self.env.get_field(self.obj, CONTEXT_FIELD, CONTEXT_SIG)?.j()?)
    }

    fn store(&mut self, raw: i64) -> Result<(), BoundaryError> {
        self.env
            .set_field(self.obj, CONTEXT_FIELD, CONTEXT_SIG, JValue::Long(raw))?;
        Ok(())
    }
}

/// Java exceptions must not stay pending when control returns to the VM
fn clear_pending_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
}

/// Read the integer fields of a managed AudioIOBuilder
fn read_builder(env: &mut JNIEnv, builder: &JObject) -> Result<AudioIOBuilder, BoundaryError> {
    if builder.is_null() {
        return Err(BoundaryError::MalformedBuilder("builder is null".to_string()));
    }

    let mut int_field = |name: &str| -> Result<i32, BoundaryError> {
        env.get_field(builder, name, "I")
            .and_then(|value| value.i())
            .map_err(|e| BoundaryError::MalformedBuilder(format!("{}: {}", name, e)))
    };

    Ok(AudioIOBuilder {
        sample_rate: int_field("sampleRate")?,
        channel_count: int_field("channelCount")?,
        format: int_field("format")?,
        direction: int_field("direction")?,
        audio_api: int_field("audioApi")?,
        sharing_mode: int_field("sharingMode")?,
        buffer_size: int_field("bufferSize")?,
    })
}

/// Run `op` against the adapter with the object's handle field
fn dispatch<'local, F>(
    env: &mut JNIEnv<'local>,
    obj: &JObject<'local>,
    operation: &str,
    op: F,
) -> jint
where
    F: FnOnce(&BoundaryAdapter, &mut JniHandleField) -> StatusCode,
{
    let status = match native::adapter() {
        Ok(adapter) => op(&adapter, &mut JniHandleField::new(env, obj)),
        Err(e) => {
            log::error!("{} rejected: {}", operation, e);
            StatusCode::from(&e)
        }
    };
    clear_pending_exception(env);
    status.code()
}

/// Forwards device data to an IDataAvailableListener.
///
/// Invoked on the backend's audio thread, which is attached to the VM as a
/// daemon on first use.
struct JniDataListener {
    vm: JavaVM,
    listener: GlobalRef,
    failed: AtomicBool,
}

impl JniDataListener {
    fn new(env: &mut JNIEnv, listener: &JObject) -> Result<Self, BoundaryError> {
        Ok(Self {
            vm: env.get_java_vm()?,
            listener: env.new_global_ref(listener)?,
            failed: AtomicBool::new(false),
        })
    }

    fn capture(&self, data: &[u8]) -> Result<(), BoundaryError> {
        let mut env = self.vm.attach_current_thread_as_daemon()?;
        env.with_local_frame(4, |env| -> Result<(), BoundaryError> {
            let array = env.byte_array_from_slice(data)?;
            let buffer = wrap_buffer(env, &array)?;
            self.notify(env, &buffer)
        })
    }

    fn render(&self, data: &mut [u8]) -> Result<usize, BoundaryError> {
        let mut env = self.vm.attach_current_thread_as_daemon()?;
        env.with_local_frame(4, |env| -> Result<usize, BoundaryError> {
            let array = env.new_byte_array(data.len() as i32)?;
            let buffer = wrap_buffer(env, &array)?;
            self.notify(env, &buffer)?;

            // The listener sets limit() to the number of bytes it wrote
            let limit = env.call_method(&buffer, "limit", "()I", &[])?.i()?;
            let written = (limit.max(0) as usize).min(data.len());
            let bytes = env.convert_byte_array(&array)?;
            data[..written].copy_from_slice(&bytes[..written]);
            Ok(written)
        })
    }

    fn notify(&self, env: &mut JNIEnv, buffer: &JObject) -> Result<(), BoundaryError> {
        env.call_method(
            &self.listener,
            "onDataAvailable",
            "(Ljava/nio/ByteBuffer;)V",
            &[JValue::Object(buffer)],
        )?;
        Ok(())
    }

    fn report(&self, result: Result<(), BoundaryError>) {
        if let Err(e) = result {
            if let Ok(mut env) = self.vm.attach_current_thread_as_daemon() {
                clear_pending_exception(&mut env);
            }
            // Once per listener; this runs every audio period
            if !self.failed.swap(true, Ordering::Relaxed) {
                log::error!("Data listener failed: {}", e);
            }
        }
    }
}

fn wrap_buffer<'local>(
    env: &mut JNIEnv<'local>,
    array: &JObject,
) -> Result<JObject<'local>, BoundaryError> {
    Ok(env
        .call_static_method(
            "java/nio/ByteBuffer",
            "wrap",
            "([B)Ljava/nio/ByteBuffer;",
            &[JValue::Object(array)],
        )?
        .l()?)
}

impl DataCallback for JniDataListener {
    fn on_input(&self, data: &[u8]) {
        self.report(self.capture(data));
    }

    fn on_output(&self, data: &mut [u8]) -> usize {
        match self.render(data) {
            Ok(written) => written,
            Err(e) => {
                self.report(Err(e));
                0
            }
        }
    }

    fn on_error(&self, error: BackendError) {
        log::warn!("Device error delivered to data listener: {}", error);
    }
}

#[no_mangle]
pub extern "system" fn JNI_OnLoad(_vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
    crate::init_logging();
    log::info!("libaudio_io loaded");
    JNI_VERSION_1_6
}

#[no_mangle]
pub extern "system" fn JNI_OnUnload(_vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) {
    native::teardown();
}

/// One-time library setup; safe to call more than once
#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1init<'local>(
    mut env: JNIEnv<'local>,
    class: JClass<'local>,
) -> jint {
    crate::init_logging();

    if let Err(e) = env.get_field_id(&class, CONTEXT_FIELD, CONTEXT_SIG) {
        clear_pending_exception(&mut env);
        log::error!("AudioIOStream has no {} field: {}", CONTEXT_FIELD, e);
        return StatusCode::BoundaryFailure.code();
    }

    native::init(|| Arc::new(OboeBackend::new()) as Arc<dyn NativeAudioBackend>);
    StatusCode::Ok.code()
}

/// Create a stream from the builder and store its handle in mNativeContext
#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1create<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
    builder: JObject<'local>,
) {
    let request = read_builder(&mut env, &builder);
    // A failed field read leaves an exception pending; clear it before storing
    clear_pending_exception(&mut env);

    if let Err(e) = native::create(&mut JniHandleField::new(&mut env, &obj), request) {
        log::error!("Failed to create stream: {}", e);
    }
    clear_pending_exception(&mut env);
}

#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1open<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
) -> jint {
    dispatch(&mut env, &obj, "open", |adapter, field| adapter.open(field))
}

#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1start<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
) -> jint {
    dispatch(&mut env, &obj, "start", |adapter, field| adapter.start(field))
}

#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1stop<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
) -> jint {
    dispatch(&mut env, &obj, "stop", |adapter, field| adapter.stop(field))
}

/// Release the stream; mNativeContext is zeroed whatever happens
#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1release<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
) -> jint {
    let status = match native::adapter() {
        Ok(adapter) => adapter.release(&mut JniHandleField::new(&mut env, &obj)),
        Err(e) => {
            log::error!("release rejected: {}", e);
            let _ = JniHandleField::new(&mut env, &obj).store(Handle::NONE);
            StatusCode::from(&e)
        }
    };
    clear_pending_exception(&mut env);
    status.code()
}

/// Current state code, or a negative status
#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1get_1state<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
) -> jint {
    let state = match native::adapter() {
        Ok(adapter) => adapter.state(&mut JniHandleField::new(&mut env, &obj)),
        Err(e) => StatusCode::from(&e).code(),
    };
    clear_pending_exception(&mut env);
    state
}

/// Install (or clear, with null) the IDataAvailableListener
#[no_mangle]
pub extern "system" fn Java_com_alan_audioio_audio_AudioIOStream_native_1set_1listener<'local>(
    mut env: JNIEnv<'local>,
    obj: JObject<'local>,
    listener: JObject<'local>,
) -> jint {
    let listener: Option<Arc<dyn DataCallback>> = if listener.is_null() {
        None
    } else {
        match JniDataListener::new(&mut env, &listener) {
            Ok(listener) => Some(Arc::new(listener)),
            Err(e) => {
                clear_pending_exception(&mut env);
                log::error!("Failed to wrap data listener: {}", e);
                return StatusCode::BoundaryFailure.code();
            }
        }
    };

    dispatch(&mut env, &obj, "set_listener", |adapter, field| {
        adapter.set_data_listener(field, listener)
    })
}
