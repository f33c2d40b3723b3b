// Oboe-based NativeAudioBackend for Android

use crate::frames::FrameBytes;
use audioio_core::{
    AudioApi, BackendError, ChannelCount, DataCallback, Direction, NativeAudioBackend,
    SampleFormat, SessionHandle, SharingMode, StreamConfig,
};
use oboe::{
    AudioInputCallback, AudioInputStreamSafe, AudioOutputCallback, AudioOutputStreamSafe,
    AudioStream, AudioStreamAsync, AudioStreamBuilder, DataCallbackResult, Input, IsChannelCount,
    IsFormat, IsFrameType, Mono, Output, PerformanceMode, Stereo,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Object-safe view over the typed Oboe stream
trait DeviceStream: Send {
    fn start(&mut self) -> Result<(), oboe::Error>;
    fn stop(&mut self) -> Result<(), oboe::Error>;
    fn close(&mut self) -> Result<(), oboe::Error>;
}

impl<D, F> DeviceStream for AudioStreamAsync<D, F>
where
    AudioStreamAsync<D, F>: AudioStream + Send,
{
    fn start(&mut self) -> Result<(), oboe::Error> {
        AudioStream::start(self)
    }

    fn stop(&mut self) -> Result<(), oboe::Error> {
        AudioStream::stop(self)
    }

    fn close(&mut self) -> Result<(), oboe::Error> {
        AudioStream::close(self)
    }
}

/// Output callback: asks the core for bytes and unpacks them into frames
struct OutputBridge<F> {
    callback: Arc<dyn DataCallback>,
    scratch: Vec<u8>,
    _frame: PhantomData<fn() -> F>,
}

impl<F> OutputBridge<F> {
    fn new(callback: Arc<dyn DataCallback>) -> Self {
        Self {
            callback,
            scratch: Vec::new(),
            _frame: PhantomData,
        }
    }
}

impl<T, C> AudioOutputCallback for OutputBridge<(T, C)>
where
    T: IsFormat,
    C: IsChannelCount,
    (T, C): IsFrameType,
    <(T, C) as IsFrameType>::Type: FrameBytes,
{
    type FrameType = (T, C);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [<(T, C) as IsFrameType>::Type],
    ) -> DataCallbackResult {
        let len = frames.len() * <<(T, C) as IsFrameType>::Type as FrameBytes>::BYTES;
        self.scratch.resize(len, 0);
        let written = self.callback.on_output(&mut self.scratch).min(len);
        FrameBytes::decode(&self.scratch[..written], frames);
        DataCallbackResult::Continue
    }

    fn on_error_after_close(&mut self, _stream: &mut dyn AudioOutputStreamSafe, error: oboe::Error) {
        self.callback.on_error(map_error(error));
    }
}

/// Input callback: packs captured frames into bytes for the core
struct InputBridge<F> {
    callback: Arc<dyn DataCallback>,
    scratch: Vec<u8>,
    _frame: PhantomData<fn() -> F>,
}

impl<F> InputBridge<F> {
    fn new(callback: Arc<dyn DataCallback>) -> Self {
        Self {
            callback,
            scratch: Vec::new(),
            _frame: PhantomData,
        }
    }
}

impl<T, C> AudioInputCallback for InputBridge<(T, C)>
where
    T: IsFormat,
    C: IsChannelCount,
    (T, C): IsFrameType,
    <(T, C) as IsFrameType>::Type: FrameBytes,
{
    type FrameType = (T, C);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioInputStreamSafe,
        frames: &[<(T, C) as IsFrameType>::Type],
    ) -> DataCallbackResult {
        self.scratch.clear();
        FrameBytes::encode(frames, &mut self.scratch);
        self.callback.on_input(&self.scratch);
        DataCallbackResult::Continue
    }

    fn on_error_after_close(&mut self, _stream: &mut dyn AudioInputStreamSafe, error: oboe::Error) {
        self.callback.on_error(map_error(error));
    }
}

fn base_builder(config: &StreamConfig) -> AudioStreamBuilder<Output, oboe::Unspecified, oboe::Unspecified> {
    let audio_api = match config.audio_api() {
        AudioApi::Unspecified => oboe::AudioApi::Unspecified,
        AudioApi::OpenSLES => oboe::AudioApi::OpenSLES,
        AudioApi::AAudio => oboe::AudioApi::AAudio,
    };
    let sharing_mode = match config.sharing_mode() {
        SharingMode::Exclusive => oboe::SharingMode::Exclusive,
        SharingMode::Shared => oboe::SharingMode::Shared,
    };

    let builder = AudioStreamBuilder::default()
        .set_performance_mode(PerformanceMode::LowLatency)
        .set_audio_api(audio_api)
        .set_sharing_mode(sharing_mode)
        .set_sample_rate(config.sample_rate() as i32);

    match config.buffer_frames() {
        Some(frames) => builder.set_buffer_capacity_in_frames(frames.get() as i32),
        None => builder,
    }
}

fn open_output<T, C>(
    config: &StreamConfig,
    callback: Arc<dyn DataCallback>,
) -> Result<Box<dyn DeviceStream>, oboe::Error>
where
    T: IsFormat + 'static,
    C: IsChannelCount + 'static,
    (T, C): IsFrameType,
    <(T, C) as IsFrameType>::Type: FrameBytes,
    AudioStreamAsync<Output, OutputBridge<(T, C)>>: AudioStream + Send,
{
    let stream = base_builder(config)
        .set_format::<T>()
        .set_channel_count::<C>()
        .set_output()
        .set_callback(OutputBridge::<(T, C)>::new(callback))
        .open_stream()?;
    Ok(Box::new(stream))
}

fn open_input<T, C>(
    config: &StreamConfig,
    callback: Arc<dyn DataCallback>,
) -> Result<Box<dyn DeviceStream>, oboe::Error>
where
    T: IsFormat + 'static,
    C: IsChannelCount + 'static,
    (T, C): IsFrameType,
    <(T, C) as IsFrameType>::Type: FrameBytes,
    AudioStreamAsync<Input, InputBridge<(T, C)>>: AudioStream + Send,
{
    let stream = base_builder(config)
        .set_format::<T>()
        .set_channel_count::<C>()
        .set_input()
        .set_callback(InputBridge::<(T, C)>::new(callback))
        .open_stream()?;
    Ok(Box::new(stream))
}

fn map_error(error: oboe::Error) -> BackendError {
    match error {
        oboe::Error::Disconnected => BackendError::DeviceLost,
        oboe::Error::InvalidFormat
        | oboe::Error::InvalidRate
        | oboe::Error::IllegalArgument
        | oboe::Error::OutOfRange => BackendError::UnsupportedConfig(format!("{:?}", error)),
        oboe::Error::Unavailable
        | oboe::Error::NoService
        | oboe::Error::NoFreeHandles
        | oboe::Error::Timeout => BackendError::DeviceUnavailable(format!("{:?}", error)),
        other => BackendError::Other(format!("{:?}", other)),
    }
}

type SharedStream = Arc<Mutex<Box<dyn DeviceStream>>>;

/// Oboe audio backend
///
/// Each session is an Oboe async stream behind its own lock, so device calls
/// on one session never wait on another.
pub struct OboeBackend {
    next_session: AtomicU64,
    sessions: Mutex<HashMap<u64, SharedStream>>,
}

impl OboeBackend {
    pub fn new() -> Self {
        Self {
            next_session: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn session(&self, session: &SessionHandle) -> Result<SharedStream, BackendError> {
        self.sessions
            .lock()
            .get(&session.id())
            .cloned()
            .ok_or(BackendError::DeviceLost)
    }
}

impl Default for OboeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeAudioBackend for OboeBackend {
    fn open(
        &self,
        config: &StreamConfig,
        callback: Arc<dyn DataCallback>,
    ) -> Result<SessionHandle, BackendError> {
        use ChannelCount::{Mono as M, Stereo as S};
        use SampleFormat::{Float32, Pcm16, Pcm32};

        let stream = match (config.direction(), config.format(), config.channels()) {
            (Direction::Output, Pcm16, M) => open_output::<i16, Mono>(config, callback),
            (Direction::Output, Pcm16, S) => open_output::<i16, Stereo>(config, callback),
            (Direction::Output, Pcm32, M) => open_output::<i32, Mono>(config, callback),
            (Direction::Output, Pcm32, S) => open_output::<i32, Stereo>(config, callback),
            (Direction::Output, Float32, M) => open_output::<f32, Mono>(config, callback),
            (Direction::Output, Float32, S) => open_output::<f32, Stereo>(config, callback),
            (Direction::Input, Pcm16, M) => open_input::<i16, Mono>(config, callback),
            (Direction::Input, Pcm16, S) => open_input::<i16, Stereo>(config, callback),
            (Direction::Input, Pcm32, M) => open_input::<i32, Mono>(config, callback),
            (Direction::Input, Pcm32, S) => open_input::<i32, Stereo>(config, callback),
            (Direction::Input, Float32, M) => open_input::<f32, Mono>(config, callback),
            (Direction::Input, Float32, S) => open_input::<f32, Stereo>(config, callback),
        }
        .map_err(|e| {
            log::error!("Failed to open Oboe stream: {:?}", e);
            map_error(e)
        })?;

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().insert(id, Arc::new(Mutex::new(stream)));
        log::debug!("Oboe session {} opened", id);
        Ok(SessionHandle::new(id))
    }

    fn start(&self, session: &SessionHandle) -> Result<(), BackendError> {
        let stream = self.session(session)?;
        let result = stream.lock().start();
        result.map_err(map_error)
    }

    fn stop(&self, session: &SessionHandle) -> Result<(), BackendError> {
        let stream = self.session(session)?;
        let result = stream.lock().stop();
        result.map_err(map_error)
    }

    fn close(&self, session: SessionHandle) -> Result<(), BackendError> {
        let stream = self.sessions.lock().remove(&session.id());
        match stream {
            Some(stream) => {
                let result = stream.lock().close();
                log::debug!("Oboe session {} closed", session.id());
                result.map_err(map_error)
            }
            None => Ok(()),
        }
    }
}
