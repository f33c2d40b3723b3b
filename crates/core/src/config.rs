// Stream configuration: the raw request from the managed side and its validated form

use crate::error::ConfigError;
use std::num::NonZeroU32;

/// Sample encoding of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Signed 16-bit integer
    Pcm16,
    /// Signed 32-bit integer
    Pcm32,
    /// 32-bit float
    Float32,
}

impl SampleFormat {
    pub fn code(self) -> i32 {
        match self {
            SampleFormat::Pcm16 => 1,
            SampleFormat::Float32 => 2,
            SampleFormat::Pcm32 => 4,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Pcm16 => 2,
            SampleFormat::Pcm32 | SampleFormat::Float32 => 4,
        }
    }
}

impl TryFrom<i32> for SampleFormat {
    type Error = ConfigError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SampleFormat::Pcm16),
            2 => Ok(SampleFormat::Float32),
            4 => Ok(SampleFormat::Pcm32),
            other => Err(ConfigError::UnsupportedFormat(other)),
        }
    }
}

/// Data direction of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Playback
    Output,
    /// Recording
    Input,
}

impl Direction {
    pub fn code(self) -> i32 {
        match self {
            Direction::Output => 0,
            Direction::Input => 1,
        }
    }
}

impl TryFrom<i32> for Direction {
    type Error = ConfigError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Direction::Output),
            1 => Ok(Direction::Input),
            other => Err(ConfigError::UnsupportedDirection(other)),
        }
    }
}

/// Channel layout; only mono and stereo are supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCount {
    Mono,
    Stereo,
}

impl ChannelCount {
    pub fn count(self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
        }
    }
}

impl TryFrom<i32> for ChannelCount {
    type Error = ConfigError;

    fn try_from(count: i32) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(ChannelCount::Mono),
            2 => Ok(ChannelCount::Stereo),
            other => Err(ConfigError::UnsupportedChannelCount(other)),
        }
    }
}

/// Platform audio API selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioApi {
    /// Try AAudio, fall back to OpenSL ES
    #[default]
    Unspecified,
    OpenSLES,
    /// AAudio only; fail if unavailable
    AAudio,
}

impl AudioApi {
    pub fn code(self) -> i32 {
        match self {
            AudioApi::Unspecified => 0,
            AudioApi::OpenSLES => 1,
            AudioApi::AAudio => 2,
        }
    }
}

impl TryFrom<i32> for AudioApi {
    type Error = ConfigError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(AudioApi::Unspecified),
            1 => Ok(AudioApi::OpenSLES),
            2 => Ok(AudioApi::AAudio),
            other => Err(ConfigError::UnsupportedAudioApi(other)),
        }
    }
}

/// Whether the device is held exclusively or shared with other apps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharingMode {
    Exclusive,
    #[default]
    Shared,
}

impl SharingMode {
    pub fn code(self) -> i32 {
        match self {
            SharingMode::Exclusive => 0,
            SharingMode::Shared => 1,
        }
    }
}

impl TryFrom<i32> for SharingMode {
    type Error = ConfigError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SharingMode::Exclusive),
            1 => Ok(SharingMode::Shared),
            other => Err(ConfigError::UnsupportedSharingMode(other)),
        }
    }
}

/// Unvalidated stream request.
///
/// Holds the raw integer values the managed `AudioIOBuilder` carries, so a
/// stream can be created from anything the caller sends and validation is
/// deferred to `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioIOBuilder {
    pub sample_rate: i32,
    pub channel_count: i32,
    pub format: i32,
    pub direction: i32,
    pub audio_api: i32,
    pub sharing_mode: i32,
    /// Requested buffer capacity in frames; 0 leaves it to the device
    pub buffer_size: i32,
}

impl AudioIOBuilder {
    pub fn new() -> Self {
        Self {
            sample_rate: 48000,
            channel_count: 2,
            format: SampleFormat::Float32.code(),
            direction: Direction::Output.code(),
            audio_api: AudioApi::Unspecified.code(),
            sharing_mode: SharingMode::Shared.code(),
            buffer_size: 0,
        }
    }

    pub fn sample_rate(mut self, sample_rate: i32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn channel_count(mut self, channel_count: i32) -> Self {
        self.channel_count = channel_count;
        self
    }

    pub fn format(mut self, format: SampleFormat) -> Self {
        self.format = format.code();
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction.code();
        self
    }

    pub fn audio_api(mut self, audio_api: AudioApi) -> Self {
        self.audio_api = audio_api.code();
        self
    }

    pub fn sharing_mode(mut self, sharing_mode: SharingMode) -> Self {
        self.sharing_mode = sharing_mode.code();
        self
    }

    pub fn buffer_size(mut self, frames: i32) -> Self {
        self.buffer_size = frames;
        self
    }

    pub fn validate(&self) -> Result<StreamConfig, ConfigError> {
        StreamConfig::validate(self)
    }
}

impl Default for AudioIOBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated, immutable stream description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    sample_rate: u32,
    channels: ChannelCount,
    format: SampleFormat,
    direction: Direction,
    buffer_frames: Option<NonZeroU32>,
    audio_api: AudioApi,
    sharing_mode: SharingMode,
}

impl StreamConfig {
    pub fn validate(request: &AudioIOBuilder) -> Result<Self, ConfigError> {
        if request.sample_rate <= 0 {
            return Err(ConfigError::InvalidSampleRate(request.sample_rate));
        }
        let channels = ChannelCount::try_from(request.channel_count)?;
        let format = SampleFormat::try_from(request.format)?;
        let direction = Direction::try_from(request.direction)?;
        if request.buffer_size < 0 {
            return Err(ConfigError::InvalidBufferSize(request.buffer_size));
        }
        let audio_api = AudioApi::try_from(request.audio_api)?;
        let sharing_mode = SharingMode::try_from(request.sharing_mode)?;

        Ok(Self {
            sample_rate: request.sample_rate as u32,
            channels,
            format,
            direction,
            buffer_frames: NonZeroU32::new(request.buffer_size as u32),
            audio_api,
            sharing_mode,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> ChannelCount {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// `None` when the device picks its own buffer size
    pub fn buffer_frames(&self) -> Option<NonZeroU32> {
        self.buffer_frames
    }

    pub fn audio_api(&self) -> AudioApi {
        self.audio_api
    }

    pub fn sharing_mode(&self) -> SharingMode {
        self.sharing_mode
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channels.count() as usize
    }
}
