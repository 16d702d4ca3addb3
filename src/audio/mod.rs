//! Audio output: the sink the transport schedules voices into.
//!
//! [`AudioSink`] is the narrow boundary: a monotonic clock plus "play this
//! buffer at that time". [`AudioEngine`] implements it on a cpal output stream,
//! talking to the audio thread through a lock-free ring buffer of
//! [`AudioCommand`]s. [`Bounce`] implements it offline for export and tests.

pub mod bounce;
pub mod callback;
pub mod command;
pub mod limiter;
pub mod mixer;
pub mod wav;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};

pub use bounce::Bounce;
pub use command::AudioCommand;
pub use limiter::Limiter;
pub use mixer::Mixer;

use callback::AudioCallback;

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 1024;

/// Identifies one scheduled voice so it can be stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub u64);

/// Audio engine errors.
#[derive(Debug)]
pub enum AudioError {
    /// No audio output device found.
    NoOutputDevice,
    /// Failed to query device configuration.
    DeviceConfig(String),
    /// Failed to build the audio stream.
    StreamBuild(String),
    /// Failed to start the audio stream.
    StreamPlay(String),
    /// Ring buffer is full; the audio thread is not draining fast enough.
    BufferFull,
    /// Writing an audio file failed.
    Encode(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoOutputDevice => write!(f, "no audio output device found"),
            AudioError::DeviceConfig(e) => write!(f, "device config error: {e}"),
            AudioError::StreamBuild(e) => write!(f, "stream build error: {e}"),
            AudioError::StreamPlay(e) => write!(f, "stream play error: {e}"),
            AudioError::BufferFull => write!(f, "audio command ring buffer is full"),
            AudioError::Encode(e) => write!(f, "audio encode error: {e}"),
        }
    }
}

impl std::error::Error for AudioError {}

impl From<hound::Error> for AudioError {
    fn from(e: hound::Error) -> Self {
        AudioError::Encode(e.to_string())
    }
}

/// Where rendered voices go.
pub trait AudioSink {
    /// Frames per second of the output clock.
    fn sample_rate(&self) -> u32;

    /// Current audio clock in seconds. Never decreases.
    fn now(&self) -> f64;

    /// Schedule a mono buffer to start at absolute time `at` (seconds).
    fn play(&mut self, samples: Vec<f32>, at: f64) -> Result<VoiceHandle, AudioError>;

    /// Silence one voice.
    fn stop(&mut self, voice: VoiceHandle) -> Result<(), AudioError>;

    /// Silence every voice.
    fn stop_all(&mut self) -> Result<(), AudioError>;
}

/// Convert an absolute time to a frame index on a clock running at `sample_rate`.
pub fn seconds_to_frame(at: f64, sample_rate: u32) -> u64 {
    if at.is_finite() && at > 0.0 {
        (at * sample_rate as f64).round() as u64
    } else {
        0
    }
}

/// The audio engine. Owns the cpal stream and ring buffer producer.
///
/// Created on the main thread, sends commands to the audio thread via the
/// lock-free ring buffer.
pub struct AudioEngine {
    _stream: cpal::Stream,
    producer: ringbuf::HeapProd<AudioCommand>,
    clock: Arc<AtomicU64>,
    next_voice: u64,
    sample_rate: u32,
    channels: u16,
}

impl AudioEngine {
    /// Create and start the audio engine with the default output device.
    pub fn new(limiter: Limiter) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        Self::build_with_device(&device, sample_rate, channels, limiter)
    }

    /// Create the audio engine with a specific sample rate and channel count.
    ///
    /// Uses the default output device but overrides its configuration.
    pub fn with_config(
        sample_rate: u32,
        channels: u16,
        limiter: Limiter,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        Self::build_with_device(&device, sample_rate, channels, limiter)
    }

    /// Internal builder: sets up ring buffer, callback, and stream.
    fn build_with_device(
        device: &cpal::Device,
        sample_rate: u32,
        channels: u16,
        limiter: Limiter,
    ) -> Result<Self, AudioError> {
        let rb = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY);
        let (producer, consumer) = rb.split();

        let clock = Arc::new(AtomicU64::new(0));
        let mut audio_callback =
            AudioCallback::new(consumer, Arc::clone(&clock), channels, limiter);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            log::error!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        log::info!("audio output: {sample_rate} Hz, {channels} channel(s)");

        Ok(Self {
            _stream: stream,
            producer,
            clock,
            next_voice: 0,
            sample_rate,
            channels,
        })
    }

    fn send(&mut self, command: AudioCommand) -> Result<(), AudioError> {
        self.producer
            .try_push(command)
            .map_err(|_| AudioError::BufferFull)
    }

    /// Set master volume (clamped to 0.0..=1.0 on the audio thread).
    pub fn set_volume(&mut self, volume: f32) -> Result<(), AudioError> {
        self.send(AudioCommand::SetVolume(volume))
    }

    /// Get the number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl AudioSink for AudioEngine {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn now(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn play(&mut self, samples: Vec<f32>, at: f64) -> Result<VoiceHandle, AudioError> {
        let voice = VoiceHandle(self.next_voice);
        self.next_voice += 1;
        let start_frame = seconds_to_frame(at, self.sample_rate);
        self.send(AudioCommand::Play {
            voice,
            start_frame,
            samples,
        })?;
        Ok(voice)
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        self.send(AudioCommand::Stop(voice))
    }

    fn stop_all(&mut self) -> Result<(), AudioError> {
        self.send(AudioCommand::StopAll)
    }
}
