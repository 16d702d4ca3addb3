//! Audio callback: runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, mixes scheduled voices at their
//! absolute frames, applies volume and the master limiter, then advances the
//! shared frame clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::AudioCommand;
use super::limiter::Limiter;
use super::mixer::Mixer;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    mixer: Mixer,
    /// Mono scratch block, grown on demand.
    scratch: Vec<f32>,
    clock: Arc<AtomicU64>,
    volume: f32,
    limiter: Limiter,
    channels: u16,
}

impl AudioCallback {
    pub fn new(
        consumer: HeapCons<AudioCommand>,
        clock: Arc<AtomicU64>,
        channels: u16,
        limiter: Limiter,
    ) -> Self {
        Self {
            consumer,
            mixer: Mixer::new(),
            scratch: Vec::new(),
            clock,
            volume: 1.0,
            limiter,
            channels: channels.max(1),
        }
    }

    /// Called by cpal with an interleaved output buffer.
    pub fn process(&mut self, output: &mut [f32]) {
        // 1. Drain all pending commands from the ring buffer.
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                AudioCommand::Play {
                    voice,
                    start_frame,
                    samples,
                } => self.mixer.add(voice, start_frame, samples),
                AudioCommand::Stop(voice) => self.mixer.stop(voice),
                AudioCommand::StopAll => self.mixer.stop_all(),
                AudioCommand::SetVolume(v) => {
                    self.volume = v.clamp(0.0, 1.0);
                }
            }
        }

        // 2. Mix voices for this block in mono.
        let channels = self.channels as usize;
        let frames = output.len() / channels;
        let block_start = self.clock.load(Ordering::Acquire);
        self.scratch.clear();
        self.scratch.resize(frames, 0.0);
        self.mixer.mix(block_start, &mut self.scratch);

        // 3. Spread to every channel with volume, then limit.
        for (frame, &mono) in output.chunks_mut(channels).zip(&self.scratch) {
            frame.fill(mono * self.volume);
        }
        for sample in output[frames * channels..].iter_mut() {
            *sample = 0.0;
        }
        self.limiter.process_block(output);

        // 4. Advance the audio clock.
        self.clock.fetch_add(frames as u64, Ordering::Release);
    }

    /// Voices still sounding or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.mixer.active()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::VoiceHandle;
    use ringbuf::{
        traits::{Producer, Split},
        HeapRb,
    };

    /// Helper: create a stereo callback, its producer and its clock.
    fn setup(capacity: usize) -> (ringbuf::HeapProd<AudioCommand>, AudioCallback, Arc<AtomicU64>) {
        let rb = HeapRb::<AudioCommand>::new(capacity);
        let (prod, cons) = rb.split();
        let clock = Arc::new(AtomicU64::new(0));
        let callback = AudioCallback::new(cons, Arc::clone(&clock), 2, Limiter::default());
        (prod, callback, clock)
    }

    fn play(
        prod: &mut ringbuf::HeapProd<AudioCommand>,
        id: u64,
        start_frame: u64,
        samples: Vec<f32>,
    ) {
        prod.try_push(AudioCommand::Play {
            voice: VoiceHandle(id),
            start_frame,
            samples,
        })
        .unwrap();
    }

    #[test]
    fn test_callback_silence_on_empty() {
        let (_prod, mut callback, clock) = setup(16);
        let mut output = vec![999.0f32; 64];
        callback.process(&mut output);

        assert!(output.iter().all(|&s| s == 0.0));
        assert_eq!(clock.load(Ordering::Acquire), 32);
    }

    #[test]
    fn test_callback_duplicates_mono_to_channels() {
        let (mut prod, mut callback, _clock) = setup(16);
        play(&mut prod, 1, 0, vec![0.1, 0.2]);

        let mut output = vec![0.0f32; 4];
        callback.process(&mut output);

        let expected = [0.1, 0.1, 0.2, 0.2];
        for (out, exp) in output.iter().zip(expected.iter()) {
            assert!((out - exp).abs() < 1e-6, "expected {exp}, got {out}");
        }
    }

    #[test]
    fn test_callback_respects_start_frame() {
        let (mut prod, mut callback, _clock) = setup(16);
        play(&mut prod, 1, 3, vec![0.5]);

        let mut first = vec![0.0f32; 4];
        callback.process(&mut first);
        assert!(first.iter().all(|&s| s == 0.0));

        let mut second = vec![0.0f32; 4];
        callback.process(&mut second);
        assert_eq!(second, vec![0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_callback_applies_volume() {
        let (mut prod, mut callback, _clock) = setup(16);
        prod.try_push(AudioCommand::SetVolume(0.5)).unwrap();
        play(&mut prod, 1, 0, vec![0.4, -0.8]);

        let mut output = vec![0.0f32; 4];
        callback.process(&mut output);

        let expected = [0.2, 0.2, -0.4, -0.4];
        for (out, exp) in output.iter().zip(expected.iter()) {
            assert!((out - exp).abs() < 1e-6, "expected {exp}, got {out}");
        }
    }

    #[test]
    fn test_callback_stop_silences_voice() {
        let (mut prod, mut callback, _clock) = setup(16);
        play(&mut prod, 1, 0, vec![0.5; 64]);
        play(&mut prod, 2, 0, vec![0.25; 64]);
        prod.try_push(AudioCommand::Stop(VoiceHandle(1))).unwrap();

        let mut output = vec![0.0f32; 8];
        callback.process(&mut output);
        assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));

        prod.try_push(AudioCommand::StopAll).unwrap();
        callback.process(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
        assert_eq!(callback.active_voices(), 0);
    }

    #[test]
    fn test_callback_limiter_applied() {
        let (mut prod, mut callback, _clock) = setup(16);
        play(&mut prod, 1, 0, vec![2.0, -2.0]);
        play(&mut prod, 2, 0, vec![0.5, 0.5]);

        let mut output = vec![0.0f32; 4];
        callback.process(&mut output);

        assert!((output[0] - 0.95).abs() < 1e-6);
        assert!((output[2] - (-0.95)).abs() < 1e-6);
    }

    #[test]
    fn test_callback_volume_clamps_to_range() {
        let (mut prod, mut callback, _clock) = setup(16);
        prod.try_push(AudioCommand::SetVolume(1.5)).unwrap();
        play(&mut prod, 1, 0, vec![0.8]);

        let mut output = vec![0.0f32; 2];
        callback.process(&mut output);
        assert!((output[0] - 0.8).abs() < 1e-6);
    }
}
