//! Offline sink: a manually advanced clock that mixes voices into memory.
//!
//! Used by the `export` command and by tests that need a deterministic audio
//! clock.

use super::limiter::Limiter;
use super::mixer::Mixer;
use super::{seconds_to_frame, AudioError, AudioSink, VoiceHandle};

/// Record of one `play` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub voice: VoiceHandle,
    /// Requested start time in seconds.
    pub at: f64,
    /// Length in frames.
    pub frames: usize,
}

/// Offline audio sink.
#[derive(Debug)]
pub struct Bounce {
    sample_rate: u32,
    clock: u64,
    mixer: Mixer,
    limiter: Limiter,
    output: Vec<f32>,
    next_voice: u64,
    scheduled: Vec<Scheduled>,
    stopped: Vec<VoiceHandle>,
}

impl Bounce {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_limiter(sample_rate, Limiter::default())
    }

    pub fn with_limiter(sample_rate: u32, limiter: Limiter) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            clock: 0,
            mixer: Mixer::new(),
            limiter,
            output: Vec::new(),
            next_voice: 0,
            scheduled: Vec::new(),
            stopped: Vec::new(),
        }
    }

    /// Render up to absolute time `seconds`. Earlier times are ignored.
    pub fn advance_to(&mut self, seconds: f64) {
        let target = seconds_to_frame(seconds, self.sample_rate);
        if target <= self.clock {
            return;
        }
        let start = self.output.len();
        self.output.resize(start + (target - self.clock) as usize, 0.0);
        self.mixer.mix(self.clock, &mut self.output[start..]);
        self.limiter.process_block(&mut self.output[start..]);
        self.clock = target;
    }

    /// Render `seconds` more audio.
    pub fn advance(&mut self, seconds: f64) {
        let now = self.now();
        self.advance_to(now + seconds);
    }

    /// Render until every voice has finished and return the whole mix.
    pub fn finish(mut self) -> Vec<f32> {
        const BLOCK: usize = 4096;
        while self.mixer.active() > 0 {
            let start = self.output.len();
            self.output.resize(start + BLOCK, 0.0);
            self.mixer.mix(self.clock, &mut self.output[start..]);
            self.limiter.process_block(&mut self.output[start..]);
            self.clock += BLOCK as u64;
        }
        self.output
    }

    /// Audio rendered so far.
    pub fn output(&self) -> &[f32] {
        &self.output
    }

    /// Every voice passed to `play`, in call order.
    pub fn scheduled(&self) -> &[Scheduled] {
        &self.scheduled
    }

    /// Voices stopped individually, in call order.
    pub fn stopped(&self) -> &[VoiceHandle] {
        &self.stopped
    }

    pub fn active_voices(&self) -> usize {
        self.mixer.active()
    }
}

impl AudioSink for Bounce {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn now(&self) -> f64 {
        self.clock as f64 / self.sample_rate as f64
    }

    fn play(&mut self, samples: Vec<f32>, at: f64) -> Result<VoiceHandle, AudioError> {
        let voice = VoiceHandle(self.next_voice);
        self.next_voice += 1;
        self.scheduled.push(Scheduled {
            voice,
            at,
            frames: samples.len(),
        });
        self.mixer
            .add(voice, seconds_to_frame(at, self.sample_rate), samples);
        Ok(voice)
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        self.stopped.push(voice);
        self.mixer.stop(voice);
        Ok(())
    }

    fn stop_all(&mut self) -> Result<(), AudioError> {
        self.mixer.stop_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_with_rendering() {
        let mut b = Bounce::new(1000);
        assert_eq!(b.now(), 0.0);
        b.advance(0.5);
        assert_eq!(b.now(), 0.5);
        assert_eq!(b.output().len(), 500);
        b.advance_to(0.1);
        assert_eq!(b.now(), 0.5);
    }

    #[test]
    fn voice_placed_at_requested_time() {
        let mut b = Bounce::new(1000);
        b.play(vec![0.5; 10], 0.1).unwrap();
        let out = b.finish();
        assert_eq!(out[99], 0.0);
        assert_eq!(out[100], 0.5);
        assert_eq!(out[109], 0.5);
        assert_eq!(out[110], 0.0);
    }

    #[test]
    fn stop_cuts_voice() {
        let mut b = Bounce::new(1000);
        let v = b.play(vec![0.5; 100], 0.0).unwrap();
        b.advance(0.01);
        b.stop(v).unwrap();
        b.advance(0.01);
        assert!(b.output()[..10].iter().all(|&s| s == 0.5));
        assert!(b.output()[10..].iter().all(|&s| s == 0.0));
        assert_eq!(b.stopped(), &[v]);
    }

    #[test]
    fn mix_is_limited() {
        let mut b = Bounce::with_limiter(1000, Limiter::new(0.5));
        b.play(vec![0.4; 4], 0.0).unwrap();
        b.play(vec![0.4; 4], 0.0).unwrap();
        let out = b.finish();
        assert_eq!(out[0], 0.5);
        assert_eq!(out.len(), 4096);
    }

    #[test]
    fn handles_are_unique() {
        let mut b = Bounce::new(1000);
        let a = b.play(vec![0.1], 0.0).unwrap();
        let c = b.play(vec![0.1], 0.0).unwrap();
        assert_ne!(a, c);
        assert_eq!(b.scheduled().len(), 2);
    }
}
