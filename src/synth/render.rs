//! Note renderer: turns one [`ParamVector`] into a finished mono buffer.
//!
//! Each call owns all of its state (phases, envelope, filters). The only thing
//! carried between calls is the random source used by the noise waveforms.

use std::f64::consts::TAU;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::effects::{EffectsChain, SampleHold};
use super::envelope::Envelope;
use super::harmonics::HarmonicStack;
use super::modulation::Lfo;
use super::oscillator::{semitone_frequency, OscExtra, Waveform, SEMITONE_OFFSET};
use super::params::{Param, ParamVector};

/// Longest buffer a single note may produce, in seconds.
pub const MAX_NOTE_SECONDS: f64 = 600.0;

/// Instantaneous frequency bound, as a multiple of the sample rate.
const FREQUENCY_LIMIT_FACTOR: f64 = 64.0;

/// Number of samples a vector renders to at `sample_rate`.
pub fn buffer_len(params: &ParamVector, sample_rate: u32) -> usize {
    let ms = params.total_ms().min(MAX_NOTE_SECONDS * 1000.0);
    (sample_rate as f64 * ms / 1000.0).ceil() as usize
}

/// Starting carrier frequency for the vector's pitch slot.
pub fn start_frequency(params: &ParamVector) -> f64 {
    semitone_frequency(params.get(Param::Frequency) - SEMITONE_OFFSET as f64)
}

/// Frequency drift state: `frequency += speed; speed += accel; accel += jerk`.
#[derive(Debug, Clone, Copy)]
struct Drift {
    frequency: f64,
    speed: f64,
    accel: f64,
    jerk: f64,
    limit: f64,
}

impl Drift {
    fn new(params: &ParamVector, sample_rate: u32) -> Self {
        let rate = sample_rate as f64;
        let limit = rate * FREQUENCY_LIMIT_FACTOR;
        Self {
            frequency: start_frequency(params).clamp(-limit, limit),
            speed: params.get(Param::Speed),
            accel: params.get(Param::Accel) / rate,
            jerk: params.get(Param::Jerk) / (rate * rate),
            limit,
        }
    }

    fn step(&mut self) {
        let limit = self.limit;
        self.frequency = (self.frequency + self.speed).clamp(-limit, limit);
        self.speed = (self.speed + self.accel).clamp(-limit, limit);
        self.accel = (self.accel + self.jerk).clamp(-limit, limit);
    }
}

/// Renders notes at a fixed sample rate with a seeded random source.
#[derive(Debug, Clone)]
pub struct NoteRenderer {
    sample_rate: u32,
    rng: ChaCha8Rng,
}

impl NoteRenderer {
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render one note. Every returned sample is finite.
    pub fn render(&mut self, params: &ParamVector) -> Vec<f32> {
        let sr = self.sample_rate;
        let rate = sr as f64;
        let len = buffer_len(params, sr);
        let mut data = vec![0.0f32; len];

        let waveform = params.waveform(Param::Wave);
        if waveform == Waveform::None {
            return data;
        }

        let envelope = Envelope::from_params(params, sr);
        let hold = SampleHold::new(params.get(Param::BitCrush));
        let mut vibrato = Lfo::vibrato(params, sr);
        let mut tremolo = Lfo::tremolo(params, sr);
        let mut harmonics = HarmonicStack::from_params(params);
        let mut effects = EffectsChain::from_params(params);

        let start = Drift::new(params, sr);
        let mut drift = start;
        let repeat = params.get(Param::Repeat).max(0.0);
        let repeat_every = (repeat * rate).floor() as usize;

        let mut extra = OscExtra::with_cycle(params.get(Param::Cycle));
        let mut phase = 0.0f64;
        let mut out = 0.0f64;

        for (i, slot) in data.iter_mut().enumerate() {
            let amplitude = envelope.amplitude(i);

            let frequency = drift.frequency + vibrato.vibrato_offset(&extra, &mut self.rng);
            let increment = TAU * frequency.clamp(-drift.limit, drift.limit) / rate;

            if hold.computes(i) {
                let gain = tremolo.tremolo_gain(&extra, &mut self.rng);
                extra.increment = increment;
                out = waveform.generate(gain, phase, &extra, &mut self.rng);
                out += harmonics.sample(waveform, &extra, &mut self.rng);
                out = effects.process(out, i);
            }

            let value = out * amplitude;
            *slot = if value.is_finite() { value as f32 } else { 0.0 };

            phase = (phase + increment).rem_euclid(TAU);
            drift.step();
            if repeat_every > 0 && i % repeat_every == 0 {
                drift = start;
            }
            harmonics.advance(drift.frequency, sr);
        }

        data
    }
}
