//! Vibrato and tremolo: secondary oscillators with their own running phase.

use std::f64::consts::TAU;

use rand::Rng;

use super::oscillator::{normalize, OscExtra, Waveform};
use super::params::{Param, ParamVector};

/// A low-frequency oscillator. A [`Waveform::None`] LFO is inactive.
#[derive(Debug, Clone, PartialEq)]
pub struct Lfo {
    waveform: Waveform,
    increment: f64,
    depth: f64,
    phase: f64,
}

impl Lfo {
    pub fn new(waveform: Waveform, rate_hz: f64, depth: f64, sample_rate: u32) -> Self {
        Self {
            waveform,
            increment: TAU * rate_hz / sample_rate as f64,
            depth,
            phase: 0.0,
        }
    }

    pub fn vibrato(params: &ParamVector, sample_rate: u32) -> Self {
        Self::new(
            params.waveform(Param::VibratoWave),
            params.get(Param::VibratoFreq),
            params.get(Param::VibratoDepth),
            sample_rate,
        )
    }

    pub fn tremolo(params: &ParamVector, sample_rate: u32) -> Self {
        Self::new(
            params.waveform(Param::TremoloWave),
            params.get(Param::TremoloFreq),
            params.get(Param::TremoloDepth),
            sample_rate,
        )
    }

    pub fn is_active(&self) -> bool {
        self.waveform != Waveform::None
    }

    fn step<R: Rng + ?Sized>(&mut self, extra: &OscExtra, rng: &mut R) -> f64 {
        let value = self.waveform.generate(1.0, self.phase, extra, rng);
        self.phase = (self.phase + self.increment).rem_euclid(TAU);
        value
    }

    /// Frequency offset in Hz for this sample, advancing the phase.
    ///
    /// The offset is linear in Hz (`lfo · depth · 100`), not a pitch ratio.
    pub fn vibrato_offset<R: Rng + ?Sized>(&mut self, extra: &OscExtra, rng: &mut R) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        self.step(extra, rng) * self.depth * 100.0
    }

    /// Amplitude factor in `[1 - depth, 1]` for this sample, advancing the phase.
    pub fn tremolo_gain<R: Rng + ?Sized>(&mut self, extra: &OscExtra, rng: &mut R) -> f64 {
        if !self.is_active() {
            return 1.0;
        }
        1.0 - normalize(0.0, self.depth, self.step(extra, rng))
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SR: u32 = 44100;

    #[test]
    fn inactive_lfo_is_neutral() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let extra = OscExtra::default();
        let mut lfo = Lfo::new(Waveform::None, 5.0, 0.5, SR);
        assert_eq!(lfo.vibrato_offset(&extra, &mut rng), 0.0);
        assert_eq!(lfo.tremolo_gain(&extra, &mut rng), 1.0);
        assert_eq!(lfo.phase(), 0.0);
    }

    #[test]
    fn vibrato_offset_is_linear_in_hz() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let extra = OscExtra::default();
        // Square LFO starts high: +1 · 0.1 · 100 = 10 Hz.
        let mut lfo = Lfo::new(Waveform::Square, 5.0, 0.1, SR);
        assert!((lfo.vibrato_offset(&extra, &mut rng) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn tremolo_gain_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let extra = OscExtra::default();
        let mut lfo = Lfo::new(Waveform::Sine, 50.0, 0.3, SR);
        for _ in 0..SR {
            let g = lfo.tremolo_gain(&extra, &mut rng);
            assert!((0.7 - 1e-12..=1.0 + 1e-12).contains(&g), "gain {g}");
        }
    }

    #[test]
    fn phase_wraps() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let extra = OscExtra::default();
        let mut lfo = Lfo::new(Waveform::Sine, 10_000.0, 1.0, SR);
        for _ in 0..1000 {
            lfo.vibrato_offset(&extra, &mut rng);
            assert!((0.0..TAU).contains(&lfo.phase()));
        }
    }
}
