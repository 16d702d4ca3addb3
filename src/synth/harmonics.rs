//! Overtone generators that follow the carrier's running frequency.

use std::f64::consts::TAU;

use rand::Rng;

use super::oscillator::{OscExtra, Waveform};
use super::params::{Param, ParamVector};

/// One overtone slot. A multiplier of exactly `1.0` disables the slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Harmonic {
    multiplier: f64,
    gain: f64,
    phase: f64,
}

impl Harmonic {
    pub fn new(multiplier: f64, gain: f64) -> Self {
        Self {
            multiplier,
            gain,
            phase: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.multiplier != 1.0
    }
}

/// Three harmonic slots rendered with the carrier's waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicStack {
    slots: [Harmonic; 3],
}

impl HarmonicStack {
    pub fn new(slots: [Harmonic; 3]) -> Self {
        Self { slots }
    }

    pub fn from_params(params: &ParamVector) -> Self {
        Self::new([
            Harmonic::new(params.get(Param::HarmonicMultA), params.get(Param::HarmonicGainA)),
            Harmonic::new(params.get(Param::HarmonicMultB), params.get(Param::HarmonicGainB)),
            Harmonic::new(params.get(Param::HarmonicMultC), params.get(Param::HarmonicGainC)),
        ])
    }

    /// Sum of every active slot at its current phase.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        waveform: Waveform,
        extra: &OscExtra,
        rng: &mut R,
    ) -> f64 {
        self.slots
            .iter()
            .filter(|h| h.is_active())
            .map(|h| waveform.generate(h.gain, h.phase, extra, rng))
            .sum()
    }

    /// Advance each active slot by `carrier_hz · multiplier`.
    pub fn advance(&mut self, carrier_hz: f64, sample_rate: u32) {
        for h in self.slots.iter_mut().filter(|h| h.is_active()) {
            let increment = TAU * carrier_hz * h.multiplier / sample_rate as f64;
            h.phase = (h.phase + increment).rem_euclid(TAU);
        }
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|h| h.is_active()).count()
    }
}
