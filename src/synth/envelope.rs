//! Four-stage linear ADSR envelope indexed by sample.

use super::params::{Param, ParamVector};

/// Stage time substituted for a zero (or negative) attack, decay or release.
pub const MIN_STAGE_MS: f64 = 4.0;

/// Shortest ramp in samples, whatever the sample rate.
pub const MIN_STAGE_SAMPLES: usize = 4;

/// Attack-Decay-Sustain-Release contour with precomputed sample boundaries.
///
/// - `[0, attack_end)`: linear ramp 0 → volume
/// - `[attack_end, decay_end)`: linear ramp volume → hold
/// - `[decay_end, length_end]`: hold
/// - after `length_end`: linear ramp hold → 0 over `release` samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    attack: usize,
    decay: usize,
    release: usize,
    decay_end: usize,
    length_end: usize,
    volume: f64,
    hold: f64,
}

/// Convert a stage length in milliseconds to samples, applying the floors.
fn stage_samples(ms: f64, sample_rate: u32) -> usize {
    let ms = if ms > 0.0 { ms } else { MIN_STAGE_MS };
    let samples = (ms / 1000.0 * sample_rate as f64).floor();
    (samples as usize).max(MIN_STAGE_SAMPLES)
}

impl Envelope {
    /// Build from stage times (ms), sustain ratio and peak volume.
    pub fn new(
        attack_ms: f64,
        decay_ms: f64,
        sustain_ms: f64,
        release_ms: f64,
        sustain_ratio: f64,
        volume: f64,
        sample_rate: u32,
    ) -> Self {
        let attack = stage_samples(attack_ms, sample_rate);
        let decay = stage_samples(decay_ms, sample_rate);
        let release = stage_samples(release_ms, sample_rate);
        let sustain = (sustain_ms.max(0.0) / 1000.0 * sample_rate as f64).floor() as usize;

        let decay_end = attack + decay;
        Self {
            attack,
            decay,
            release,
            decay_end,
            length_end: decay_end + sustain,
            volume,
            hold: volume * sustain_ratio,
        }
    }

    /// Build from the envelope slots of a parameter vector.
    pub fn from_params(params: &ParamVector, sample_rate: u32) -> Self {
        Self::new(
            params.get(Param::Attack),
            params.get(Param::Decay),
            params.get(Param::Length),
            params.get(Param::Release),
            params.get(Param::Sustain),
            params.get(Param::Volume),
            sample_rate,
        )
    }

    /// Amplitude at sample index `i`.
    pub fn amplitude(&self, i: usize) -> f64 {
        if i < self.attack {
            self.volume * (i + 1) as f64 / self.attack as f64
        } else if i < self.decay_end {
            let t = (i - self.attack + 1) as f64 / self.decay as f64;
            self.volume - (self.volume - self.hold) * t
        } else if i <= self.length_end {
            self.hold
        } else {
            let t = (i - self.length_end) as f64 / self.release as f64;
            self.hold * (1.0 - t.min(1.0))
        }
    }

    /// Sample index where the attack ramp ends.
    pub fn attack_end(&self) -> usize {
        self.attack
    }

    pub fn decay_end(&self) -> usize {
        self.decay_end
    }

    /// Last sample of the hold stage.
    pub fn length_end(&self) -> usize {
        self.length_end
    }

    /// Sample index where the release ramp reaches zero.
    pub fn release_end(&self) -> usize {
        self.length_end + self.release
    }

    pub fn hold(&self) -> f64 {
        self.hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn test_env() -> Envelope {
        // 10ms attack, 50ms decay, 100ms hold, 100ms release.
        Envelope::new(10.0, 50.0, 100.0, 100.0, 0.5, 1.0, SR)
    }

    #[test]
    fn boundaries_in_samples() {
        let env = test_env();
        assert_eq!(env.attack_end(), 441);
        assert_eq!(env.decay_end(), 441 + 2205);
        assert_eq!(env.length_end(), 441 + 2205 + 4410);
        assert_eq!(env.release_end(), 441 + 2205 + 4410 + 4410);
    }

    #[test]
    fn attack_reaches_volume() {
        let env = test_env();
        assert!(env.amplitude(0) > 0.0 && env.amplitude(0) < 0.01);
        assert!((env.amplitude(env.attack_end() - 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn decay_reaches_hold() {
        let env = test_env();
        assert!((env.amplitude(env.decay_end() - 1) - 0.5).abs() < 1e-12);
        assert_eq!(env.amplitude(env.decay_end()), 0.5);
    }

    #[test]
    fn hold_is_flat_through_length_end() {
        let env = test_env();
        for i in env.decay_end()..=env.length_end() {
            assert_eq!(env.amplitude(i), 0.5);
        }
    }

    #[test]
    fn release_ramps_to_zero_and_stays() {
        let env = test_env();
        let mid = env.length_end() + 2205;
        assert!((env.amplitude(mid) - 0.25).abs() < 1e-12);
        assert_eq!(env.amplitude(env.release_end()), 0.0);
        assert_eq!(env.amplitude(env.release_end() + 1000), 0.0);
    }

    #[test]
    fn zero_stages_use_floor() {
        let env = Envelope::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0, SR);
        // 4 ms at 44.1 kHz.
        assert_eq!(env.attack_end(), 176);
        assert_eq!(env.decay_end(), 352);
    }

    #[test]
    fn tiny_stages_floor_to_min_samples() {
        let env = Envelope::new(0.001, 0.001, 0.0, 0.001, 1.0, 1.0, SR);
        assert_eq!(env.attack_end(), MIN_STAGE_SAMPLES);
        assert_eq!(env.release_end() - env.length_end(), MIN_STAGE_SAMPLES);
        for i in 0..env.release_end() + 10 {
            assert!(env.amplitude(i).is_finite());
        }
    }

    #[test]
    fn never_exceeds_volume_or_goes_negative() {
        let env = test_env();
        for i in 0..env.release_end() + 100 {
            let a = env.amplitude(i);
            assert!((0.0..=1.0 + 1e-12).contains(&a), "amp {a} at {i}");
        }
    }
}
