//! Per-note effects: sample-and-hold bit crush, noise mix, waveshaping
//! distortion and two biquad filters.
//!
//! All state is owned by one render call. Nothing here is shared between notes.

use std::f64::consts::PI;

use super::params::{Param, ParamVector};

/// Entries in the distortion lookup table.
pub const CURVE_SIZE: usize = 44_100;

/// Bounds applied to a non-zero normalized filter cutoff.
const MIN_CUTOFF: f64 = 1e-4;
const MAX_CUTOFF: f64 = 0.999;

/// Bit-crush decimation: only every `stride`-th sample is computed, the rest
/// repeat the previous value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleHold {
    stride: usize,
}

impl SampleHold {
    /// `amount` is the bit-crush slot; stride is `floor(amount · 100)`, at least 1.
    pub fn new(amount: f64) -> Self {
        let stride = if amount > 0.0 {
            ((amount * 100.0).floor() as usize).max(1)
        } else {
            1
        };
        Self { stride }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Whether sample `i` is computed rather than held.
    #[inline]
    pub fn computes(&self, i: usize) -> bool {
        i % self.stride == 0
    }
}

/// Blend a sample with a reproducible toggle derived from `sin(index)`.
///
/// This is intentionally not a random source; the same index always yields
/// the same toggle.
#[inline]
pub fn noise_mix(sample: f64, amount: f64, index: usize) -> f64 {
    let toggle = 1.0 - ((index as f64).sin() + 1.0) * 1e9 % 2.0;
    sample - sample * amount * toggle
}

/// Waveshaping table `(3 + k)·atan(sinh(x/4)·5) / (π + k·|x|)` over `x ∈ [-1, 1]`.
#[derive(Debug, Clone)]
pub struct DistortionCurve {
    table: Vec<f64>,
}

impl DistortionCurve {
    pub fn new(k: f64) -> Self {
        let table = (0..CURVE_SIZE)
            .map(|i| {
                let x = i as f64 * 2.0 / CURVE_SIZE as f64 - 1.0;
                (3.0 + k) * ((x * 0.25).sinh() * 5.0).atan() / (PI + k * x.abs())
            })
            .collect();
        Self { table }
    }

    /// Curve for the distortion slot, or `None` when the amount is not positive.
    pub fn from_amount(amount: f64) -> Option<Self> {
        (amount > 0.0).then(|| Self::new((amount * 100.0).ceil()))
    }

    /// Map `input` through the table with linear interpolation.
    pub fn apply(&self, input: f64) -> f64 {
        let last = self.table.len() - 1;
        let index = last as f64 * (input + 1.0) / 2.0;
        if index.is_nan() || index < 0.0 {
            return self.table[0];
        }
        let low = index.floor() as usize;
        if low >= last {
            return self.table[last];
        }
        let factor = index - low as f64;
        (1.0 - factor) * self.table[low] + factor * self.table[low + 1]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Filter response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    LowPass,
    HighPass,
}

/// Second-order IIR filter with fixed Q, direct form I.
#[derive(Debug, Clone, PartialEq)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl Biquad {
    const Q: f64 = 1.0;

    /// `cutoff` is normalized to Nyquist. Its magnitude is used and bounded to
    /// keep the filter stable.
    pub fn new(kind: FilterKind, cutoff: f64) -> Self {
        let cutoff = cutoff.abs().clamp(MIN_CUTOFF, MAX_CUTOFF);
        let g = 10.0f64.powf(-0.05 * Self::Q);
        let w0 = PI * cutoff;
        let cos_w0 = w0.cos();
        let alpha = 0.5 * w0.sin() * g;

        let (b0, b1, b2) = match kind {
            FilterKind::LowPass => {
                let b1 = 1.0 - cos_w0;
                (0.5 * b1, b1, 0.5 * b1)
            }
            FilterKind::HighPass => {
                let b1 = -1.0 - cos_w0;
                (-0.5 * b1, b1, -0.5 * b1)
            }
        };
        let a0 = 1.0 + alpha;
        let inverse = 1.0 / a0;

        Self {
            b0: b0 * inverse,
            b1: b1 * inverse,
            b2: b2 * inverse,
            a1: -2.0 * cos_w0 * inverse,
            a2: (1.0 - alpha) * inverse,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Filter for a cutoff slot, or `None` when the slot is zero.
    pub fn from_cutoff(kind: FilterKind, cutoff: f64) -> Option<Self> {
        (cutoff != 0.0).then(|| Self::new(kind, cutoff))
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let out = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }
}

/// Noise → distortion → low-pass → high-pass, applied to computed samples only.
#[derive(Debug, Clone)]
pub struct EffectsChain {
    noise: f64,
    distortion: Option<DistortionCurve>,
    low_pass: Option<Biquad>,
    high_pass: Option<Biquad>,
}

impl EffectsChain {
    pub fn from_params(params: &ParamVector) -> Self {
        Self {
            noise: params.get(Param::Noise),
            distortion: DistortionCurve::from_amount(params.get(Param::Distortion)),
            low_pass: Biquad::from_cutoff(FilterKind::LowPass, params.get(Param::LowPass)),
            high_pass: Biquad::from_cutoff(FilterKind::HighPass, params.get(Param::HighPass)),
        }
    }

    pub fn process(&mut self, sample: f64, index: usize) -> f64 {
        let mut out = sample;
        if self.noise != 0.0 {
            out = noise_mix(out, self.noise, index);
        }
        if let Some(curve) = &self.distortion {
            out = curve.apply(out);
        }
        if let Some(lp) = &mut self.low_pass {
            out = lp.process(out);
        }
        if let Some(hp) = &mut self.high_pass {
            out = hp.process(out);
        }
        out
    }

    /// Whether any stage would alter the signal.
    pub fn is_bypassed(&self) -> bool {
        self.noise == 0.0
            && self.distortion.is_none()
            && self.low_pass.is_none()
            && self.high_pass.is_none()
    }
}
