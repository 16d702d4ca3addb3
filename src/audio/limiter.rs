//! Master limiter: hard clamp to protect output.

/// Hard limiter that clamps samples to `[-ceiling, ceiling]`.
#[derive(Debug, Clone, Copy)]
pub struct Limiter {
    ceiling: f32,
}

impl Limiter {
    /// Create a limiter. The ceiling is forced into `(0.0, 1.0]`; anything
    /// unusable falls back to the default.
    pub fn new(ceiling: f32) -> Self {
        if ceiling.is_finite() && ceiling > 0.0 {
            Self {
                ceiling: ceiling.min(1.0),
            }
        } else {
            Self::default()
        }
    }

    /// Clamp a single sample to `[-ceiling, ceiling]`. NaN becomes silence.
    #[inline]
    pub fn process(&self, sample: f32) -> f32 {
        if sample.is_nan() {
            return 0.0;
        }
        sample.clamp(-self.ceiling, self.ceiling)
    }

    /// Clamp an entire buffer in-place.
    #[inline]
    pub fn process_block(&self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self { ceiling: 0.95 }
    }
}
