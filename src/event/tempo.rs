//! Per-step tempo overrides with inherit-previous semantics.
//!
//! Entry `0` at a step means "no override"; the step inherits the nearest
//! preceding override, or the base tempo when none precedes it.

use serde::{Deserialize, Serialize};

/// Base tempo used when a score carries no usable one.
pub const DEFAULT_BPM: f64 = 120.0;

/// Length of `steps` time-steps at `bpm`, in milliseconds.
///
/// One step is an eighth note: `30 · steps / bpm · 1000`.
pub fn duration_ms(bpm: f64, steps: u32) -> f64 {
    30.0 * steps as f64 / bpm * 1000.0
}

fn usable(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Sparse tempo map aligned to step indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    #[serde(default = "TempoMap::default_base")]
    base: f64,
    #[serde(default)]
    steps: Vec<f64>,
}

impl TempoMap {
    pub fn new(base: f64) -> Self {
        Self {
            base,
            steps: Vec::new(),
        }
    }

    fn default_base() -> f64 {
        DEFAULT_BPM
    }

    /// The base tempo, falling back to [`DEFAULT_BPM`] if unusable.
    pub fn base(&self) -> f64 {
        if usable(self.base) {
            self.base
        } else {
            DEFAULT_BPM
        }
    }

    pub fn set_base(&mut self, bpm: f64) {
        self.base = bpm;
    }

    /// Override entries, one per step from step 0.
    pub fn entries(&self) -> &[f64] {
        &self.steps
    }

    /// Effective tempo at `step`.
    pub fn lookup(&self, step: usize) -> f64 {
        if self.steps.is_empty() {
            return self.base();
        }
        let last = step.min(self.steps.len() - 1);
        self.steps[..=last]
            .iter()
            .rev()
            .copied()
            .find(|&bpm| usable(bpm))
            .unwrap_or_else(|| self.base())
    }

    /// Set the override at `step`, growing the map with `0` as needed.
    ///
    /// Writing `0` removes the override; the step inherits again.
    pub fn set(&mut self, step: usize, bpm: f64) {
        if step >= self.steps.len() {
            if bpm == 0.0 {
                return;
            }
            self.steps.resize(step + 1, 0.0);
        }
        self.steps[step] = if bpm.is_finite() { bpm } else { 0.0 };
    }

    /// Raw entry at `step` (`0` when absent).
    pub fn entry(&self, step: usize) -> f64 {
        self.steps.get(step).copied().unwrap_or(0.0)
    }

    /// Start offsets of steps `0..=count` in milliseconds.
    ///
    /// `offsets[n]` is the start of step `n`; `offsets[count]` is the end of
    /// the last step.
    pub fn offsets(&self, count: usize) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(count + 1);
        let mut at = 0.0;
        offsets.push(at);
        for step in 0..count {
            at += duration_ms(self.lookup(step), 1);
            offsets.push(at);
        }
        offsets
    }

    /// Start of `step` in milliseconds.
    pub fn offset_ms(&self, step: usize) -> f64 {
        self.offsets(step)[step]
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}
