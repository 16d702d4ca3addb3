//! Parametric note synthesis.
//!
//! A [`ParamVector`] fully describes one instrument. [`NoteRenderer::render`]
//! turns it into a complete mono buffer: oscillator, envelope, vibrato and
//! tremolo, harmonics, then the effects chain.

pub mod effects;
pub mod envelope;
pub mod harmonics;
pub mod modulation;
pub mod oscillator;
pub mod params;
pub mod render;

pub use envelope::Envelope;
pub use oscillator::{note_frequency, semitone_frequency, OscExtra, Waveform};
pub use params::{Param, ParamSpec, ParamVector, PARAM_COUNT};
pub use render::NoteRenderer;
