//! chiptrack: a parametric chiptune synthesizer and lookahead multi-track sequencer.

pub mod audio;
pub mod config;
pub mod event;
pub mod score;
pub mod synth;
