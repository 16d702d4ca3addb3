//! Score model: tracks, note cells, tempo map and the editor operations on them.
//!
//! A [`Score`] always holds at least one [`Track`]. Every mutation the editor
//! can make goes through a method here so the invariants stay in one place.

pub mod persistence;
pub mod scale;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::tempo::{TempoMap, DEFAULT_BPM};
use crate::event::types::{clamp_cell, Cell, REST};
use crate::synth::oscillator::Waveform;
use crate::synth::params::{Param, ParamVector};

pub use scale::Mode;

/// Errors from score editing and loading.
#[derive(Debug)]
pub enum ScoreError {
    /// Track index out of range.
    TrackIndex(usize),
    /// The last remaining track cannot be removed.
    LastTrack,
    /// A score must contain at least one track.
    NoTracks,
    /// Reading or writing a score file failed.
    Io(std::io::Error),
    /// A score file could not be decoded or encoded.
    Format(String),
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreError::TrackIndex(i) => write!(f, "no track at index {i}"),
            ScoreError::LastTrack => write!(f, "cannot remove the last track"),
            ScoreError::NoTracks => write!(f, "score has no tracks"),
            ScoreError::Io(e) => write!(f, "score I/O error: {e}"),
            ScoreError::Format(e) => write!(f, "score format error: {e}"),
        }
    }
}

impl std::error::Error for ScoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScoreError {
    fn from(e: std::io::Error) -> Self {
        ScoreError::Io(e)
    }
}

impl From<serde_yaml::Error> for ScoreError {
    fn from(e: serde_yaml::Error) -> Self {
        ScoreError::Format(e.to_string())
    }
}

/// One instrument with its note cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    #[serde(default)]
    pub params: ParamVector,
    /// Semitone transpose applied to every note cell.
    #[serde(default)]
    pub tuning: i32,
    #[serde(default)]
    pub notes: Vec<i32>,
}

impl Track {
    pub fn new(name: impl Into<String>, params: ParamVector) -> Self {
        Self {
            name: name.into(),
            params,
            tuning: 0,
            notes: Vec::new(),
        }
    }

    /// Cell at `step`; steps past the end read as rests.
    pub fn note(&self, step: usize) -> i32 {
        self.notes.get(step).copied().unwrap_or(REST)
    }

    /// Write a cell, growing the sequence with rests as needed. Out-of-range
    /// cells are clamped; returns the stored value.
    pub fn set_note(&mut self, step: usize, cell: i32) -> i32 {
        if step >= self.notes.len() {
            self.notes.resize(step + 1, REST);
        }
        let cell = clamp_cell(cell);
        self.notes[step] = cell;
        cell
    }

    /// Number of steps in this track.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Whether any cell is the shorten marker.
    pub fn has_shorten_markers(&self) -> bool {
        self.notes.iter().any(|&c| Cell::from(c) == Cell::Shorten)
    }
}

/// A complete piece: metadata, tempo and tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub name: String,
    #[serde(default = "Score::default_root")]
    pub root: String,
    #[serde(default = "Score::default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub tempo: TempoMap,
    pub tracks: Vec<Track>,
}

impl Score {
    fn default_root() -> String {
        "C".to_string()
    }

    fn default_mode() -> Mode {
        Mode::Major
    }

    /// An empty score with one sine track.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: Self::default_root(),
            mode: Self::default_mode(),
            tempo: TempoMap::new(DEFAULT_BPM),
            tracks: vec![Track::new("SINE", ParamVector::sine())],
        }
    }

    /// The starter piece: a sine melody over a silent triangle track.
    pub fn starter() -> Self {
        let mut sine = ParamVector::zeroed();
        sine.set(Param::Wave, Waveform::Sine.index() as f64);
        sine.set(Param::Attack, 1.0);
        sine.set(Param::Decay, 1.0);
        sine.set(Param::Volume, 1.0);
        sine.set(Param::Sustain, 1.0);
        sine.set(Param::Frequency, 40.0);
        sine.set(Param::Length, 1000.0);

        let mut triangle = sine;
        triangle.set(Param::Wave, Waveform::Triangle.index() as f64);
        triangle.set(Param::Volume, 2.0);

        let mut melody = Track::new("SINE", sine);
        melody.notes = vec![40, 9, 0, 40, -1];
        let mut bass = Track::new("TRIANGLE", triangle);
        bass.notes = vec![0];

        Self {
            name: "UNTITLED".to_string(),
            root: Self::default_root(),
            mode: Self::default_mode(),
            tempo: TempoMap::new(DEFAULT_BPM),
            tracks: vec![melody, bass],
        }
    }

    /// Longest track length in steps.
    pub fn total_steps(&self) -> usize {
        self.tracks.iter().map(Track::len).max().unwrap_or(0)
    }

    pub fn track(&self, index: usize) -> Result<&Track, ScoreError> {
        self.tracks.get(index).ok_or(ScoreError::TrackIndex(index))
    }

    pub fn track_mut(&mut self, index: usize) -> Result<&mut Track, ScoreError> {
        self.tracks
            .get_mut(index)
            .ok_or(ScoreError::TrackIndex(index))
    }

    /// Append a new sine track, returning its index.
    pub fn add_track(&mut self, name: impl Into<String>) -> usize {
        self.tracks.push(Track::new(name, ParamVector::sine()));
        self.tracks.len() - 1
    }

    pub fn remove_track(&mut self, index: usize) -> Result<Track, ScoreError> {
        self.track(index)?;
        if self.tracks.len() == 1 {
            return Err(ScoreError::LastTrack);
        }
        Ok(self.tracks.remove(index))
    }

    /// Swap with the track above; returns the track's new index.
    pub fn move_track_up(&mut self, index: usize) -> Result<usize, ScoreError> {
        self.track(index)?;
        if index == 0 {
            return Ok(0);
        }
        self.tracks.swap(index, index - 1);
        Ok(index - 1)
    }

    /// Swap with the track below; returns the track's new index.
    pub fn move_track_down(&mut self, index: usize) -> Result<usize, ScoreError> {
        self.track(index)?;
        if index + 1 == self.tracks.len() {
            return Ok(index);
        }
        self.tracks.swap(index, index + 1);
        Ok(index + 1)
    }

    /// Insert a copy directly after `index`; returns the copy's index.
    pub fn duplicate_track(&mut self, index: usize) -> Result<usize, ScoreError> {
        let copy = self.track(index)?.clone();
        self.tracks.insert(index + 1, copy);
        Ok(index + 1)
    }

    /// Replace the notes of `to` with those of `from`.
    pub fn copy_notes(&mut self, from: usize, to: usize) -> Result<(), ScoreError> {
        let notes = self.track(from)?.notes.clone();
        self.track_mut(to)?.notes = notes;
        Ok(())
    }

    /// Replace the instrument and tuning of `to` with those of `from`.
    pub fn copy_synth(&mut self, from: usize, to: usize) -> Result<(), ScoreError> {
        let source = self.track(from)?;
        let (params, tuning) = (source.params, source.tuning);
        let target = self.track_mut(to)?;
        target.params = params;
        target.tuning = tuning;
        Ok(())
    }

    /// Turn every cell of a track into a rest, keeping its length.
    pub fn clear_notes(&mut self, index: usize) -> Result<(), ScoreError> {
        self.track_mut(index)?.notes.fill(REST);
        Ok(())
    }

    pub fn set_note(&mut self, track: usize, step: usize, cell: i32) -> Result<i32, ScoreError> {
        Ok(self.track_mut(track)?.set_note(step, cell))
    }

    pub fn note(&self, track: usize, step: usize) -> Result<i32, ScoreError> {
        Ok(self.track(track)?.note(step))
    }

    /// Write an instrument parameter through its declared range; returns the
    /// stored value.
    pub fn set_param(&mut self, track: usize, param: Param, value: f64) -> Result<f64, ScoreError> {
        Ok(self.track_mut(track)?.params.set_clamped(param, value))
    }

    pub fn set_tuning(&mut self, track: usize, tuning: i32) -> Result<(), ScoreError> {
        self.track_mut(track)?.tuning = tuning;
        Ok(())
    }

    /// Set a tempo override at `step`; `0` removes it.
    pub fn set_tempo_entry(&mut self, step: usize, bpm: f64) {
        self.tempo.set(step, bpm);
    }

    pub fn set_base_tempo(&mut self, bpm: f64) {
        self.tempo.set_base(bpm);
    }

    /// Effective tempo at `step`.
    pub fn tempo_at(&self, step: usize) -> f64 {
        self.tempo.lookup(step)
    }

    /// Note names of the score's key.
    pub fn key_notes(&self) -> Vec<&'static str> {
        scale::scale(&self.root, self.mode).unwrap_or_default()
    }

    /// Check structural invariants after decoding.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.tracks.is_empty() {
            return Err(ScoreError::NoTracks);
        }
        Ok(())
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::starter()
    }
}
