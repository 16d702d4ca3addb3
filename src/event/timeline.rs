//! Resolved note timing with per-track read cursors.
//!
//! [`Timeline::build`] walks every track once, resolving tie chains and tempo
//! into [`NoteEvent`]s sorted by start time. Cursors then let the transport
//! consume windows `[from, to)` without rescanning consumed notes.

use super::types::{clamp_cell, note_span, NoteEvent, TrackId};
use crate::score::Score;

/// Timed notes for every track of a score.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    tracks: Vec<Vec<NoteEvent>>,
    cursors: Vec<usize>,
    /// Step start offsets in ms; one more entry than there are steps.
    offsets: Vec<f64>,
}

impl Timeline {
    pub fn build(score: &Score) -> Self {
        let total = score.total_steps();
        let offsets = score.tempo.offsets(total);

        let tracks: Vec<Vec<NoteEvent>> = score
            .tracks
            .iter()
            .enumerate()
            .map(|(t, track)| {
                (0..track.notes.len())
                    .filter_map(|step| {
                        let steps = note_span(&track.notes, step)?;
                        let start_ms = offsets[step];
                        Some(NoteEvent {
                            track: TrackId(t),
                            step,
                            steps,
                            start_ms,
                            duration_ms: offsets[step + steps as usize] - start_ms,
                            cell: clamp_cell(track.notes[step]),
                        })
                    })
                    .collect()
            })
            .collect();

        let cursors = vec![0; tracks.len()];
        Self {
            tracks,
            cursors,
            offsets,
        }
    }

    /// Total length in steps.
    pub fn total_steps(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total length in milliseconds.
    pub fn total_ms(&self) -> f64 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    /// Start of `step` in milliseconds, clamped to the end of the score.
    pub fn offset_ms(&self, step: usize) -> f64 {
        let last = self.total_steps();
        self.offsets.get(step.min(last)).copied().unwrap_or(0.0)
    }

    /// Step playing at `ms`, clamped to the score.
    pub fn step_at(&self, ms: f64) -> usize {
        let after = self.offsets.partition_point(|&o| o <= ms);
        after.saturating_sub(1).min(self.total_steps())
    }

    /// Notes of one track, in start order.
    pub fn track(&self, track: TrackId) -> &[NoteEvent] {
        self.tracks.get(track.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of notes across all tracks.
    pub fn len(&self) -> usize {
        self.tracks.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every cursor to the first note starting at or after `ms`.
    pub fn seek(&mut self, ms: f64) {
        for (cursor, notes) in self.cursors.iter_mut().zip(&self.tracks) {
            *cursor = notes.partition_point(|n| n.start_ms < ms);
        }
    }

    /// Take every note starting in `[from, to)` and advance the cursors past them.
    ///
    /// Notes before `from` that the cursors have not yet passed are skipped.
    /// The result is ordered by track, then start time.
    pub fn drain_window(&mut self, from: f64, to: f64) -> Vec<NoteEvent> {
        let mut result = Vec::new();
        for (cursor, notes) in self.cursors.iter_mut().zip(&self.tracks) {
            while let Some(note) = notes.get(*cursor) {
                if note.start_ms >= to {
                    break;
                }
                if note.start_ms >= from {
                    result.push(note.clone());
                }
                *cursor += 1;
            }
        }
        result
    }

    /// Notes not yet consumed by the cursors.
    pub fn remaining(&self) -> usize {
        self.cursors
            .iter()
            .zip(&self.tracks)
            .map(|(&c, notes)| notes.len().saturating_sub(c))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Track;
    use crate::synth::ParamVector;
    use assert_approx_eq::assert_approx_eq;

    fn score_with(tracks: &[&[i32]]) -> Score {
        let mut score = Score::new("test");
        score.tracks = tracks
            .iter()
            .enumerate()
            .map(|(i, notes)| {
                let mut t = Track::new(format!("T{i}"), ParamVector::sine());
                t.notes = notes.to_vec();
                t
            })
            .collect();
        score
    }

    #[test]
    fn tie_run_is_one_event() {
        let tl = Timeline::build(&score_with(&[&[40, -1, -1, 0]]));
        let notes = tl.track(TrackId(0));
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].step, 0);
        assert_eq!(notes[0].steps, 3);
        assert_approx_eq!(notes[0].duration_ms, 750.0);
        assert_approx_eq!(tl.total_ms(), 1000.0);
    }

    #[test]
    fn start_times_follow_tempo_map() {
        let mut score = score_with(&[&[40, 41, 42, 43]]);
        score.set_tempo_entry(2, 60.0);
        let tl = Timeline::build(&score);
        let starts: Vec<f64> = tl.track(TrackId(0)).iter().map(|n| n.start_ms).collect();
        assert_eq!(starts, vec![0.0, 250.0, 500.0, 1000.0]);
        assert_approx_eq!(tl.track(TrackId(0))[3].duration_ms, 500.0);
    }

    #[test]
    fn out_of_range_cells_are_clamped() {
        let tl = Timeline::build(&score_with(&[&[5000, -1, -40, 99]]));
        let notes = tl.track(TrackId(0));
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].cell, 98);
        assert_eq!(notes[0].steps, 2);
        assert_eq!(notes[1].step, 3);
        assert_eq!(notes[1].cell, 98);
    }

    #[test]
    fn tied_note_across_tempo_change() {
        let mut score = score_with(&[&[40, -1]]);
        score.set_tempo_entry(1, 60.0);
        let tl = Timeline::build(&score);
        assert_approx_eq!(tl.track(TrackId(0))[0].duration_ms, 750.0);
    }

    #[test]
    fn drain_windows_partition_notes() {
        let mut tl = Timeline::build(&score_with(&[&[40, 41, 42, 43], &[0, 50]]));
        assert_eq!(tl.len(), 5);
        let first = tl.drain_window(0.0, 200.0);
        assert_eq!(first.len(), 1);
        let second = tl.drain_window(200.0, 600.0);
        assert_eq!(second.len(), 3);
        let rest = tl.drain_window(600.0, 1e9);
        assert_eq!(rest.len(), 1);
        assert_eq!(tl.remaining(), 0);
    }

    #[test]
    fn seek_skips_earlier_notes() {
        let mut tl = Timeline::build(&score_with(&[&[40, 41, 42, 43]]));
        tl.seek(500.0);
        let drained = tl.drain_window(0.0, 1e9);
        assert_eq!(drained.iter().map(|n| n.step).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn step_lookup() {
        let tl = Timeline::build(&score_with(&[&[40, 41, 42, 43]]));
        assert_eq!(tl.step_at(0.0), 0);
        assert_eq!(tl.step_at(260.0), 1);
        assert_eq!(tl.step_at(99_999.0), 4);
        assert_approx_eq!(tl.offset_ms(2), 500.0);
        assert_approx_eq!(tl.offset_ms(40), 1000.0);
    }

    #[test]
    fn empty_score() {
        let tl = Timeline::build(&score_with(&[&[]]));
        assert!(tl.is_empty());
        assert_eq!(tl.total_steps(), 0);
        assert_eq!(tl.total_ms(), 0.0);
    }
}
