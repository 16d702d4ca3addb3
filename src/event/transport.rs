//! Transport: lookahead scheduling of score notes against the audio clock.
//!
//! The host calls [`Transport::tick`] from a coarse timer. Each time host time
//! reaches the next boundary the transport takes the notes of the score window
//! `[from, to)` and schedules them at `origin + start_ms / 1000` on the audio
//! clock, so audible timing never depends on when the tick actually fired.
//!
//! Two clocks are in play:
//! - host milliseconds, passed in by the caller, drive window advancement
//! - audio seconds, read from the [`AudioSink`], place the notes

use log::{debug, warn};

use super::timeline::Timeline;
use super::types::{clamp_cell, note_span, NoteEvent};
use crate::audio::{AudioError, AudioSink, Bounce, VoiceHandle};
use crate::score::{Score, Track};
use crate::synth::{NoteRenderer, Param, ParamVector};

/// Default lookahead window in milliseconds of score time.
pub const DEFAULT_LOOKAHEAD_MS: f64 = 100.0;

/// A note this close to "now" still counts as on time.
const LATE_TOLERANCE_S: f64 = 1e-6;

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

/// Scheduling counters since the last `play`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Notes handed to the sink.
    pub scheduled: u64,
    /// Notes whose start time had already passed.
    pub dropped: u64,
    /// Notes the sink refused.
    pub failed: u64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveVoice {
    handle: VoiceHandle,
    /// Audio time the voice finishes, in seconds.
    ends_at: f64,
}

/// Instrument parameters for one note of a track.
pub fn note_params(track: &Track, cell: i32, duration_ms: f64) -> ParamVector {
    let mut params = track.params;
    params.set(Param::Frequency, (cell + track.tuning) as f64);
    params.set(Param::Length, duration_ms);
    params
}

/// Owns the score and its playback state.
pub struct Transport {
    score: Score,
    renderer: NoteRenderer,
    timeline: Timeline,
    stale: bool,
    state: PlayState,
    lookahead_ms: f64,
    /// Audio time (s) at which score time 0 sounds.
    origin: f64,
    /// Host time (ms) corresponding to score time 0.
    host_origin_ms: f64,
    /// Host time at which the next window is due.
    next_tick_ms: f64,
    /// Next window to schedule, in score ms.
    window_from: f64,
    window_to: f64,
    /// Score ms where the current play started.
    start_ms: f64,
    paused_at: f64,
    /// Score ms from which silenced notes must be scheduled again.
    rewind_from: Option<f64>,
    voices: Vec<ActiveVoice>,
    stats: TransportStats,
}

impl Transport {
    pub fn new(score: Score, renderer: NoteRenderer, lookahead_ms: f64) -> Self {
        let lookahead_ms = if lookahead_ms.is_finite() && lookahead_ms >= 1.0 {
            lookahead_ms
        } else {
            DEFAULT_LOOKAHEAD_MS
        };
        let timeline = Timeline::build(&score);
        Self {
            score,
            renderer,
            timeline,
            stale: false,
            state: PlayState::Stopped,
            lookahead_ms,
            origin: 0.0,
            host_origin_ms: 0.0,
            next_tick_ms: 0.0,
            window_from: 0.0,
            window_to: 0.0,
            start_ms: 0.0,
            paused_at: 0.0,
            rewind_from: None,
            voices: Vec::new(),
            stats: TransportStats::default(),
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn lookahead_ms(&self) -> f64 {
        self.lookahead_ms
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    /// Mutable access for editing. The timeline is rebuilt before the next
    /// scheduling pass.
    pub fn score_mut(&mut self) -> &mut Score {
        self.stale = true;
        if self.state == PlayState::Stopped {
            self.rewind_from = None;
        }
        &mut self.score
    }

    pub fn timeline(&mut self) -> &Timeline {
        self.refresh();
        &self.timeline
    }

    /// Audio time (s) at which score time 0 sounds.
    pub fn origin(&self) -> f64 {
        self.origin
    }

    /// Current window `[from, to)` in score ms.
    pub fn window(&self) -> (f64, f64) {
        (self.window_from, self.window_to)
    }

    /// Audible position in score ms.
    pub fn position_ms<S: AudioSink + ?Sized>(&self, sink: &S) -> f64 {
        match self.state {
            PlayState::Stopped => 0.0,
            PlayState::Paused => self.rewind_from.unwrap_or(self.window_from),
            PlayState::Playing => ((sink.now() - self.origin) * 1000.0)
                .min(self.timeline.total_ms())
                .max(self.start_ms),
        }
    }

    /// Step under the audible position.
    pub fn position_step<S: AudioSink + ?Sized>(&self, sink: &S) -> usize {
        self.timeline.step_at(self.position_ms(sink))
    }

    fn refresh(&mut self) {
        if !self.stale {
            return;
        }
        self.timeline = Timeline::build(&self.score);
        self.stale = false;
        if self.state != PlayState::Stopped {
            self.timeline.seek(self.window_from);
        }
        debug!("timeline rebuilt: {} notes", self.timeline.len());
    }

    /// Start playback at `from_step`. Returns `false` (and changes nothing) when
    /// the score has no tracks or `from_step` is past its end.
    pub fn play<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        from_step: usize,
        host_ms: f64,
    ) -> bool {
        self.refresh();
        let total = self.timeline.total_steps();
        if self.score.tracks.is_empty() || from_step >= total {
            debug!("play ignored: step {from_step} of {total}");
            return false;
        }

        self.silence(sink);
        let from_ms = self.timeline.offset_ms(from_step);
        self.origin = sink.now() - from_ms / 1000.0;
        self.host_origin_ms = host_ms - from_ms;
        self.start_ms = from_ms;
        self.window_from = from_ms;
        self.window_to = from_ms + 2.0 * self.lookahead_ms;
        self.next_tick_ms = host_ms;
        self.rewind_from = None;
        self.stats = TransportStats::default();
        self.timeline.seek(from_ms);
        self.state = PlayState::Playing;
        debug!("play from step {from_step} ({from_ms} ms), origin {:.4}s", self.origin);

        self.tick(sink, host_ms);
        true
    }

    /// Advance scheduling to host time `host_ms`.
    ///
    /// Late ticks catch up one window at a time; notes whose start already
    /// passed are dropped and counted.
    pub fn tick<S: AudioSink + ?Sized>(&mut self, sink: &mut S, host_ms: f64) {
        if self.state != PlayState::Playing {
            return;
        }
        self.refresh();

        if host_ms >= self.host_origin_ms + self.timeline.total_ms() {
            debug!("playback finished");
            self.state = PlayState::Stopped;
            self.rewind_from = None;
            return;
        }

        self.prune(sink.now());

        if let Some(from) = self.rewind_from.take() {
            self.timeline.seek(from);
            let to = self.window_from;
            self.schedule(sink, from, to);
        }

        while host_ms >= self.next_tick_ms {
            let (from, to) = (self.window_from, self.window_to);
            self.schedule(sink, from, to);
            self.window_from = to;
            self.window_to = to + self.lookahead_ms;
            self.next_tick_ms += self.lookahead_ms;
        }
    }

    /// Render offline from `from_step` to the end of the score.
    ///
    /// Host time follows the sink's clock in steps of `tick_ms`, capped at half
    /// the lookahead so every window is scheduled before its first note is due.
    pub fn bounce(&mut self, sink: &mut Bounce, from_step: usize, tick_ms: f64) -> bool {
        let half = self.lookahead_ms / 2.0;
        let step = if tick_ms.is_finite() && tick_ms > 0.0 {
            tick_ms.min(half)
        } else {
            half
        };
        let mut host_ms = sink.now() * 1000.0;
        if !self.play(sink, from_step, host_ms) {
            return false;
        }
        while self.state == PlayState::Playing {
            host_ms += step;
            sink.advance_to(host_ms / 1000.0);
            self.tick(sink, host_ms);
        }
        true
    }

    /// Silence everything and remember where playback was.
    pub fn pause<S: AudioSink + ?Sized>(&mut self, sink: &mut S, host_ms: f64) {
        if self.state != PlayState::Playing {
            return;
        }
        let playhead = ((sink.now() - self.origin) * 1000.0)
            .max(self.start_ms)
            .min(self.window_from);
        self.rewind_from = Some(match self.rewind_from {
            Some(pending) => pending.min(playhead),
            None => playhead,
        });
        self.silence(sink);
        self.paused_at = host_ms;
        self.state = PlayState::Paused;
        debug!("paused at {playhead:.1} ms");
    }

    /// Continue after a pause, shifting every later note by the pause length.
    pub fn resume(&mut self, host_ms: f64) {
        if self.state != PlayState::Paused {
            return;
        }
        let diff = (host_ms - self.paused_at).max(0.0);
        self.origin += diff / 1000.0;
        self.host_origin_ms += diff;
        self.next_tick_ms += diff;
        self.state = PlayState::Playing;
        debug!("resumed after {diff:.1} ms");
    }

    pub fn stop<S: AudioSink + ?Sized>(&mut self, sink: &mut S) {
        self.silence(sink);
        self.state = PlayState::Stopped;
        self.rewind_from = None;
    }

    /// Play from `from_step` when stopped, otherwise pause or resume.
    pub fn toggle<S: AudioSink + ?Sized>(&mut self, sink: &mut S, from_step: usize, host_ms: f64) {
        match self.state {
            PlayState::Stopped => {
                self.play(sink, from_step, host_ms);
            }
            PlayState::Playing => self.pause(sink, host_ms),
            PlayState::Paused => {
                self.resume(host_ms);
                self.tick(sink, host_ms);
            }
        }
    }

    /// Sound the note at `step` of `track` right away, with its tied length.
    ///
    /// Returns `Ok(None)` when the track does not exist or the cell is not a note.
    pub fn preview_note<S: AudioSink + ?Sized>(
        &mut self,
        sink: &mut S,
        track: usize,
        step: usize,
    ) -> Result<Option<VoiceHandle>, AudioError> {
        self.refresh();
        let Ok(t) = self.score.track(track) else {
            return Ok(None);
        };
        let Some(steps) = note_span(&t.notes, step) else {
            return Ok(None);
        };
        let duration_ms =
            self.timeline.offset_ms(step + steps as usize) - self.timeline.offset_ms(step);
        let params = note_params(t, clamp_cell(t.notes[step]), duration_ms);
        let samples = self.renderer.render(&params);
        let frames = samples.len();
        let at = sink.now();
        let handle = sink.play(samples, at)?;
        self.voices.push(ActiveVoice {
            handle,
            ends_at: at + frames as f64 / sink.sample_rate() as f64,
        });
        Ok(Some(handle))
    }

    fn schedule<S: AudioSink + ?Sized>(&mut self, sink: &mut S, from: f64, to: f64) {
        let notes = self.timeline.drain_window(from, to);
        if notes.is_empty() {
            return;
        }
        let now = sink.now();
        for note in notes {
            let at = self.origin + note.start_ms / 1000.0;
            if at + LATE_TOLERANCE_S < now {
                self.stats.dropped += 1;
                warn!(
                    "dropped late note: track {} step {} was due at {at:.4}s, clock at {now:.4}s",
                    note.track.0, note.step
                );
                continue;
            }
            self.play_note(sink, &note, at);
        }
    }

    fn play_note<S: AudioSink + ?Sized>(&mut self, sink: &mut S, note: &NoteEvent, at: f64) {
        let Ok(track) = self.score.track(note.track.0) else {
            return;
        };
        let params = note_params(track, note.cell, note.duration_ms);
        let samples = self.renderer.render(&params);
        let frames = samples.len();
        match sink.play(samples, at) {
            Ok(handle) => {
                self.stats.scheduled += 1;
                self.voices.push(ActiveVoice {
                    handle,
                    ends_at: at + frames as f64 / sink.sample_rate() as f64,
                });
                debug!(
                    "track {} step {} cell {} at {at:.4}s ({} steps)",
                    note.track.0, note.step, note.cell, note.steps
                );
            }
            Err(e) => {
                self.stats.failed += 1;
                log::error!("could not schedule note: {e}");
            }
        }
    }

    /// Forget voices that have finished on their own.
    fn prune(&mut self, now: f64) {
        self.voices.retain(|v| v.ends_at > now);
    }

    /// Stop every voice this transport started.
    fn silence<S: AudioSink + ?Sized>(&mut self, sink: &mut S) {
        let mut failed = false;
        for voice in self.voices.drain(..) {
            if let Err(e) = sink.stop(voice.handle) {
                warn!("stopping voice {:?} failed: {e}", voice.handle);
                failed = true;
            }
        }
        if failed {
            if let Err(e) = sink.stop_all() {
                log::error!("stopping all voices failed: {e}");
            }
        }
    }

    /// Voices that may still be sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Audio time (s) at which the last started voice finishes, release included.
    pub fn tail_end(&self) -> Option<f64> {
        self.voices.iter().map(|v| v.ends_at).reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const SR: u32 = 8000;

    fn score_with(notes: &[i32]) -> Score {
        let mut score = Score::new("test");
        let mut track = Track::new("lead", ParamVector::sine());
        track.notes = notes.to_vec();
        score.tracks = vec![track];
        score
    }

    fn transport(notes: &[i32]) -> Transport {
        Transport::new(score_with(notes), NoteRenderer::new(SR, 1), 100.0)
    }

    fn starts(sink: &Bounce) -> Vec<f64> {
        sink.scheduled().iter().map(|s| s.at).collect()
    }

    #[test]
    fn play_past_end_is_noop() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 40]);
        assert!(!t.play(&mut sink, 2, 0.0));
        assert_eq!(t.state(), PlayState::Stopped);
        assert!(sink.scheduled().is_empty());
    }

    #[test]
    fn play_empty_score_is_noop() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[]);
        assert!(!t.play(&mut sink, 0, 0.0));
        assert_eq!(t.state(), PlayState::Stopped);
    }

    #[test]
    fn first_window_covers_two_lookaheads() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 40, 40]);
        assert!(t.play(&mut sink, 0, 0.0));
        assert_eq!(t.state(), PlayState::Playing);
        assert_eq!(starts(&sink), vec![0.0]);
        assert_eq!(t.window(), (200.0, 300.0));
    }

    #[test]
    fn note_waits_for_its_window() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[0, 40]);
        t.play(&mut sink, 0, 0.0);
        t.tick(&mut sink, 50.0);
        assert!(sink.scheduled().is_empty());
        t.tick(&mut sink, 100.0);
        assert_eq!(starts(&sink), vec![0.25]);
    }

    #[test]
    fn late_tick_keeps_absolute_time() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[0, 40]);
        t.play(&mut sink, 0, 0.0);
        t.tick(&mut sink, 180.0);
        assert_eq!(sink.scheduled().len(), 1);
        assert_approx_eq!(sink.scheduled()[0].at, t.origin() + 0.25);
    }

    #[test]
    fn play_from_step_offsets_origin() {
        let mut sink = Bounce::new(SR);
        sink.advance(1.0);
        let mut t = transport(&[40, 40, 40, 40]);
        t.play(&mut sink, 2, 0.0);
        assert_approx_eq!(t.origin(), 1.0 - 0.5);
        assert_eq!(sink.scheduled().len(), 1);
        assert_approx_eq!(sink.scheduled()[0].at, 1.0);
    }

    #[test]
    fn overdue_notes_are_dropped_and_counted() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40; 8]);
        t.play(&mut sink, 0, 0.0);
        sink.advance_to(1.0);
        t.tick(&mut sink, 1000.0);
        let stats = t.stats();
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.scheduled, 2);
        assert_approx_eq!(sink.scheduled()[1].at, 1.0);
    }

    #[test]
    fn reaching_the_end_stops() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 40]);
        t.play(&mut sink, 0, 0.0);
        t.tick(&mut sink, 499.0);
        assert_eq!(t.state(), PlayState::Playing);
        t.tick(&mut sink, 500.0);
        assert_eq!(t.state(), PlayState::Stopped);
    }

    #[test]
    fn pause_silences_all_voices() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 40, 40, 40]);
        t.play(&mut sink, 0, 0.0);
        t.tick(&mut sink, 100.0);
        assert!(sink.active_voices() > 0);
        t.pause(&mut sink, 100.0);
        assert_eq!(t.state(), PlayState::Paused);
        assert_eq!(sink.active_voices(), 0);
        assert_eq!(t.active_voices(), 0);
        // Ticks while paused do nothing.
        let before = sink.scheduled().len();
        t.tick(&mut sink, 400.0);
        assert_eq!(sink.scheduled().len(), before);
    }

    #[test]
    fn resume_shifts_origin_by_pause_length() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 40, 40, 40]);
        t.play(&mut sink, 0, 0.0);
        let origin = t.origin();
        t.pause(&mut sink, 120.0);
        t.resume(620.0);
        assert_approx_eq!(t.origin(), origin + 0.5);
        assert_eq!(t.state(), PlayState::Playing);
    }

    #[test]
    fn toggle_cycles_states() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 40, 40, 40]);
        t.toggle(&mut sink, 0, 0.0);
        assert_eq!(t.state(), PlayState::Playing);
        t.toggle(&mut sink, 0, 10.0);
        assert_eq!(t.state(), PlayState::Paused);
        t.toggle(&mut sink, 0, 20.0);
        assert_eq!(t.state(), PlayState::Playing);
        t.stop(&mut sink);
        assert_eq!(t.state(), PlayState::Stopped);
    }

    #[test]
    fn edits_are_picked_up_while_playing() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 0, 0, 0]);
        t.play(&mut sink, 0, 0.0);
        t.score_mut().set_note(0, 2, 45).unwrap();
        t.tick(&mut sink, 400.0);
        assert_eq!(sink.scheduled().len(), 2);
        assert_approx_eq!(sink.scheduled()[1].at, 0.5);
    }

    #[test]
    fn preview_uses_tied_length() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, -1, 0]);
        let v = t.preview_note(&mut sink, 0, 0).unwrap();
        assert!(v.is_some());
        let mut params = ParamVector::sine();
        params.set(Param::Length, 500.0);
        let expected = crate::synth::render::buffer_len(&params, SR);
        assert_eq!(sink.scheduled()[0].frames, expected);
        assert!(t.preview_note(&mut sink, 0, 1).unwrap().is_none());
        assert!(t.preview_note(&mut sink, 9, 0).unwrap().is_none());
    }

    #[test]
    fn coarse_bounce_ticks_drop_nothing() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40; 16]);
        assert!(t.bounce(&mut sink, 0, 330.0));
        assert_eq!(t.state(), PlayState::Stopped);
        assert_eq!(t.stats().dropped, 0);
        assert_eq!(t.stats().scheduled, 16);
        for (i, at) in starts(&sink).iter().enumerate() {
            assert_approx_eq!(*at, i as f64 * 0.25);
        }
    }

    #[test]
    fn bounce_past_end_is_noop() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[40, 40]);
        assert!(!t.bounce(&mut sink, 5, 10.0));
        assert!(sink.scheduled().is_empty());
    }

    #[test]
    fn tail_end_tracks_last_release() {
        let mut sink = Bounce::new(SR);
        let mut t = transport(&[0, 40]);
        assert_eq!(t.tail_end(), None);
        assert!(t.bounce(&mut sink, 0, 10.0));
        let frames = sink.scheduled()[0].frames;
        let tail = t.tail_end().unwrap();
        assert_approx_eq!(tail, 0.25 + frames as f64 / SR as f64);
        // The note outlasts the score.
        assert!(tail > 0.5);
        t.stop(&mut sink);
        assert_eq!(t.tail_end(), None);
    }

    #[test]
    fn note_params_override_pitch_and_length() {
        let mut track = Track::new("x", ParamVector::sine());
        track.tuning = -3;
        let p = note_params(&track, 52, 375.0);
        assert_eq!(p.get(Param::Frequency), 49.0);
        assert_eq!(p.get(Param::Length), 375.0);
        assert_eq!(p.get(Param::Wave), track.params.get(Param::Wave));
    }
}
