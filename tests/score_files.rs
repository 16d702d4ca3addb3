//! Integration tests for score files and offline export.

use chiptrack::audio::wav::write_wav;
use chiptrack::audio::Bounce;
use chiptrack::event::{PlayState, Transport};
use chiptrack::score::persistence::{from_yaml, load_score, save_score, to_yaml};
use chiptrack::score::{Mode, Score, ScoreError};
use chiptrack::synth::{NoteRenderer, Param, Waveform};

const SAMPLE_RATE: u32 = 8000;

fn edited_score() -> Score {
    let mut score = Score::starter();
    score.name = "bounce test".to_string();
    score.root = "F#".to_string();
    score.mode = Mode::Blues;
    score.set_tempo_entry(4, 150.0);
    let bass = score.add_track("bass");
    score
        .set_param(bass, Param::Wave, Waveform::Pulse.index() as f64)
        .unwrap();
    score.set_param(bass, Param::Cycle, 0.25).unwrap();
    score.set_tuning(bass, -24).unwrap();
    for step in [0, 2, 4, 6] {
        score.set_note(bass, step, 49).unwrap();
    }
    score.set_note(bass, 7, -1).unwrap();
    score
}

#[test]
fn score_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores").join("song.yaml");
    let score = edited_score();

    save_score(&path, &score).unwrap();
    let loaded = load_score(&path).unwrap();
    assert_eq!(loaded, score);
    assert_eq!(loaded.tracks[2].params.waveform(Param::Wave), Waveform::Pulse);
}

#[test]
fn yaml_writes_waveforms_by_name() {
    let text = to_yaml(&edited_score()).unwrap();
    assert!(text.contains("Pulse"));
    assert!(text.contains("harmonic-mult-a"));
}

#[test]
fn numeric_param_list_is_accepted() {
    let yaml = r#"
name: list
tracks:
  - name: lead
    params: [2, 0.5, 49, 0, 0, 0, 1, 1, 1, 200, 0, 1]
    notes: [49, 0, 52]
"#;
    let score = from_yaml(yaml).unwrap();
    let params = score.tracks[0].params;
    assert_eq!(params.waveform(Param::Wave), Waveform::Square);
    assert_eq!(params.get(Param::Length), 200.0);
    // Missing slots default to zero.
    assert_eq!(params.get(Param::HarmonicGainC), 0.0);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_score(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ScoreError::Io(_)));
}

#[test]
fn export_renders_whole_score_to_wav() {
    let dir = tempfile::tempdir().unwrap();
    let score_path = dir.path().join("song.yaml");
    let wav_path = dir.path().join("song.wav");
    save_score(&score_path, &edited_score()).unwrap();

    let score = load_score(&score_path).unwrap();
    let total_steps = score.total_steps();
    let mut sink = Bounce::new(SAMPLE_RATE);
    let mut transport = Transport::new(score, NoteRenderer::new(SAMPLE_RATE, 42), 100.0);
    let total_ms = transport.timeline().total_ms();
    assert_eq!(transport.timeline().total_steps(), total_steps);

    assert!(transport.bounce(&mut sink, 0, 10.0));
    assert_eq!(transport.state(), PlayState::Stopped);
    assert_eq!(transport.stats().dropped, 0);

    let samples = sink.finish();
    assert!(samples.len() as f64 >= total_ms / 1000.0 * SAMPLE_RATE as f64);
    assert!(samples.iter().any(|&s| s != 0.0));
    assert!(samples.iter().all(|s| s.abs() <= 1.0));

    write_wav(&wav_path, &samples, SAMPLE_RATE).unwrap();
    let reader = hound::WavReader::open(&wav_path).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn export_with_coarse_tick_keeps_every_note() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.yaml");
    let mut score = Score::new("sixteen");
    for step in 0..16 {
        score.set_note(0, step, 40 + step as i32).unwrap();
    }
    save_score(&path, &score).unwrap();

    let score = load_score(&path).unwrap();
    let mut sink = Bounce::new(SAMPLE_RATE);
    let mut transport = Transport::new(score, NoteRenderer::new(SAMPLE_RATE, 42), 100.0);
    // A 330 ms host tick is longer than the lookahead window.
    assert!(transport.bounce(&mut sink, 0, 330.0));

    let stats = transport.stats();
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.scheduled, 16);
    let starts: Vec<f64> = sink.scheduled().iter().map(|s| s.at).collect();
    assert_eq!(starts.len(), 16);
    assert!(starts.windows(2).all(|w| w[0] < w[1]));

    let samples = sink.finish();
    assert!(samples.len() as f64 >= 4.0 * SAMPLE_RATE as f64);
}
