//! chiptrack: play, export and inspect chiptune scores.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use log::{debug, info, warn};

use chiptrack::audio::wav::write_wav;
use chiptrack::audio::{AudioEngine, AudioSink, Bounce, Limiter};
use chiptrack::config::Config;
use chiptrack::event::{duration_ms, note_params, PlayState, Transport};
use chiptrack::score::persistence::{default_score_dir, load_score, save_score};
use chiptrack::score::scale::{cell_name, scale};
use chiptrack::score::Score;
use chiptrack::synth::params::describe;
use chiptrack::synth::NoteRenderer;

/// Time given to the output stream to flush its buffers after the last voice ends.
const DRAIN: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "chiptrack", version, about = "Parametric chiptune synthesizer and sequencer")]
struct Cli {
    /// Config file (defaults to ~/.chiptrack/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a score through the default output device
    Play {
        /// Score file; the starter score when omitted
        file: Option<PathBuf>,
        /// First step to play
        #[arg(long, default_value_t = 0)]
        from: usize,
    },
    /// Render a score offline to a 16-bit WAV file
    Export {
        file: PathBuf,
        out: PathBuf,
        /// Output sample rate
        #[arg(long)]
        sample_rate: Option<u32>,
        #[arg(long, default_value_t = 0)]
        from: usize,
    },
    /// Sound one note cell with a track's instrument
    Note {
        /// Note cell (1..=98, 49 is A4)
        cell: i32,
        /// Score file; the starter score when omitted
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        track: usize,
        /// Length in steps at the score's base tempo
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Write the starter score to a file
    New {
        /// Defaults to ~/.chiptrack/scores/untitled.yaml
        out: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Describe a score
    Info {
        file: PathBuf,
        /// Also list every instrument parameter
        #[arg(long)]
        params: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        Command::Play { file, from } => play(&config, file.as_deref(), from),
        Command::Export {
            file,
            out,
            sample_rate,
            from,
        } => export(&config, &file, &out, sample_rate, from),
        Command::Note {
            cell,
            file,
            track,
            steps,
        } => note(&config, file.as_deref(), cell, track, steps),
        Command::New { out, force } => {
            let out = out.unwrap_or_else(|| default_score_dir().join("untitled.yaml"));
            new_score(&out, force)
        }
        Command::Info { file, params } => show_info(&file, params),
    }
}

fn open_score(file: Option<&Path>) -> Result<Score, Box<dyn Error>> {
    match file {
        Some(path) => Ok(load_score(path)?),
        None => Ok(Score::starter()),
    }
}

fn open_engine(config: &Config) -> Result<AudioEngine, Box<dyn Error>> {
    let limiter = Limiter::new(config.limiter_ceiling);
    let mut engine = match config.sample_rate {
        Some(rate) => AudioEngine::with_config(rate, 2, limiter)?,
        None => AudioEngine::new(limiter)?,
    };
    engine.set_volume(config.volume)?;
    Ok(engine)
}

fn play(config: &Config, file: Option<&Path>, from: usize) -> Result<(), Box<dyn Error>> {
    let score = open_score(file)?;
    let mut engine = open_engine(config)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

    info!(
        "playing '{}' ({} tracks, {} steps) from step {from}",
        score.name,
        score.tracks.len(),
        score.total_steps()
    );

    let renderer = NoteRenderer::new(engine.sample_rate(), config.seed);
    let mut transport = Transport::new(score, renderer, config.lookahead_ms);
    let started = Instant::now();
    let host_ms = |start: Instant| start.elapsed().as_secs_f64() * 1000.0;

    if !transport.play(&mut engine, from, host_ms(started)) {
        warn!("nothing to play from step {from}");
        return Ok(());
    }

    let tick = Duration::from_millis(config.tick_ms);
    let mut step = None;
    while transport.state() == PlayState::Playing {
        if !running.load(Ordering::SeqCst) {
            info!("interrupted");
            transport.stop(&mut engine);
            break;
        }
        transport.tick(&mut engine, host_ms(started));
        if transport.state() == PlayState::Playing {
            let now = transport.position_step(&engine);
            if step != Some(now) {
                debug!("step {now}");
                step = Some(now);
            }
        }
        thread::sleep(tick);
    }

    let stats = transport.stats();
    info!(
        "done: {} notes scheduled, {} dropped, {} failed",
        stats.scheduled, stats.dropped, stats.failed
    );

    // Let the last notes ring out through their release.
    if let Some(tail) = transport.tail_end() {
        debug!("waiting for tails until {tail:.3}s");
        while running.load(Ordering::SeqCst) && engine.now() < tail {
            thread::sleep(tick);
        }
    }
    thread::sleep(DRAIN);
    Ok(())
}

fn export(
    config: &Config,
    file: &Path,
    out: &Path,
    sample_rate: Option<u32>,
    from: usize,
) -> Result<(), Box<dyn Error>> {
    let score = load_score(file)?;
    let rate = sample_rate.unwrap_or(config.export_sample_rate).max(1);
    let mut bounce = Bounce::with_limiter(rate, Limiter::new(config.limiter_ceiling));
    let renderer = NoteRenderer::new(rate, config.seed);
    let mut transport = Transport::new(score, renderer, config.lookahead_ms);

    if !transport.bounce(&mut bounce, from, config.tick_ms as f64) {
        warn!("nothing to export from step {from}");
        return Ok(());
    }

    let stats = transport.stats();
    let samples = bounce.finish();
    write_wav(out, &samples, rate)?;
    info!(
        "wrote {} ({:.2}s, {} notes)",
        out.display(),
        samples.len() as f64 / rate as f64,
        stats.scheduled
    );
    Ok(())
}

fn note(
    config: &Config,
    file: Option<&Path>,
    cell: i32,
    track: usize,
    steps: u32,
) -> Result<(), Box<dyn Error>> {
    let score = open_score(file)?;
    let track = score.track(track)?;
    let mut engine = open_engine(config)?;
    let mut renderer = NoteRenderer::new(engine.sample_rate(), config.seed);

    let length = duration_ms(score.tempo.base(), steps.max(1));
    let params = note_params(track, cell, length);
    let samples = renderer.render(&params);
    let seconds = samples.len() as f64 / engine.sample_rate() as f64;
    info!("{} on '{}' for {seconds:.2}s", cell_name(cell + track.tuning), track.name);

    let at = engine.now();
    engine.play(samples, at)?;
    thread::sleep(Duration::from_secs_f64(seconds) + DRAIN);
    Ok(())
}

fn new_score(out: &Path, force: bool) -> Result<(), Box<dyn Error>> {
    if out.exists() && !force {
        return Err(format!("{} already exists (use --force)", out.display()).into());
    }
    save_score(out, &Score::starter())?;
    info!("wrote {}", out.display());
    Ok(())
}

fn show_info(file: &Path, params: bool) -> Result<(), Box<dyn Error>> {
    let score = load_score(file)?;
    let key = scale(&score.root, score.mode)
        .map(|notes| notes.join(" "))
        .unwrap_or_else(|| "?".to_string());

    println!("{}", score.name);
    println!("key:    {} {} ({key})", score.root, score.mode.name());
    println!("tempo:  {} BPM", score.tempo.base());
    for (step, &bpm) in score.tempo.entries().iter().enumerate() {
        if bpm > 0.0 {
            println!("        step {step}: {bpm} BPM");
        }
    }
    println!("steps:  {}", score.total_steps());
    for (i, track) in score.tracks.iter().enumerate() {
        let notes = track.notes.iter().filter(|&&c| c > 0).count();
        println!(
            "track {i}: {} ({} steps, {notes} notes, tuning {:+})",
            track.name,
            track.len(),
            track.tuning
        );
        if params {
            for (name, value) in describe(&track.params) {
                println!("    {name:<14} {value}");
            }
        }
    }
    Ok(())
}
