//! Runtime configuration loaded from `~/.chiptrack/config.yaml`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::event::transport::DEFAULT_LOOKAHEAD_MS;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Playback and rendering settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output sample rate. `None` uses the device default.
    pub sample_rate: Option<u32>,
    /// Scheduling window in milliseconds of score time.
    pub lookahead_ms: f64,
    /// Host timer period in milliseconds.
    pub tick_ms: u64,
    /// Master volume (0.0 to 1.0).
    pub volume: f32,
    /// Master limiter ceiling.
    pub limiter_ceiling: f32,
    /// Seed for the noise waveforms.
    pub seed: u64,
    /// Sample rate used by `export` when none is given.
    pub export_sample_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: None,
            lookahead_ms: DEFAULT_LOOKAHEAD_MS,
            tick_ms: 10,
            volume: 0.8,
            limiter_ceiling: 0.95,
            seed: 42,
            export_sample_rate: 44100,
        }
    }
}

impl Config {
    /// Standard location of the config file.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".chiptrack");
        path.push("config.yaml");
        path
    }

    /// Load from the standard path, falling back to defaults on any problem.
    pub fn load() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Replace out-of-range values with defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.lookahead_ms.is_finite() && self.lookahead_ms >= 1.0) {
            self.lookahead_ms = defaults.lookahead_ms;
        }
        // A tick longer than half the lookahead would schedule notes late.
        let max_tick = (self.lookahead_ms / 2.0).floor().max(1.0) as u64;
        if self.tick_ms == 0 || self.tick_ms > max_tick {
            self.tick_ms = defaults.tick_ms.min(max_tick);
        }
        if !self.volume.is_finite() {
            self.volume = defaults.volume;
        }
        self.volume = self.volume.clamp(0.0, 1.0);
        if !(self.limiter_ceiling.is_finite() && self.limiter_ceiling > 0.0) {
            self.limiter_ceiling = defaults.limiter_ceiling;
        }
        self.limiter_ceiling = self.limiter_ceiling.min(1.0);
        if self.sample_rate == Some(0) {
            self.sample_rate = None;
        }
        if self.export_sample_rate == 0 {
            self.export_sample_rate = defaults.export_sample_rate;
        }
        self
    }
}
