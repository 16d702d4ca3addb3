//! Score persistence: YAML load/save.

use std::path::{Path, PathBuf};

use super::{Score, ScoreError};

/// Directory holding user scores (`~/.chiptrack/scores`).
pub fn default_score_dir() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".chiptrack");
    path.push("scores");
    path
}

/// Decode a score from YAML text.
pub fn from_yaml(text: &str) -> Result<Score, ScoreError> {
    let score: Score = serde_yaml::from_str(text)?;
    score.validate()?;
    for track in score.tracks.iter().filter(|t| t.has_shorten_markers()) {
        log::warn!(
            "track '{}' uses -2 cells; they shorten the previous note by one step",
            track.name
        );
    }
    Ok(score)
}

/// Encode a score as YAML text.
pub fn to_yaml(score: &Score) -> Result<String, ScoreError> {
    Ok(serde_yaml::to_string(score)?)
}

/// Load a score from a YAML file.
pub fn load_score(path: &Path) -> Result<Score, ScoreError> {
    let content = std::fs::read_to_string(path)?;
    from_yaml(&content)
}

/// Save a score to a YAML file, creating parent directories as needed.
pub fn save_score(path: &Path, score: &Score) -> Result<(), ScoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_yaml(score)?)?;
    Ok(())
}
