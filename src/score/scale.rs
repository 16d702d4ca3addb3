//! Key and mode tables used to describe a score and highlight in-key notes.
//!
//! Nothing here affects synthesis.

use serde::{Deserialize, Deserializer, Serialize};

use crate::synth::oscillator::SEMITONE_OFFSET;

/// Note names, starting from C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "G#", "A", "Bb", "B",
];

/// Scale modes as interval patterns in semitones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Major,
    Minor,
    PentatonicMajor,
    PentatonicMinor,
    HarmonicMajor,
    HarmonicMinor,
    MelodicMinor,
    Augmented,
    Blues,
    WholeTone,
    Algerian,
}

impl Mode {
    pub const ALL: [Mode; 11] = [
        Mode::Major,
        Mode::Minor,
        Mode::PentatonicMajor,
        Mode::PentatonicMinor,
        Mode::HarmonicMajor,
        Mode::HarmonicMinor,
        Mode::MelodicMinor,
        Mode::Augmented,
        Mode::Blues,
        Mode::WholeTone,
        Mode::Algerian,
    ];

    pub fn intervals(self) -> &'static [u8] {
        match self {
            Mode::Major => &[2, 2, 1, 2, 2, 2, 1],
            Mode::Minor => &[2, 1, 2, 2, 1, 2, 2],
            Mode::PentatonicMajor => &[2, 2, 3, 2, 3],
            Mode::PentatonicMinor => &[3, 2, 2, 3, 2],
            Mode::HarmonicMajor => &[2, 2, 1, 2, 1, 3, 1],
            Mode::HarmonicMinor => &[2, 1, 2, 2, 1, 3, 1],
            Mode::MelodicMinor => &[2, 1, 2, 2, 2, 2, 1],
            Mode::Augmented => &[3, 1, 3, 1, 3, 1],
            Mode::Blues => &[3, 2, 1, 1, 3, 2],
            Mode::WholeTone => &[2, 2, 2, 2, 2, 2],
            Mode::Algerian => &[2, 1, 3, 1, 1, 3, 1, 2, 1, 2],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "MAJOR",
            Mode::Minor => "MINOR",
            Mode::PentatonicMajor => "PENTATONIC MAJOR",
            Mode::PentatonicMinor => "PENTATONIC MINOR",
            Mode::HarmonicMajor => "HARMONIC MAJOR",
            Mode::HarmonicMinor => "HARMONIC MINOR",
            Mode::MelodicMinor => "MELODIC MINOR",
            Mode::Augmented => "AUGMENTED",
            Mode::Blues => "BLUES",
            Mode::WholeTone => "WHOLE TONE",
            Mode::Algerian => "ALGERIAN",
        }
    }

    /// Case-insensitive lookup; spaces, dashes and underscores are interchangeable.
    pub fn from_name(name: &str) -> Option<Mode> {
        let wanted = name.trim().replace(['-', '_'], " ").to_ascii_uppercase();
        if wanted == "MELODIC HARMONIC" {
            return Some(Mode::MelodicMinor);
        }
        Mode::ALL.iter().copied().find(|m| m.name() == wanted)
    }
}

/// Reads any spelling [`Mode::from_name`] accepts. An unknown mode loads as MAJOR.
impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Mode::from_name(&name).unwrap_or_else(|| {
            log::warn!("unknown mode '{name}', using MAJOR");
            Mode::Major
        }))
    }
}

/// Index of a note name in [`NOTE_NAMES`], accepting common enharmonics.
pub fn note_index(name: &str) -> Option<usize> {
    let name = name.trim();
    let canonical = match name {
        "Db" => "C#",
        "D#" => "Eb",
        "Gb" => "F#",
        "Ab" => "G#",
        "A#" => "Bb",
        other => other,
    };
    NOTE_NAMES
        .iter()
        .position(|n| n.eq_ignore_ascii_case(canonical))
}

/// Note names of `mode` starting at `root`, root repeated at the octave.
pub fn scale(root: &str, mode: Mode) -> Option<Vec<&'static str>> {
    let mut index = note_index(root)?;
    let mut out = vec![NOTE_NAMES[index]];
    for &step in mode.intervals() {
        index = (index + step as usize) % NOTE_NAMES.len();
        out.push(NOTE_NAMES[index]);
    }
    Some(out)
}

/// Pitch-class name of a semitone offset from A4.
pub fn semitone_pitch_class(semitone: i32) -> &'static str {
    NOTE_NAMES[(semitone + 9).rem_euclid(12) as usize]
}

/// Full name with octave of a semitone offset from A4 (`0` → `A4`).
pub fn semitone_name(semitone: i32) -> String {
    let octave = 4 + (semitone + 9).div_euclid(12);
    format!("{}{}", semitone_pitch_class(semitone), octave)
}

/// Name of a note cell on a track with no transpose.
pub fn cell_name(cell: i32) -> String {
    semitone_name(cell - SEMITONE_OFFSET)
}

/// Whether a note cell falls in the given key.
pub fn in_key(cell: i32, root: &str, mode: Mode) -> bool {
    let class = semitone_pitch_class(cell - SEMITONE_OFFSET);
    scale(root, mode).is_some_and(|notes| notes.contains(&class))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_major() {
        let notes = scale("C", Mode::Major).unwrap();
        assert_eq!(notes, vec!["C", "D", "E", "F", "G", "A", "B", "C"]);
    }

    #[test]
    fn a_minor_wraps() {
        let notes = scale("A", Mode::Minor).unwrap();
        assert_eq!(notes, vec!["A", "B", "C", "D", "E", "F", "G", "A"]);
    }

    #[test]
    fn unknown_root() {
        assert!(scale("H", Mode::Major).is_none());
        assert_eq!(note_index("Db"), Some(1));
    }

    #[test]
    fn semitone_names() {
        assert_eq!(semitone_name(0), "A4");
        assert_eq!(semitone_name(3), "C5");
        assert_eq!(semitone_name(-9), "C4");
        assert_eq!(semitone_name(-10), "B3");
        assert_eq!(cell_name(49), "A4");
    }

    #[test]
    fn in_key_check() {
        // Cell 40 is C4.
        assert!(in_key(40, "C", Mode::Major));
        assert!(!in_key(41, "C", Mode::Major));
        assert!(in_key(41, "C#", Mode::Major));
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(Mode::from_name("whole-tone"), Some(Mode::WholeTone));
        assert_eq!(Mode::from_name("melodic harmonic"), Some(Mode::MelodicMinor));
        assert_eq!(Mode::from_name("lydian"), None);
    }
}
