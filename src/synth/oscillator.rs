//! Oscillator primitives: stateless waveform functions over a radian phase.

use std::f64::consts::{PI, TAU};

use rand::Rng;

/// Cell value that maps to the A4 reference pitch.
pub const SEMITONE_OFFSET: i32 = 49;

/// Reference pitch (A4) in Hz.
pub const REFERENCE_PITCH: f64 = 440.0;

/// Available waveform shapes, in parameter-slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    None,
    Sine,
    Square,
    Pulse,
    Triangle,
    Sawtooth,
    Noise,
    Static,
}

impl Waveform {
    pub const ALL: [Waveform; 8] = [
        Waveform::None,
        Waveform::Sine,
        Waveform::Square,
        Waveform::Pulse,
        Waveform::Triangle,
        Waveform::Sawtooth,
        Waveform::Noise,
        Waveform::Static,
    ];

    /// Resolve a waveform selector slot. Anything that is not a whole number in
    /// `0..=7` selects [`Waveform::None`].
    pub fn from_index(value: f64) -> Waveform {
        if value.fract() != 0.0 || !(0.0..=7.0).contains(&value) {
            log::debug!("bad waveform index {value}, treating as none");
            return Waveform::None;
        }
        Waveform::ALL[value as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::None => "None",
            Waveform::Sine => "Sine",
            Waveform::Square => "Square",
            Waveform::Pulse => "Pulse",
            Waveform::Triangle => "Triangle",
            Waveform::Sawtooth => "Sawtooth",
            Waveform::Noise => "Noise",
            Waveform::Static => "Static",
        }
    }

    /// Case-insensitive name lookup.
    pub fn from_name(name: &str) -> Option<Waveform> {
        let name = name.trim();
        Waveform::ALL
            .iter()
            .copied()
            .find(|w| w.name().eq_ignore_ascii_case(name))
    }

    /// Generate one sample at `phase` (radians in `[0, 2π)`), scaled to
    /// `[-amplitude, amplitude]`.
    pub fn generate<R: Rng + ?Sized>(
        self,
        amplitude: f64,
        phase: f64,
        extra: &OscExtra,
        rng: &mut R,
    ) -> f64 {
        match self {
            Waveform::None => 0.0,
            Waveform::Sine => amplitude * phase.sin(),
            Waveform::Square => {
                if phase < PI {
                    amplitude
                } else {
                    -amplitude
                }
            }
            Waveform::Pulse => {
                if phase < extra.pulse_width {
                    amplitude
                } else {
                    -amplitude
                }
            }
            Waveform::Triangle => {
                let slope = 2.0 * amplitude / PI;
                if phase < PI {
                    -amplitude + slope * phase
                } else {
                    3.0 * amplitude - slope * phase
                }
            }
            Waveform::Sawtooth => amplitude - (amplitude / PI) * phase,
            // Fresh value only on the sample that completes a cycle.
            Waveform::Noise => {
                if phase + extra.increment > TAU {
                    amplitude * rng.gen_range(-1.0..1.0)
                } else {
                    0.0
                }
            }
            Waveform::Static => amplitude * rng.gen_range(-1.0..1.0),
        }
    }
}

/// Per-sample side inputs to [`Waveform::generate`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OscExtra {
    /// Pulse duty threshold in radians.
    pub pulse_width: f64,
    /// Carrier phase increment for the current sample.
    pub increment: f64,
}

impl OscExtra {
    /// Build from the `cycle` parameter (duty as a fraction of one period).
    pub fn with_cycle(cycle: f64) -> Self {
        Self {
            pulse_width: TAU * cycle,
            increment: 0.0,
        }
    }
}

/// Frequency of a semitone offset from A4.
pub fn semitone_frequency(semitone: f64) -> f64 {
    REFERENCE_PITCH * 2.0f64.powf(semitone / 12.0)
}

/// Frequency of a note cell on a track with the given transpose.
pub fn note_frequency(cell: i32, tuning: i32) -> f64 {
    semitone_frequency((cell + tuning - SEMITONE_OFFSET) as f64)
}

/// Map an oscillator output in `[-1, 1]` onto `[min, max]`.
pub fn normalize(min: f64, max: f64, value: f64) -> f64 {
    (value + 1.0) * (max - min) / 2.0 + min
}
