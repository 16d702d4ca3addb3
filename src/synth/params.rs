//! The 30-slot parameter vector that defines one instrument.
//!
//! Slots are addressed by [`Param`]. The renderer reads raw values and tolerates
//! anything finite; range clamping belongs to the editing layer and goes through
//! [`ParamSpec`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::oscillator::Waveform;

/// Number of slots in a [`ParamVector`].
pub const PARAM_COUNT: usize = 30;

/// Named index into a [`ParamVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Param {
    Wave = 0,
    Cycle,
    Frequency,
    Speed,
    Accel,
    Jerk,
    Attack,
    Decay,
    Sustain,
    Length,
    Release,
    Volume,
    VibratoWave,
    VibratoFreq,
    VibratoDepth,
    TremoloWave,
    TremoloFreq,
    TremoloDepth,
    BitCrush,
    Noise,
    Distortion,
    LowPass,
    HighPass,
    Repeat,
    HarmonicMultA,
    HarmonicGainA,
    HarmonicMultB,
    HarmonicGainB,
    HarmonicMultC,
    HarmonicGainC,
}

impl Param {
    /// Every parameter in slot order.
    pub const ALL: [Param; PARAM_COUNT] = [
        Param::Wave,
        Param::Cycle,
        Param::Frequency,
        Param::Speed,
        Param::Accel,
        Param::Jerk,
        Param::Attack,
        Param::Decay,
        Param::Sustain,
        Param::Length,
        Param::Release,
        Param::Volume,
        Param::VibratoWave,
        Param::VibratoFreq,
        Param::VibratoDepth,
        Param::TremoloWave,
        Param::TremoloFreq,
        Param::TremoloDepth,
        Param::BitCrush,
        Param::Noise,
        Param::Distortion,
        Param::LowPass,
        Param::HighPass,
        Param::Repeat,
        Param::HarmonicMultA,
        Param::HarmonicGainA,
        Param::HarmonicMultB,
        Param::HarmonicGainB,
        Param::HarmonicMultC,
        Param::HarmonicGainC,
    ];

    /// Slot index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Range and naming metadata for this slot.
    pub fn spec(self) -> &'static ParamSpec {
        &PARAM_SPECS[self.index()]
    }

    /// Look a parameter up by its serialized (kebab-case) name.
    pub fn from_io_name(name: &str) -> Option<Param> {
        Param::ALL.iter().copied().find(|p| p.spec().io_name == name)
    }

    /// Whether this slot selects a waveform rather than holding a quantity.
    pub fn is_waveform(self) -> bool {
        matches!(
            self,
            Param::Wave | Param::VibratoWave | Param::TremoloWave
        )
    }
}

/// Editor-facing metadata for one slot: display name, file name and range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub io_name: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamSpec {
    const fn new(
        name: &'static str,
        io_name: &'static str,
        min: f64,
        max: f64,
        step: f64,
    ) -> Self {
        Self {
            name,
            io_name,
            min,
            max,
            step,
        }
    }

    /// Clamp `value` into `[min, max]`. Non-finite input collapses to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.min
        }
    }
}

/// Slot metadata, in [`Param`] order.
pub static PARAM_SPECS: [ParamSpec; PARAM_COUNT] = [
    ParamSpec::new("Wave", "wave", 0.0, 7.0, 1.0),
    ParamSpec::new("Cycle", "cycle", 0.0, 1.0, 0.01),
    ParamSpec::new("Frequency", "frequency", 0.0, 99.0, 1.0),
    ParamSpec::new("Speed", "speed", -1.0, 1.0, 0.001),
    ParamSpec::new("Accel", "accel", -1.0, 1.0, 0.001),
    ParamSpec::new("Jerk", "jerk", -1.0, 1.0, 0.001),
    ParamSpec::new("Attack", "attack", 0.0, 5000.0, 1.0),
    ParamSpec::new("Decay", "decay", 0.0, 5000.0, 1.0),
    ParamSpec::new("Sustain", "sustain", 0.0, 1.0, 0.01),
    ParamSpec::new("Length", "length", 0.0, 10000.0, 1.0),
    ParamSpec::new("Release", "release", 0.0, 5000.0, 1.0),
    ParamSpec::new("Volume", "volume", 0.0, 2.0, 0.01),
    ParamSpec::new("Vibrato Wave", "vibrato-wave", 0.0, 7.0, 1.0),
    ParamSpec::new("Vibrato Freq", "vibrato-freq", 0.0, 100.0, 0.1),
    ParamSpec::new("Vibrato %", "vibrato-%", 0.0, 1.0, 0.01),
    ParamSpec::new("Tremolo Wave", "tremolo-wave", 0.0, 7.0, 1.0),
    ParamSpec::new("Tremolo Freq", "tremolo-freq", 0.0, 100.0, 0.1),
    ParamSpec::new("Tremolo %", "tremolo-%", 0.0, 1.0, 0.01),
    ParamSpec::new("Bit Crush", "bit-crush", 0.0, 1.0, 0.01),
    ParamSpec::new("Noise", "noise", 0.0, 1.0, 0.01),
    ParamSpec::new("Distortion", "distortion", 0.0, 1.0, 0.01),
    ParamSpec::new("Low Pass", "low-pass", 0.0, 1.0, 0.01),
    ParamSpec::new("High Pass", "high-pass", 0.0, 1.0, 0.01),
    ParamSpec::new("Repeat", "repeat", 0.0, 10.0, 0.01),
    ParamSpec::new("Harmonic Mult A", "harmonic-mult-a", 0.0, 16.0, 0.25),
    ParamSpec::new("Harmonic Gain A", "harmonic-gain-a", 0.0, 1.0, 0.01),
    ParamSpec::new("Harmonic Mult B", "harmonic-mult-b", 0.0, 16.0, 0.25),
    ParamSpec::new("Harmonic Gain B", "harmonic-gain-b", 0.0, 1.0, 0.01),
    ParamSpec::new("Harmonic Mult C", "harmonic-mult-c", 0.0, 16.0, 0.25),
    ParamSpec::new("Harmonic Gain C", "harmonic-gain-c", 0.0, 1.0, 0.01),
];

/// Fixed-length instrument definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamVector {
    values: [f64; PARAM_COUNT],
}

impl ParamVector {
    /// All slots zero.
    pub fn zeroed() -> Self {
        Self {
            values: [0.0; PARAM_COUNT],
        }
    }

    /// Build from an arbitrary slice: short input is zero-padded, long input is
    /// truncated and non-finite values become `0`.
    pub fn from_slice(values: &[f64]) -> Self {
        let mut out = Self::zeroed();
        for (slot, &v) in out.values.iter_mut().zip(values) {
            *slot = if v.is_finite() { v } else { 0.0 };
        }
        out
    }

    /// A plain sine voice, the starting point for new tracks.
    pub fn sine() -> Self {
        let mut p = Self::zeroed();
        p.set(Param::Wave, Waveform::Sine.index() as f64);
        p.set(Param::Frequency, 49.0);
        p.set(Param::Attack, 1.0);
        p.set(Param::Decay, 1.0);
        p.set(Param::Sustain, 1.0);
        p.set(Param::Length, 1000.0);
        p.set(Param::Volume, 1.0);
        p
    }

    pub fn get(&self, param: Param) -> f64 {
        self.values[param.index()]
    }

    /// Raw write. Non-finite values are stored as `0`.
    pub fn set(&mut self, param: Param, value: f64) {
        self.values[param.index()] = if value.is_finite() { value } else { 0.0 };
    }

    /// Write through the slot's [`ParamSpec`] range, returning the stored value.
    pub fn set_clamped(&mut self, param: Param, value: f64) -> f64 {
        let clamped = param.spec().clamp(value);
        self.values[param.index()] = clamped;
        clamped
    }

    /// The waveform selected by a waveform slot.
    pub fn waveform(&self, param: Param) -> Waveform {
        Waveform::from_index(self.get(param))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Total sounding time in milliseconds (attack + decay + length + release).
    pub fn total_ms(&self) -> f64 {
        [Param::Attack, Param::Decay, Param::Length, Param::Release]
            .iter()
            .map(|&p| self.get(p).max(0.0))
            .sum()
    }
}

impl Default for ParamVector {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Serialize for ParamVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(PARAM_COUNT))?;
        for param in Param::ALL {
            let name = param.spec().io_name;
            if param.is_waveform() {
                map.serialize_entry(name, self.waveform(param).name())?;
            } else {
                map.serialize_entry(name, &self.get(param))?;
            }
        }
        map.end()
    }
}

/// A parameter value as it may appear in a score file.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
    Other(serde_yaml::Value),
}

impl RawValue {
    fn resolve(self, param: Option<Param>) -> f64 {
        match self {
            RawValue::Number(v) => v,
            RawValue::Text(s) => {
                if let Some(w) = Waveform::from_name(&s) {
                    if param.map_or(true, Param::is_waveform) {
                        return w.index() as f64;
                    }
                }
                s.trim().parse().unwrap_or_else(|_| {
                    log::warn!("non-numeric parameter value {s:?}, using 0");
                    0.0
                })
            }
            RawValue::Other(v) => {
                log::warn!("non-numeric parameter value {v:?}, using 0");
                0.0
            }
        }
    }
}

struct ParamVectorVisitor;

impl<'de> Visitor<'de> for ParamVectorVisitor {
    type Value = ParamVector;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of parameter names to values or a list of numbers")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParamVector, A::Error> {
        let mut out = ParamVector::zeroed();
        while let Some((name, raw)) = access.next_entry::<String, RawValue>()? {
            match Param::from_io_name(&name) {
                Some(param) => out.set(param, raw.resolve(Some(param))),
                None => log::warn!("ignoring unknown parameter {name:?}"),
            }
        }
        Ok(out)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<ParamVector, A::Error> {
        let mut values = Vec::with_capacity(PARAM_COUNT);
        while let Some(raw) = access.next_element::<RawValue>()? {
            let param = Param::ALL.get(values.len()).copied();
            values.push(raw.resolve(param));
        }
        if values.len() != PARAM_COUNT {
            log::warn!(
                "parameter list has {} values, expected {PARAM_COUNT}",
                values.len()
            );
        }
        Ok(ParamVector::from_slice(&values))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ParamVector, E> {
        Ok(ParamVector::zeroed())
    }
}

impl<'de> Deserialize<'de> for ParamVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ParamVectorVisitor)
    }
}

/// Named view of a vector, used by the `info` command.
pub fn describe(params: &ParamVector) -> BTreeMap<&'static str, String> {
    Param::ALL
        .iter()
        .map(|&p| {
            let value = if p.is_waveform() {
                params.waveform(p).name().to_string()
            } else {
                format!("{}", params.get(p))
            };
            (p.spec().name, value)
        })
        .collect()
}
