//! Articulation targets: what a voice should sound like right now.
//!
//! An [`ArticulationTarget`] is a small `Copy` value describing the vocal
//! tract configuration (formants and bandwidths), the phonetic category,
//! consonant manner, articulatory flags, timing bounds and optional
//! subharmonic parameters. Hosts resolve phonemes to targets off the audio
//! thread and hand them to the engine by value.
//!
//! Built-in tables hold Peterson & Barney adult male vowel formants and a
//! small consonant set.
//!
//! ```rust
//! use vocalis_synth::{ArticulationTarget, Category};
//!
//! let ah = ArticulationTarget::vowel(4);
//! assert_eq!(ah.category, Category::Vowel);
//! assert_eq!(ah.formants.frequencies[0], 730.0);
//! ```

use serde::{Deserialize, Serialize};

/// Number of tract formants carried by a target.
pub const NUM_TARGET_FORMANTS: usize = 4;

/// Phonetic category of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Voiced vowel.
    #[default]
    Vowel,
    /// Consonant; see [`Manner`].
    Consonant,
    /// Sustained drone.
    Drone,
    /// Raw formant configuration.
    Formant,
    /// Subharmonic (throat) singing.
    Subharmonic,
    /// Amplitude-pulsed voicing.
    Pulsed,
}

/// Consonant manner of articulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Manner {
    /// Not a consonant.
    #[default]
    None,
    /// Stop with a release burst (p, t, k).
    Plosive,
    /// Turbulent noise (s, sh, f).
    Fricative,
    /// Nasal murmur (m, n).
    Nasal,
    /// Glide or liquid.
    Approximant,
}

/// Formant frequencies and bandwidths, F1-F4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormantData {
    /// Center frequencies in Hz.
    pub frequencies: [f32; NUM_TARGET_FORMANTS],
    /// Bandwidths in Hz.
    pub bandwidths: [f32; NUM_TARGET_FORMANTS],
}

impl FormantData {
    /// Formants from explicit frequency and bandwidth arrays.
    pub const fn new(frequencies: [f32; NUM_TARGET_FORMANTS], bandwidths: [f32; NUM_TARGET_FORMANTS]) -> Self {
        Self { frequencies, bandwidths }
    }
}

impl Default for FormantData {
    fn default() -> Self {
        Self::new([500.0, 1500.0, 2500.0, 3500.0], [50.0, 80.0, 120.0, 150.0])
    }
}

/// Articulatory flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ArticulatoryFeatures {
    /// Velum lowered.
    pub nasal: bool,
    /// Lips rounded.
    pub rounded: bool,
    /// Vocal folds vibrating.
    pub voiced: bool,
    /// Lateral airflow.
    pub lateral: bool,
    /// R-coloured.
    pub rhotic: bool,
}

impl Default for ArticulatoryFeatures {
    fn default() -> Self {
        Self {
            nasal: false,
            rounded: false,
            voiced: true,
            lateral: false,
            rhotic: false,
        }
    }
}

/// Duration bounds for a phoneme in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalBounds {
    /// Shortest duration.
    pub min_ms: f32,
    /// Typical duration.
    pub default_ms: f32,
    /// Longest duration.
    pub max_ms: f32,
}

impl Default for TemporalBounds {
    fn default() -> Self {
        Self {
            min_ms: 50.0,
            default_ms: 200.0,
            max_ms: 500.0,
        }
    }
}

/// Parameters for subharmonic (throat) singing.
///
/// `ratio` is a division ratio: the subharmonic sits at
/// `fundamental / ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SubharmonicParams {
    /// Nominal fundamental in Hz.
    pub fundamental_hz: f32,
    /// Division ratio.
    pub ratio: f32,
    /// Subharmonic level (0-1).
    pub amplitude: f32,
    /// Center of the resonance applied to the subharmonic, Hz.
    pub formant_hz: f32,
    /// Bandwidth of that resonance, Hz.
    pub formant_bandwidth_hz: f32,
    /// Level of the filtered subharmonic (0-1).
    pub formant_amplitude: f32,
    /// Amplitude pulse rate in Hz (0 disables).
    pub pulse_rate_hz: f32,
    /// Amplitude pulse depth (0-1).
    pub pulse_depth: f32,
    /// Ventricular fold roughness.
    pub ventricular_folds: bool,
    /// Chest resonance boost on the fundamental.
    pub chest_voice: bool,
    /// Sweep the resonance with the pulse LFO.
    pub formant_modulation: bool,
    /// Narrow the resonance to half its bandwidth.
    pub sharp_resonance: bool,
}

impl Default for SubharmonicParams {
    fn default() -> Self {
        Self {
            fundamental_hz: 110.0,
            ratio: 2.0,
            amplitude: 0.5,
            formant_hz: 1000.0,
            formant_bandwidth_hz: 100.0,
            formant_amplitude: 0.5,
            pulse_rate_hz: 0.0,
            pulse_depth: 0.0,
            ventricular_folds: false,
            chest_voice: false,
            formant_modulation: false,
            sharp_resonance: false,
        }
    }
}

/// A complete articulation target.
///
/// Immutable by convention: build a new one rather than mutating a target
/// that a voice is already using.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticulationTarget {
    /// Phonetic category.
    pub category: Category,
    /// Consonant manner; [`Manner::None`] for non-consonants.
    pub manner: Manner,
    /// Tract formants.
    pub formants: FormantData,
    /// Articulatory flags.
    pub features: ArticulatoryFeatures,
    /// Duration bounds.
    pub timing: TemporalBounds,
    /// Throat-singing parameters, overriding any engine preset.
    pub subharmonic: Option<SubharmonicParams>,
}

const fn vowel_target(f: [f32; 4], b: [f32; 4], rounded: bool) -> ArticulationTarget {
    ArticulationTarget {
        category: Category::Vowel,
        manner: Manner::None,
        formants: FormantData::new(f, b),
        features: ArticulatoryFeatures {
            nasal: false,
            rounded,
            voiced: true,
            lateral: false,
            rhotic: false,
        },
        timing: TemporalBounds {
            min_ms: 50.0,
            default_ms: 200.0,
            max_ms: 500.0,
        },
        subharmonic: None,
    }
}

const fn consonant_target(manner: Manner, f: [f32; 4], b: [f32; 4], voiced: bool, nasal: bool) -> ArticulationTarget {
    ArticulationTarget {
        category: Category::Consonant,
        manner,
        formants: FormantData::new(f, b),
        features: ArticulatoryFeatures {
            nasal,
            rounded: false,
            voiced,
            lateral: false,
            rhotic: false,
        },
        timing: TemporalBounds {
            min_ms: 20.0,
            default_ms: 80.0,
            max_ms: 200.0,
        },
        subharmonic: None,
    }
}

const NARROW: [f32; 4] = [50.0, 80.0, 120.0, 130.0];
const WIDE: [f32; 4] = [60.0, 90.0, 120.0, 130.0];
const NOISE_BW: [f32; 4] = [1000.0; 4];
const NASAL_BW: [f32; 4] = [50.0, 100.0, 120.0, 130.0];

impl ArticulationTarget {
    /// "ee" as in beet.
    pub const I_EE: Self = vowel_target([270.0, 2300.0, 3000.0, 3500.0], WIDE, false);
    /// "ih" as in bit.
    pub const I_IH: Self = vowel_target([390.0, 2000.0, 2800.0, 3500.0], NARROW, false);
    /// "eh" as in bet.
    pub const E_EH: Self = vowel_target([530.0, 1800.0, 2500.0, 3500.0], NARROW, false);
    /// "ae" as in bat.
    pub const E_AE: Self = vowel_target([660.0, 1700.0, 2600.0, 3500.0], WIDE, false);
    /// "ah" as in father.
    pub const A_AH: Self = vowel_target([730.0, 1090.0, 2440.0, 3500.0], [80.0, 100.0, 120.0, 130.0], false);
    /// "aw" as in bought (open).
    pub const A_AW: Self = vowel_target([570.0, 1200.0, 2500.0, 3500.0], [70.0, 100.0, 120.0, 130.0], true);
    /// "oh" as in boat.
    pub const O_OH: Self = vowel_target([570.0, 840.0, 2500.0, 3500.0], NARROW, true);
    /// "aw" as in caught (rounded).
    pub const O_AW: Self = vowel_target([440.0, 1020.0, 2500.0, 3500.0], NARROW, true);
    /// "oo" as in boot.
    pub const U_OO: Self = vowel_target([300.0, 870.0, 2250.0, 3500.0], NARROW, true);
    /// "uh" as in book.
    pub const U_UH: Self = vowel_target([440.0, 1020.0, 2500.0, 3500.0], NARROW, true);
    /// Neutral vowel.
    pub const SCHWA: Self = vowel_target([500.0, 1500.0, 2500.0, 3500.0], WIDE, false);

    /// Fricative "s".
    pub const S: Self = consonant_target(Manner::Fricative, [5000.0, 6000.0, 7000.0, 8000.0], NOISE_BW, false, false);
    /// Fricative "sh".
    pub const SH: Self = consonant_target(Manner::Fricative, [3000.0, 4000.0, 5000.0, 6000.0], NOISE_BW, false, false);
    /// Fricative "f".
    pub const F: Self = consonant_target(Manner::Fricative, [4000.0, 5000.0, 6000.0, 7000.0], NOISE_BW, false, false);
    /// Nasal "m".
    pub const M: Self = consonant_target(Manner::Nasal, [300.0, 1200.0, 2500.0, 3500.0], NASAL_BW, true, true);
    /// Nasal "n".
    pub const N: Self = consonant_target(Manner::Nasal, [350.0, 1400.0, 2500.0, 3500.0], NASAL_BW, true, true);
    /// Plosive "p".
    pub const P: Self = consonant_target(Manner::Plosive, [300.0, 1200.0, 2500.0, 3500.0], NARROW, false, false);
    /// Plosive "t".
    pub const T: Self = consonant_target(Manner::Plosive, [400.0, 1500.0, 2500.0, 3500.0], NARROW, false, false);
    /// Plosive "k".
    pub const K: Self = consonant_target(Manner::Plosive, [500.0, 1800.0, 2500.0, 3500.0], NARROW, false, false);

    /// Built-in vowels in index order.
    pub const VOWELS: [Self; 11] = [
        Self::I_EE,
        Self::I_IH,
        Self::E_EH,
        Self::E_AE,
        Self::A_AH,
        Self::A_AW,
        Self::O_OH,
        Self::O_AW,
        Self::U_OO,
        Self::U_UH,
        Self::SCHWA,
    ];

    /// Vowel by table index (0-10). Out-of-range indices give schwa.
    pub fn vowel(index: usize) -> Self {
        Self::VOWELS.get(index).copied().unwrap_or(Self::SCHWA)
    }

    /// A subharmonic-singing target on a schwa tract.
    pub fn subharmonic(params: SubharmonicParams) -> Self {
        Self {
            category: Category::Subharmonic,
            subharmonic: Some(params),
            ..Self::SCHWA
        }
    }

    /// Same target with different formants.
    #[must_use]
    pub fn with_formants(mut self, formants: FormantData) -> Self {
        self.formants = formants;
        self
    }

    /// True for vowel-like sounds (vowels, drones, approximants, nasals).
    ///
    /// Used to classify diphone transitions.
    pub fn is_vowel_like(&self) -> bool {
        match self.category {
            Category::Consonant => matches!(self.manner, Manner::Approximant | Manner::Nasal),
            _ => true,
        }
    }

    /// True when the target is voiced.
    pub fn is_voiced(&self) -> bool {
        self.features.voiced
    }
}
