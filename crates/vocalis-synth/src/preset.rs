//! Subharmonic singing presets.
//!
//! The registry is built once, off the audio thread, and then only read.
//! Methods and the voice manager receive it by reference; resolved
//! [`SubharmonicParams`] travel to the audio thread by value.
//!
//! # Example
//!
//! ```rust
//! use vocalis_synth::PresetRegistry;
//!
//! let registry = PresetRegistry::with_factory_presets();
//! for preset in registry.all_presets() {
//!     println!("{}: {}", preset.name, preset.description);
//! }
//!
//! let kargyraa = registry.get("tuva_kargyraa").expect("factory preset");
//! assert_eq!(kargyraa.params.ratio, 3.0);
//! ```

use crate::articulation::SubharmonicParams;
use crate::error::SynthesisError;

/// A named set of subharmonic parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetDescriptor {
    /// Lookup name (snake_case).
    pub name: String,
    /// Short description for display.
    pub description: String,
    /// Parameters applied when the preset is selected.
    pub params: SubharmonicParams,
}

/// Name-keyed collection of [`PresetDescriptor`]s in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: Vec<PresetDescriptor>,
}

impl PresetRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the six factory presets.
    pub fn with_factory_presets() -> Self {
        let mut registry = Self::new();
        for (name, description, params) in factory_presets() {
            registry.insert(name, description, params);
        }
        registry
    }

    /// Add a preset, replacing any existing one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, description: impl Into<String>, params: SubharmonicParams) {
        let name = name.into();
        let descriptor = PresetDescriptor {
            name,
            description: description.into(),
            params,
        };
        match self.presets.iter_mut().find(|p| p.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.presets.push(descriptor),
        }
    }

    /// Look up a preset by name.
    pub fn get(&self, name: &str) -> Option<&PresetDescriptor> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Parameters for `name`, or [`SynthesisError::NotFound`].
    pub fn params(&self, name: &str) -> Result<SubharmonicParams, SynthesisError> {
        self.get(name).map(|p| p.params).ok_or_else(|| {
            tracing::warn!(preset = name, "unknown subharmonic preset");
            SynthesisError::unknown_preset(name)
        })
    }

    /// All presets in insertion order.
    pub fn all_presets(&self) -> &[PresetDescriptor] {
        &self.presets
    }

    /// Preset names in insertion order.
    pub fn list_presets(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }

    /// Number of presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// True when no presets are registered.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn factory_presets() -> [(&'static str, &'static str, SubharmonicParams); 6] {
    let base = SubharmonicParams::default();
    [
        (
            "tibetan_sygyt",
            "Whistling overtone over an octave-down drone",
            SubharmonicParams {
                fundamental_hz: 110.0,
                ratio: 2.0,
                amplitude: 0.4,
                formant_hz: 1800.0,
                formant_bandwidth_hz: 80.0,
                formant_amplitude: 0.85,
                sharp_resonance: true,
                ..base
            },
        ),
        (
            "tuva_kargyraa",
            "Rough ventricular growl a twelfth below",
            SubharmonicParams {
                fundamental_hz: 110.0,
                ratio: 3.0,
                amplitude: 0.7,
                formant_hz: 600.0,
                formant_bandwidth_hz: 150.0,
                formant_amplitude: 0.5,
                ventricular_folds: true,
                chest_voice: true,
                ..base
            },
        ),
        (
            "inuit_katajjaq",
            "Pulsed throat game with a sweeping resonance",
            SubharmonicParams {
                fundamental_hz: 147.0,
                ratio: 2.0,
                amplitude: 0.5,
                formant_hz: 1200.0,
                formant_bandwidth_hz: 120.0,
                formant_amplitude: 0.6,
                pulse_rate_hz: 6.0,
                pulse_depth: 0.5,
                formant_modulation: true,
                ..base
            },
        ),
        (
            "sardinian_cantu_a_tenore",
            "Bassu voice of the tenore quartet",
            SubharmonicParams {
                fundamental_hz: 98.0,
                ratio: 2.0,
                amplitude: 0.3,
                formant_hz: 1000.0,
                formant_bandwidth_hz: 100.0,
                formant_amplitude: 0.7,
                ..base
            },
        ),
        (
            "subhuman_deep",
            "Two octaves down with heavy roughness",
            SubharmonicParams {
                fundamental_hz: 82.0,
                ratio: 4.0,
                amplitude: 0.8,
                formant_hz: 400.0,
                formant_bandwidth_hz: 200.0,
                formant_amplitude: 0.4,
                ventricular_folds: true,
                chest_voice: true,
                ..base
            },
        ),
        (
            "basso_profondo",
            "Low chest voice with an octave subharmonic",
            SubharmonicParams {
                fundamental_hz: 65.0,
                ratio: 2.0,
                amplitude: 0.6,
                formant_hz: 500.0,
                formant_bandwidth_hz: 150.0,
                formant_amplitude: 0.5,
                chest_voice: true,
                ..base
            },
        ),
    ]
}
