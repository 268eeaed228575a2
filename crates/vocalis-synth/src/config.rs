//! Engine configuration loaded from TOML.
//!
//! Every field has a default, so a file only needs the values it changes:
//!
//! ```toml
//! max_voices = 32
//! method = "subharmonic"
//! subharmonic_preset = "tuva_kargyraa"
//! sustain = 0.7
//! cpu_limit = 0.8
//!
//! [reverb]
//! preset = "cathedral"
//! wet = 0.3
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use vocalis_effects::{MAX_FFT_SIZE, MIN_FFT_SIZE, ReverbPreset, ReverbSettings};

use crate::allocator::{DEFAULT_MAX_VOICES, DEFAULT_PRIORITY_JITTER};
use crate::error::ConfigError;
use crate::method::Synthesizer;

/// Largest block size accepted.
pub const MAX_BLOCK_SIZE_LIMIT: usize = 8192;

/// Largest voice pool accepted.
pub const MAX_VOICES_LIMIT: usize = 256;

/// Reverb section of [`EngineConfig`].
///
/// The preset (if any) is applied first; explicit fields override it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// Preset name, e.g. `"large_hall"`.
    pub preset: Option<String>,
    /// Room size override (0-1).
    pub room_size: Option<f32>,
    /// Damping override (0-1).
    pub damping: Option<f32>,
    /// Wet level override (0-1).
    pub wet: Option<f32>,
    /// Dry level override (0-1).
    pub dry: Option<f32>,
    /// Stereo width override (0-1).
    pub width: Option<f32>,
    /// Start bypassed.
    pub bypass: bool,
}

impl ReverbConfig {
    /// Resolve preset and overrides into settings.
    ///
    /// ## Errors
    /// [`ConfigError::Invalid`] for an unknown preset or an override outside
    /// 0-1.
    pub fn settings(&self) -> Result<ReverbSettings, ConfigError> {
        let mut settings = match self.preset.as_deref() {
            Some(name) => ReverbPreset::from_name(name)
                .ok_or_else(|| ConfigError::invalid("reverb.preset", format!("unknown preset '{name}'")))?
                .settings(),
            None => ReverbSettings::default(),
        };

        let overrides = [
            ("reverb.room_size", self.room_size, &mut settings.room_size),
            ("reverb.damping", self.damping, &mut settings.damping),
            ("reverb.wet", self.wet, &mut settings.wet),
            ("reverb.dry", self.dry, &mut settings.dry),
            ("reverb.width", self.width, &mut settings.width),
        ];
        for (field, value, slot) in overrides {
            if let Some(v) = value {
                check_range(field, v, 0.0, 1.0)?;
                *slot = v;
            }
        }
        Ok(settings)
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Longest block `process_audio` accepts.
    pub max_block_size: usize,
    /// Voice pool size.
    pub max_voices: usize,
    /// Synthesis method name.
    pub method: String,
    /// Subharmonic preset applied at startup.
    pub subharmonic_preset: Option<String>,
    /// Master gain (0-2).
    pub gain: f32,
    /// Attack time in seconds.
    pub attack: f32,
    /// Decay time constant from full level to the sustain level, seconds.
    pub decay: f32,
    /// Level held after the decay (0-1).
    pub sustain: f32,
    /// Release time in seconds.
    pub release: f32,
    /// Pitch vibrato rate in Hz.
    pub vibrato_rate: f32,
    /// Pitch vibrato depth in semitones.
    pub vibrato_depth: f32,
    /// FFT size of the spectral enhancer.
    pub spectral_fft_size: usize,
    /// Upper bound of the allocator's random priority term.
    pub priority_jitter: f32,
    /// Seed for the allocator's random priority term.
    pub seed: u64,
    /// Block CPU load (1.0 is real time) above which new notes steal a
    /// voice even when free slots remain. Unset disables the limit.
    pub cpu_limit: Option<f32>,
    /// Reverb section.
    pub reverb: ReverbConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_block_size: 512,
            max_voices: DEFAULT_MAX_VOICES,
            method: "formant".to_string(),
            subharmonic_preset: None,
            gain: 1.0,
            attack: 0.01,
            decay: 0.2,
            sustain: 1.0,
            release: 0.3,
            vibrato_rate: 5.5,
            vibrato_depth: 0.0,
            spectral_fft_size: 1024,
            priority_jitter: DEFAULT_PRIORITY_JITTER,
            seed: 0x766f_6361_6c69_73,
            cpu_limit: None,
            reverb: ReverbConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML string. Does not validate.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("sample_rate", self.sample_rate, 8000.0, 192_000.0)?;
        if self.max_block_size == 0 || self.max_block_size > MAX_BLOCK_SIZE_LIMIT {
            return Err(ConfigError::invalid(
                "max_block_size",
                format!("must be 1-{MAX_BLOCK_SIZE_LIMIT}, got {}", self.max_block_size),
            ));
        }
        if self.max_voices == 0 || self.max_voices > MAX_VOICES_LIMIT {
            return Err(ConfigError::invalid(
                "max_voices",
                format!("must be 1-{MAX_VOICES_LIMIT}, got {}", self.max_voices),
            ));
        }
        if !Synthesizer::NAMES.contains(&self.method.as_str()) {
            return Err(ConfigError::invalid(
                "method",
                format!("unknown method '{}', expected one of {:?}", self.method, Synthesizer::NAMES),
            ));
        }
        check_range("gain", self.gain, 0.0, 2.0)?;
        check_range("attack", self.attack, 0.001, 1.0)?;
        check_range("decay", self.decay, 0.001, 5.0)?;
        check_range("sustain", self.sustain, 0.0, 1.0)?;
        check_range("release", self.release, 0.001, 2.0)?;
        if let Some(limit) = self.cpu_limit {
            check_range("cpu_limit", limit, 0.05, 1.0)?;
        }
        check_range("vibrato_rate", self.vibrato_rate, 0.0, 20.0)?;
        check_range("vibrato_depth", self.vibrato_depth, 0.0, 1.0)?;
        check_range("priority_jitter", self.priority_jitter, 0.0, 100.0)?;

        let fft = self.spectral_fft_size;
        if !fft.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft) {
            return Err(ConfigError::invalid(
                "spectral_fft_size",
                format!("must be a power of two in {MIN_FFT_SIZE}-{MAX_FFT_SIZE}, got {fft}"),
            ));
        }

        self.reverb.settings()?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be {min}-{max}, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_voices, 60);
        assert_eq!(config.method, "formant");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            max_voices = 16
            method = "diphone"

            [reverb]
            preset = "plate"
            wet = 0.1
            "#,
        )
        .expect("parse");

        assert_eq!(config.max_voices, 16);
        assert_eq!(config.method, "diphone");
        assert_eq!(config.max_block_size, 512, "unset fields keep defaults");

        let settings = config.reverb.settings().expect("reverb");
        assert_eq!(settings.wet, 0.1);
        assert_eq!(settings.room_size, ReverbPreset::Plate.settings().room_size);
    }

    #[test]
    fn round_trip() {
        let config = EngineConfig {
            method: "subharmonic".into(),
            subharmonic_preset: Some("inuit_katajjaq".into()),
            gain: 0.8,
            sustain: 0.6,
            cpu_limit: Some(0.75),
            ..EngineConfig::default()
        };
        let text = config.to_toml_string().expect("serialize");
        assert_eq!(EngineConfig::from_toml_str(&text).expect("parse"), config);
    }

    #[test]
    fn validation_names_the_field() {
        let config = EngineConfig {
            method: "granular".into(),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "method", .. })));

        let config = EngineConfig {
            release: 5.0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "release", .. })));

        let config = EngineConfig {
            spectral_fft_size: 1000,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "spectral_fft_size", .. })
        ));

        let config = EngineConfig {
            sustain: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "sustain", .. })));

        let config = EngineConfig {
            cpu_limit: Some(0.0),
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "cpu_limit", .. })));

        let mut config = EngineConfig::default();
        config.reverb.preset = Some("bathroom".into());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "reverb.preset", .. })));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml_str("max_voices = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "gain = 0.5\nmax_block_size = 256\n").expect("write");

        let config = EngineConfig::load(&path).expect("load");
        assert_eq!(config.gain, 0.5);
        assert_eq!(config.max_block_size, 256);

        let missing = EngineConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::ReadFile { .. }));
    }
}
