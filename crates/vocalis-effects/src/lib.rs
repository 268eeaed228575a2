//! Vocalis Effects - post-processing for the voice mix
//!
//! - [`Reverb`] - stereo Freeverb with smoothed controls, presets, freeze and bypass
//! - [`SpectralEnhancer`] - STFT spectral contrast enhancer with a high-frequency tilt
//!
//! ## Example
//!
//! ```rust
//! use vocalis_core::Effect;
//! use vocalis_effects::{Reverb, ReverbPreset, SpectralEnhancer};
//!
//! let mut enhancer = SpectralEnhancer::new(1024);
//! let mut reverb = Reverb::new(48000.0);
//! reverb.set_preset(ReverbPreset::Plate);
//!
//! let voice = [0.2f32; 512];
//! let mut left = [0.0f32; 512];
//! enhancer.process_block(&voice, &mut left);
//! let mut right = left;
//! reverb.process_block_stereo(&mut left, &mut right);
//! ```

pub mod reverb;
pub mod spectral;

pub use reverb::{Reverb, ReverbPreset, ReverbSettings, STEREO_SPREAD_44K};
pub use spectral::{
    DEFAULT_FFT_SIZE, FftPlans, MAX_FFT_SIZE, MIN_FFT_SIZE, SpectralEnhancer, normalize_fft_size,
};
