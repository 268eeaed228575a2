//! Vocalis Core - real-time DSP primitives for vocal synthesis
//!
//! Everything a voice lane needs to turn a pitch and an articulation target
//! into samples, with no allocation after construction.
//!
//! # Sources
//!
//! - [`GlottalSource`] - Rosenberg, LF and differentiated glottal pulses
//! - [`SubharmonicGenerator`] - PLL-locked subharmonic oscillator
//! - [`NoiseSource`] - deterministic LCG noise for unvoiced excitation
//! - [`Lfo`] - sine vibrato and pulse modulation
//!
//! # Filters
//!
//! - [`FormantResonator`] - constant-peak band-pass for one formant
//! - [`Biquad`] - Direct Form I section with the RBJ band-pass formula
//! - [`DcBlocker`] - removes the DC component of unipolar pulse trains
//! - [`CombFilter`], [`AllpassFilter`], [`DelayLine`] - reverb building blocks
//!
//! # Control
//!
//! - [`SmoothedParam`] - one-pole exponential parameter smoothing
//! - [`Effect`] - mono processor trait
//!
//! # no_std Support
//!
//! Disable the default `std` feature to build for embedded targets; delay
//! lines then allocate through `alloc`.
//!
//! ```toml
//! [dependencies]
//! vocalis-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use vocalis_core::{DcBlocker, FormantResonator, GlottalSource};
//!
//! let sr = 48000.0;
//! let mut source = GlottalSource::new(sr);
//! source.set_frequency(130.0);
//!
//! // /a/ as in "father"
//! let mut f1 = FormantResonator::with_parameters(730.0, 80.0, sr);
//! let mut f2 = FormantResonator::with_parameters(1090.0, 100.0, sr);
//! let mut dc = DcBlocker::new(sr);
//!
//! let mut block = [0.0f32; 256];
//! for s in block.iter_mut() {
//!     let excitation = dc.process(source.process());
//!     *s = f1.process(excitation) + 0.7 * f2.process(excitation);
//! }
//! assert!(block.iter().any(|s| s.abs() > 0.0));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod allpass;
pub mod biquad;
pub mod comb;
pub mod dc_blocker;
pub mod delay;
pub mod effect;
pub mod glottal;
pub mod lfo;
pub mod math;
pub mod noise;
pub mod param;
pub mod resonator;
pub mod subharmonic;

pub use allpass::AllpassFilter;
pub use biquad::{Biquad, bandpass_coefficients};
pub use comb::CombFilter;
pub use dc_blocker::DcBlocker;
pub use delay::DelayLine;
pub use effect::Effect;
pub use glottal::{
    GLOTTAL_FREQ_RANGE, GLOTTAL_SAMPLE_RATE_RANGE, GlottalModel, GlottalSource, PulseShape,
};
pub use lfo::Lfo;
pub use math::{
    equal_power_pan, flush_denormal, midi_to_freq, semitones_to_ratio, soft_clip,
    wrap_phase,
};
pub use noise::{DEFAULT_NOISE_SEED, NoiseSource};
pub use param::SmoothedParam;
pub use resonator::FormantResonator;
pub use subharmonic::SubharmonicGenerator;
