//! Vocalis Synth - polyphonic vocal synthesis engine
//!
//! Note events and per-voice articulation targets in, real-time stereo audio
//! out. Text and phoneme analysis happen elsewhere; this crate consumes
//! resolved frequencies, amplitudes and [`ArticulationTarget`]s.
//!
//! # Core Components
//!
//! ## Articulation
//!
//! - [`ArticulationTarget`] - formants, articulatory flags and timing of one
//!   sound, with built-in vowel and consonant tables
//! - [`SubharmonicParams`] - parameter bundle for throat-singing styles
//! - [`PresetRegistry`] - named [`SubharmonicParams`] bundles
//!
//! ## Synthesis Methods
//!
//! - [`SynthesisMethod`] - the per-voice rendering trait
//! - [`FormantMethod`], [`DiphoneMethod`], [`SubharmonicMethod`] - the three
//!   algorithms
//! - [`Synthesizer`] - closed enum selecting one of them by name
//!
//! ## Voice Management
//!
//! - [`VoiceAllocator`] - fixed slot pool with priority-based stealing
//! - [`VoiceManager`] - envelopes, batching, panning, master gain and reverb
//! - [`ControlMessage`] - lock-free control events for the audio thread
//!
//! ## Configuration
//!
//! - [`EngineConfig`] - TOML engine settings, see [`VoiceManager::from_config`]
//!
//! # Example
//!
//! ```rust
//! use vocalis_synth::{ArticulationTarget, ControlMessage, PresetRegistry, VoiceManager};
//!
//! let registry = PresetRegistry::with_factory_presets();
//!
//! let mut manager = VoiceManager::new(16);
//! manager.set_method("subharmonic").expect("built-in method");
//! manager.set_subharmonic_preset(&registry, "tuva_kargyraa").expect("factory preset");
//! manager.prepare(48000.0, 512).expect("prepare");
//!
//! // From the control thread
//! let mut tx = manager.control_producer(64);
//! tx.push(ControlMessage::SetAllTargets(ArticulationTarget::O_OH)).expect("queue");
//! tx.push(ControlMessage::NoteOn { note: 45, velocity: 100 }).expect("queue");
//!
//! // On the audio thread
//! let mut left = vec![0.0f32; 512];
//! let mut right = vec![0.0f32; 512];
//! manager.process_audio(&mut left, &mut right).expect("render");
//! assert_eq!(manager.active_voice_count(), 1);
//! ```

pub mod allocator;
pub mod articulation;
pub mod config;
pub mod error;
pub mod manager;
pub mod message;
pub mod method;
pub mod preset;

pub use allocator::{
    Allocation, AllocatorStats, DEFAULT_MAX_VOICES, DEFAULT_PRIORITY_JITTER, PRIORITY_UPDATE_INTERVAL,
    VoiceAllocator, VoiceSlot,
};
pub use articulation::{
    ArticulationTarget, ArticulatoryFeatures, Category, FormantData, Manner, NUM_TARGET_FORMANTS,
    SubharmonicParams, TemporalBounds,
};
pub use config::{EngineConfig, ReverbConfig};
pub use error::{ConfigError, SynthesisError};
pub use manager::{EnvelopeStage, MAX_BATCH_VOICES, ManagerStats, VoiceInstance, VoiceManager};
pub use message::ControlMessage;
pub use method::{
    DiphoneMethod, DiphoneTransition, FormantMethod, FormantRouting, MethodStats, RenderInfo,
    SubharmonicMethod, SynthesisMethod, SynthesisParams, SynthesisResult, Synthesizer,
    TransitionKind,
};
pub use preset::{PresetDescriptor, PresetRegistry};

// Re-export the effect types the manager exposes
pub use vocalis_effects::{Reverb, ReverbPreset, ReverbSettings};
