//! Control messages from the host thread to the audio thread.
//!
//! Messages are plain `Copy` values pushed into an `rtrb` ring obtained from
//! [`VoiceManager::control_producer`](crate::VoiceManager::control_producer)
//! and drained once at the start of every block.

use vocalis_effects::{ReverbPreset, ReverbSettings};

use crate::articulation::{ArticulationTarget, SubharmonicParams};

/// A control event for the voice manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMessage {
    /// Start a note.
    NoteOn {
        /// MIDI note.
        note: u8,
        /// MIDI velocity.
        velocity: u8,
    },
    /// Release a note.
    NoteOff {
        /// MIDI note.
        note: u8,
        /// Release velocity (unused by the envelopes).
        velocity: u8,
    },
    /// Silence and free every voice.
    AllNotesOff,
    /// Master gain (0-2).
    SetGain(f32),
    /// Attack time in seconds.
    SetAttack(f32),
    /// Decay time in seconds.
    SetDecay(f32),
    /// Sustain level (0-1).
    SetSustain(f32),
    /// CPU load above which new notes steal; `None` disables.
    SetCpuLimit(Option<f32>),
    /// Release time in seconds.
    SetRelease(f32),
    /// Pitch vibrato rate in Hz.
    SetVibratoRate(f32),
    /// Pitch vibrato depth in semitones.
    SetVibratoDepth(f32),
    /// Articulation for one voice slot.
    SetVoiceTarget {
        /// Voice slot id.
        slot: usize,
        /// New target.
        target: ArticulationTarget,
    },
    /// Articulation for every voice slot.
    SetAllTargets(ArticulationTarget),
    /// Stereo position for one voice slot.
    SetVoicePan {
        /// Voice slot id.
        slot: usize,
        /// -1 left to 1 right.
        pan: f32,
    },
    /// Parameters for the subharmonic method when targets carry none.
    SetSubharmonicParams(SubharmonicParams),
    /// All reverb controls at once.
    SetReverb(ReverbSettings),
    /// Reverb preset.
    SetReverbPreset(ReverbPreset),
    /// Reverb bypass.
    SetReverbBypass(bool),
    /// Reverb freeze.
    SetReverbFreeze(bool),
}
