//! Polyphonic voice orchestration.
//!
//! [`VoiceManager`] owns the [`VoiceAllocator`], one [`VoiceInstance`] per
//! slot, the active [`Synthesizer`] and the output [`Reverb`]. Each call to
//! [`process_audio`](VoiceManager::process_audio) renders one block:
//!
//! 1. drain the control queue
//! 2. advance the parameter smoothers by the block length
//! 3. advance allocator time (priorities refresh every 100 ms)
//! 4. render active voices in batches of [`MAX_BATCH_VOICES`]
//! 5. apply envelope gain, ramped across the block, and equal-power pan
//! 6. apply master gain and the reverb
//!
//! Envelopes run attack, decay to the sustain level, sustain, release.
//! Voices whose release falls below -60 dB are returned to the allocator at
//! the end of the block.
//!
//! With a CPU limit set, a note started while the last block's load is over
//! the limit steals the lowest-priority voice instead of taking a free
//! slot, so polyphony shrinks until the load drops.
//!
//! # Example
//!
//! ```rust
//! use vocalis_synth::{ArticulationTarget, VoiceManager};
//!
//! let mut manager = VoiceManager::new(8);
//! manager.prepare(48000.0, 256).expect("prepare");
//! manager.set_all_targets(ArticulationTarget::A_AH);
//!
//! let slot = manager.note_on(57, 100).expect("note");
//! manager.set_voice_pan(slot, -0.5);
//!
//! let mut left = vec![0.0f32; 256];
//! let mut right = vec![0.0f32; 256];
//! manager.process_audio(&mut left, &mut right).expect("render");
//! manager.note_off(57, 0);
//! ```

use std::time::Instant;

use rtrb::{Consumer, Producer, RingBuffer};
use vocalis_core::{Lfo, SmoothedParam, equal_power_pan, semitones_to_ratio};
use vocalis_effects::Reverb;

use crate::allocator::VoiceAllocator;
use crate::articulation::{ArticulationTarget, SubharmonicParams};
use crate::config::EngineConfig;
use crate::error::{ConfigError, SynthesisError};
use crate::message::ControlMessage;
use crate::method::{SynthesisMethod, SynthesisParams, Synthesizer};
use crate::preset::PresetRegistry;

/// Voices rendered per batch.
pub const MAX_BATCH_VOICES: usize = 8;

/// Ramp time of the gain, envelope-time and vibrato smoothers.
pub const PARAM_SMOOTHING_MS: f32 = 50.0;

const ATTACK_COMPLETE: f32 = 0.999;
const DECAY_COMPLETE: f32 = 0.001;
const RELEASE_FLOOR: f32 = 0.001;
const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

/// Envelope stage of a voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Slot unused.
    #[default]
    Idle,
    /// Rising toward full level.
    Attack,
    /// Falling from full level toward the sustain level.
    Decay,
    /// Holding at the sustain level.
    Sustain,
    /// Decaying after note-off.
    Release,
}

/// Per-slot playback state layered on a [`VoiceSlot`](crate::VoiceSlot).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VoiceInstance {
    stage: EnvelopeStage,
    level: f32,
    target: ArticulationTarget,
    cpu_usage: f32,
}

impl VoiceInstance {
    /// Envelope stage.
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Envelope level at the end of the last block.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// True after note-off.
    pub fn is_releasing(&self) -> bool {
        self.stage == EnvelopeStage::Release
    }

    /// Articulation the voice is rendering.
    pub fn target(&self) -> &ArticulationTarget {
        &self.target
    }

    /// CPU usage of the voice's last render.
    pub fn cpu_usage(&self) -> f32 {
        self.cpu_usage
    }

    fn start(&mut self, target: ArticulationTarget) {
        *self = Self {
            stage: EnvelopeStage::Attack,
            target,
            ..Self::default()
        };
    }

    fn clear(&mut self) {
        *self = Self {
            target: self.target,
            ..Self::default()
        };
    }

    /// Step the envelope by one block and return the new level.
    fn advance_envelope(&mut self, controls: &BlockControls) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => self.level = 0.0,
            EnvelopeStage::Attack => {
                self.level += (1.0 - self.level) * controls.attack_coeff;
                if self.level > ATTACK_COMPLETE {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.level += (controls.sustain - self.level) * controls.decay_coeff;
                if (self.level - controls.sustain).abs() < DECAY_COMPLETE {
                    self.level = controls.sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => self.level = controls.sustain,
            EnvelopeStage::Release => self.level *= controls.release_coeff,
        }
        self.level
    }
}

/// Block-rate values shared by every voice in a block.
#[derive(Debug, Clone, Copy)]
struct BlockControls {
    num_samples: usize,
    pitch_ratio: f32,
    attack_coeff: f32,
    decay_coeff: f32,
    sustain: f32,
    release_coeff: f32,
}

/// Manager counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManagerStats {
    /// Voice pool size.
    pub total_voices: usize,
    /// Voices currently allocated.
    pub active_voices: usize,
    /// Allocations that stole a sounding voice.
    pub stolen_voices: u64,
    /// Steals forced by the CPU limit rather than a full pool.
    pub cpu_steals: u64,
    /// Highest block CPU load seen (1.0 is real time).
    pub peak_cpu: f32,
    /// CPU load of the last block.
    pub last_cpu: f32,
    /// Voice renders the method rejected; those voices were silent for the block.
    pub skipped_renders: u64,
    /// Blocks rendered.
    pub blocks_processed: u64,
}

/// Polyphonic vocal engine: allocator, voice state, synthesis method and
/// reverb.
///
/// Construct and [`prepare`](Self::prepare) off the audio thread. After that,
/// `process_audio`, the note calls and the setters do not allocate.
#[derive(Debug)]
pub struct VoiceManager {
    allocator: VoiceAllocator,
    voices: Vec<VoiceInstance>,
    method: Synthesizer,
    reverb: Reverb,

    sample_rate: f32,
    max_block_size: usize,
    prepared: bool,

    gain: SmoothedParam,
    attack: SmoothedParam,
    decay: SmoothedParam,
    sustain: SmoothedParam,
    release: SmoothedParam,
    vibrato_rate: SmoothedParam,
    vibrato_depth: SmoothedParam,
    vibrato: Lfo,

    default_target: ArticulationTarget,
    subharmonic_params: SubharmonicParams,
    fft_size: usize,

    batch: Vec<f32>,
    batch_slots: [usize; MAX_BATCH_VOICES],
    control: Option<Consumer<ControlMessage>>,

    cpu_limit: Option<f32>,
    peak_cpu: f32,
    last_cpu: f32,
    cpu_steals: u64,
    skipped_renders: u64,
    blocks_processed: u64,
}

impl VoiceManager {
    /// Manager with `max_voices` slots and the formant method. Call
    /// [`prepare`](Self::prepare) before rendering.
    pub fn new(max_voices: usize) -> Self {
        Self::with_allocator(VoiceAllocator::new(max_voices))
    }

    /// Like [`new`](Self::new) with a fixed seed for the allocator's random
    /// priority term.
    pub fn with_seed(max_voices: usize, seed: u64) -> Self {
        Self::with_allocator(VoiceAllocator::with_seed(max_voices, seed))
    }

    fn with_allocator(allocator: VoiceAllocator) -> Self {
        let defaults = EngineConfig::default();
        let smoothed = |v| SmoothedParam::with_config(v, DEFAULT_SAMPLE_RATE, PARAM_SMOOTHING_MS);
        Self {
            voices: vec![VoiceInstance::default(); allocator.max_voices()],
            allocator,
            method: Synthesizer::default(),
            reverb: Reverb::new(DEFAULT_SAMPLE_RATE),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: 0,
            prepared: false,
            gain: smoothed(defaults.gain),
            attack: smoothed(defaults.attack),
            decay: smoothed(defaults.decay),
            sustain: smoothed(defaults.sustain),
            release: smoothed(defaults.release),
            vibrato_rate: smoothed(defaults.vibrato_rate),
            vibrato_depth: smoothed(defaults.vibrato_depth),
            vibrato: Lfo::new(DEFAULT_SAMPLE_RATE, defaults.vibrato_rate),
            default_target: ArticulationTarget::default(),
            subharmonic_params: SubharmonicParams::default(),
            fft_size: defaults.spectral_fft_size,
            batch: Vec::new(),
            batch_slots: [0; MAX_BATCH_VOICES],
            control: None,
            cpu_limit: defaults.cpu_limit,
            peak_cpu: 0.0,
            last_cpu: 0.0,
            cpu_steals: 0,
            skipped_renders: 0,
            blocks_processed: 0,
        }
    }

    /// Build and prepare a manager from a validated configuration.
    ///
    /// ## Errors
    /// [`ConfigError::Invalid`] when the configuration fails validation or
    /// names an unknown subharmonic preset.
    pub fn from_config(config: &EngineConfig, registry: &PresetRegistry) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut manager = Self::with_seed(config.max_voices, config.seed);
        manager.allocator.set_priority_jitter(config.priority_jitter);
        manager.fft_size = config.spectral_fft_size;

        if let Some(name) = config.subharmonic_preset.as_deref() {
            manager.subharmonic_params = registry
                .params(name)
                .map_err(|e| ConfigError::invalid("subharmonic_preset", e.to_string()))?;
        }
        manager
            .set_method(&config.method)
            .map_err(|e| ConfigError::invalid("method", e.to_string()))?;

        manager.gain.set_immediate(config.gain);
        manager.attack.set_immediate(config.attack);
        manager.decay.set_immediate(config.decay);
        manager.sustain.set_immediate(config.sustain);
        manager.release.set_immediate(config.release);
        manager.cpu_limit = config.cpu_limit;
        manager.vibrato_rate.set_immediate(config.vibrato_rate);
        manager.vibrato_depth.set_immediate(config.vibrato_depth);

        manager.reverb.apply_settings(config.reverb.settings()?);
        manager.reverb.set_bypass(config.reverb.bypass);

        manager
            .prepare(config.sample_rate, config.max_block_size)
            .map_err(|e| ConfigError::invalid("sample_rate", e.to_string()))?;
        Ok(manager)
    }

    /// Size every buffer for `max_block_size` and prepare the method.
    ///
    /// Calling it again discards voice state and resizes.
    ///
    /// ## Errors
    /// [`SynthesisError::InvalidInput`] for a sample rate outside 8-192 kHz
    /// or a zero block size. The manager is left unprepared.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> Result<(), SynthesisError> {
        self.prepared = false;
        let params = self.synthesis_params(sample_rate, max_block_size);
        params.validate()?;
        self.method.prepare(&params)?;

        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.batch = vec![0.0; MAX_BATCH_VOICES * max_block_size];

        for param in [
            &mut self.gain,
            &mut self.attack,
            &mut self.decay,
            &mut self.sustain,
            &mut self.release,
            &mut self.vibrato_rate,
            &mut self.vibrato_depth,
        ] {
            param.set_sample_rate(sample_rate);
        }
        self.vibrato.set_sample_rate(sample_rate);
        self.vibrato.reset();

        let settings = self.reverb.settings();
        let bypass = self.reverb.is_bypassed();
        let freeze = self.reverb.is_frozen();
        self.reverb = Reverb::new(sample_rate);
        self.reverb.apply_settings(settings);
        self.reverb.set_bypass(bypass);
        self.reverb.set_freeze(freeze);

        self.allocator.reset_all();
        for voice in &mut self.voices {
            voice.clear();
        }
        self.prepared = true;

        tracing::info!(
            sample_rate,
            max_block_size,
            max_voices = self.allocator.max_voices(),
            method = self.method.name(),
            "voice manager prepared"
        );
        Ok(())
    }

    /// Render one block into `left` and `right`, replacing their contents.
    ///
    /// ## Errors
    /// - [`SynthesisError::InvalidInput`] when the channels differ in length
    ///   or the manager is unprepared
    /// - [`SynthesisError::CapacityExceeded`] when the block is longer than
    ///   the prepared maximum
    ///
    /// Both channels are zeroed on error.
    pub fn process_audio(&mut self, left: &mut [f32], right: &mut [f32]) -> Result<(), SynthesisError> {
        left.fill(0.0);
        right.fill(0.0);

        let num_samples = left.len();
        if right.len() != num_samples {
            return Err(SynthesisError::InvalidInput("channel buffers differ in length"));
        }
        if !self.prepared {
            return Err(SynthesisError::InvalidInput("voice manager not prepared"));
        }
        if num_samples > self.max_block_size {
            return Err(SynthesisError::CapacityExceeded {
                requested: num_samples,
                capacity: self.max_block_size,
            });
        }
        if num_samples == 0 {
            return Ok(());
        }

        let started = Instant::now();
        self.drain_control();

        let gain_start = self.gain.get();
        let gain_end = self.gain.advance_by(num_samples);
        let attack = self.attack.advance_by(num_samples);
        let decay = self.decay.advance_by(num_samples);
        let sustain = self.sustain.advance_by(num_samples);
        let release = self.release.advance_by(num_samples);
        self.vibrato.set_frequency(self.vibrato_rate.advance_by(num_samples));
        let depth = self.vibrato_depth.advance_by(num_samples);
        let lfo = self.vibrato.advance(num_samples);

        let dt = num_samples as f32 / self.sample_rate;
        self.allocator.advance_time(dt);
        self.method.begin_block(num_samples);

        let controls = BlockControls {
            num_samples,
            pitch_ratio: semitones_to_ratio(depth * lfo),
            attack_coeff: 1.0 - libm::expf(-dt / attack),
            decay_coeff: 1.0 - libm::expf(-dt / decay),
            sustain,
            release_coeff: libm::expf(-dt / release),
        };

        let mut count = 0;
        for slot_id in 0..self.voices.len() {
            if !self.allocator.slots()[slot_id].active {
                continue;
            }
            self.batch_slots[count] = slot_id;
            count += 1;
            if count == MAX_BATCH_VOICES {
                self.render_batch(count, &controls, left, right);
                count = 0;
            }
        }
        if count > 0 {
            self.render_batch(count, &controls, left, right);
        }

        let step = (gain_end - gain_start) / num_samples as f32;
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let g = gain_start + step * (i + 1) as f32;
            *l *= g;
            *r *= g;
        }
        self.reverb.process_block_stereo(left, right);

        self.last_cpu = started.elapsed().as_secs_f32() / dt;
        self.peak_cpu = self.peak_cpu.max(self.last_cpu);
        self.blocks_processed += 1;
        Ok(())
    }

    fn render_batch(&mut self, count: usize, controls: &BlockControls, left: &mut [f32], right: &mut [f32]) {
        let n = controls.num_samples;
        let stride = self.max_block_size;

        for row in 0..count {
            let slot_id = self.batch_slots[row];
            let slot = self.allocator.slots()[slot_id];
            let voice = &mut self.voices[slot_id];
            let out = &mut self.batch[row * stride..row * stride + n];

            match self.method.process_voice(
                slot_id,
                slot.frequency * controls.pitch_ratio,
                slot.amplitude,
                &voice.target,
                out,
            ) {
                Ok(info) => voice.cpu_usage = info.cpu_usage,
                Err(_) => {
                    out.fill(0.0);
                    self.skipped_renders += 1;
                }
            }
        }

        for row in 0..count {
            let slot_id = self.batch_slots[row];
            let pan = self.allocator.slots()[slot_id].pan;
            let (pan_l, pan_r) = equal_power_pan(pan);
            let voice = &mut self.voices[slot_id];
            let start = voice.level;
            let end = voice.advance_envelope(controls);
            let step = (end - start) / n as f32;

            let out = &self.batch[row * stride..row * stride + n];
            for (i, ((&s, l), r)) in out.iter().zip(left.iter_mut()).zip(right.iter_mut()).enumerate() {
                let y = s * (start + step * (i + 1) as f32);
                *l += y * pan_l;
                *r += y * pan_r;
            }

            if voice.is_releasing() && voice.level < RELEASE_FLOOR {
                voice.clear();
                self.allocator.free(slot_id);
                self.method.reset_voice(slot_id);
            }
        }
    }

    /// Start a note and return its slot, stealing the lowest-priority voice
    /// when the pool is full or the CPU limit is exceeded.
    ///
    /// The voice starts from the target last set with
    /// [`set_all_targets`](Self::set_all_targets).
    ///
    /// ## Errors
    /// [`SynthesisError::InvalidInput`] when `note` or `velocity` is above
    /// 127. Nothing changes in that case.
    pub fn note_on(&mut self, note: u8, velocity: u8) -> Result<usize, SynthesisError> {
        let over_budget = self.should_steal();
        let allocation = if over_budget {
            self.allocator.allocate_stealing(note, velocity)
        } else {
            self.allocator.allocate(note, velocity)
        }
        .inspect_err(|e| {
            tracing::debug!(note, velocity, error = %e, "note rejected");
        })?;
        let slot_id = allocation.slot_id;
        self.voices[slot_id].start(self.default_target);
        self.method.reset_voice(slot_id);

        if allocation.stolen {
            let full = self.allocator.active_count() == self.allocator.max_voices();
            if over_budget && !full {
                self.cpu_steals += 1;
            }
            tracing::debug!(note, slot = slot_id, cpu = self.last_cpu, over_budget, "voice stolen");
        }
        Ok(slot_id)
    }

    /// True when the last block's CPU load is above the limit set with
    /// [`set_cpu_limit`](Self::set_cpu_limit).
    pub fn should_steal(&self) -> bool {
        self.cpu_limit.is_some_and(|limit| self.last_cpu > limit)
    }

    /// Block CPU load (1.0 is real time) above which new notes steal a
    /// voice. Limits are clamped to 0.05-1; `None` disables stealing for
    /// load.
    pub fn set_cpu_limit(&mut self, limit: Option<f32>) {
        self.cpu_limit = limit.map(|l| l.clamp(0.05, 1.0));
    }

    /// The CPU limit, if set.
    pub fn cpu_limit(&self) -> Option<f32> {
        self.cpu_limit
    }

    /// Move the first sounding, non-releasing voice playing `note` into
    /// release. Unknown notes are ignored.
    pub fn note_off(&mut self, note: u8, _velocity: u8) {
        let found = self
            .allocator
            .slots()
            .iter()
            .find(|slot| slot.active && slot.note == note && !self.voices[slot.id].is_releasing())
            .map(|slot| slot.id);
        if let Some(slot_id) = found {
            self.voices[slot_id].stage = EnvelopeStage::Release;
        }
    }

    /// Free every voice immediately, skipping release.
    pub fn all_notes_off(&mut self) {
        self.allocator.reset_all();
        for voice in &mut self.voices {
            voice.clear();
        }
        self.method.reset();
    }

    /// Master gain (0-2), smoothed.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set_target(gain.clamp(0.0, 2.0));
    }

    /// Attack time in seconds (0.001-1), smoothed.
    pub fn set_attack(&mut self, seconds: f32) {
        self.attack.set_target(seconds.clamp(0.001, 1.0));
    }

    /// Decay time constant in seconds (0.001-5), smoothed.
    pub fn set_decay(&mut self, seconds: f32) {
        self.decay.set_target(seconds.clamp(0.001, 5.0));
    }

    /// Sustain level (0-1), smoothed. Sustaining voices follow it.
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain.set_target(level.clamp(0.0, 1.0));
    }

    /// Release time in seconds (0.001-2), smoothed.
    pub fn set_release(&mut self, seconds: f32) {
        self.release.set_target(seconds.clamp(0.001, 2.0));
    }

    /// Pitch vibrato rate in Hz (0-20), smoothed.
    pub fn set_vibrato_rate(&mut self, hz: f32) {
        self.vibrato_rate.set_target(hz.clamp(0.0, 20.0));
    }

    /// Pitch vibrato depth in semitones (0-1), smoothed.
    pub fn set_vibrato_depth(&mut self, semitones: f32) {
        self.vibrato_depth.set_target(semitones.clamp(0.0, 1.0));
    }

    /// Master gain target.
    pub fn gain(&self) -> f32 {
        self.gain.target()
    }

    /// Attack time target.
    pub fn attack(&self) -> f32 {
        self.attack.target()
    }

    /// Decay time target.
    pub fn decay(&self) -> f32 {
        self.decay.target()
    }

    /// Sustain level target.
    pub fn sustain(&self) -> f32 {
        self.sustain.target()
    }

    /// Release time target.
    pub fn release(&self) -> f32 {
        self.release.target()
    }

    /// Vibrato rate target.
    pub fn vibrato_rate(&self) -> f32 {
        self.vibrato_rate.target()
    }

    /// Vibrato depth target.
    pub fn vibrato_depth(&self) -> f32 {
        self.vibrato_depth.target()
    }

    /// Articulation for one slot.
    ///
    /// ## Errors
    /// [`SynthesisError::InvalidInput`] for a slot outside the pool.
    pub fn set_voice_target(&mut self, slot: usize, target: ArticulationTarget) -> Result<(), SynthesisError> {
        let voice = self
            .voices
            .get_mut(slot)
            .ok_or(SynthesisError::InvalidInput("voice slot out of range"))?;
        voice.target = target;
        Ok(())
    }

    /// Articulation for every slot and for notes started later.
    pub fn set_all_targets(&mut self, target: ArticulationTarget) {
        self.default_target = target;
        for voice in &mut self.voices {
            voice.target = target;
        }
    }

    /// Stereo position of an active slot (-1 left, 1 right).
    pub fn set_voice_pan(&mut self, slot: usize, pan: f32) {
        self.allocator.set_pan(slot, pan);
    }

    /// Switch synthesis method by name.
    ///
    /// The new method is prepared here, so call this off the audio thread.
    /// Sounding voices keep their slots and envelopes.
    ///
    /// ## Errors
    /// [`SynthesisError::NotFound`] for an unknown name; the current method
    /// stays active.
    pub fn set_method(&mut self, name: &str) -> Result<(), SynthesisError> {
        let mut method = Synthesizer::from_name(name).inspect_err(|e| {
            tracing::warn!(method = name, error = %e, "keeping current synthesis method");
        })?;
        if let Some(sub) = method.as_subharmonic_mut() {
            sub.set_fft_size(self.fft_size);
            sub.set_params(self.subharmonic_params);
        }
        if self.prepared {
            method.prepare(&self.synthesis_params(self.sample_rate, self.max_block_size))?;
        }
        self.method = method;
        tracing::info!(method = name, "synthesis method selected");
        Ok(())
    }

    /// Name of the active method.
    pub fn method_name(&self) -> &'static str {
        self.method.name()
    }

    /// Active method.
    pub fn method(&self) -> &Synthesizer {
        &self.method
    }

    /// Active method, for method-specific setters.
    pub fn method_mut(&mut self) -> &mut Synthesizer {
        &mut self.method
    }

    /// Load a subharmonic preset by name. Kept across method switches.
    ///
    /// ## Errors
    /// [`SynthesisError::NotFound`] for an unknown preset; parameters are
    /// unchanged.
    pub fn set_subharmonic_preset(&mut self, registry: &PresetRegistry, name: &str) -> Result<(), SynthesisError> {
        let params = registry.params(name)?;
        self.apply_subharmonic_params(params);
        tracing::debug!(preset = name, "subharmonic preset applied");
        Ok(())
    }

    fn apply_subharmonic_params(&mut self, params: SubharmonicParams) {
        self.subharmonic_params = params;
        if let Some(sub) = self.method.as_subharmonic_mut() {
            sub.set_params(params);
        }
    }

    /// Output reverb.
    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    /// Output reverb, for direct control from the audio thread.
    pub fn reverb_mut(&mut self) -> &mut Reverb {
        &mut self.reverb
    }

    /// Create the control queue and return its producer.
    ///
    /// Messages are applied at the start of the next block. A previous queue
    /// is replaced; its producer goes dead.
    pub fn control_producer(&mut self, capacity: usize) -> Producer<ControlMessage> {
        let (tx, rx) = RingBuffer::<ControlMessage>::new(capacity.max(1));
        self.control = Some(rx);
        tx
    }

    fn drain_control(&mut self) {
        let Some(mut rx) = self.control.take() else {
            return;
        };
        while let Ok(msg) = rx.pop() {
            self.apply_message(msg);
        }
        self.control = Some(rx);
    }

    /// Apply one control message immediately.
    pub fn apply_message(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::NoteOn { note, velocity } => {
                // Rejections are logged by note_on.
                let _ = self.note_on(note, velocity);
            }
            ControlMessage::NoteOff { note, velocity } => self.note_off(note, velocity),
            ControlMessage::AllNotesOff => self.all_notes_off(),
            ControlMessage::SetGain(v) => self.set_gain(v),
            ControlMessage::SetAttack(v) => self.set_attack(v),
            ControlMessage::SetDecay(v) => self.set_decay(v),
            ControlMessage::SetSustain(v) => self.set_sustain(v),
            ControlMessage::SetCpuLimit(limit) => self.set_cpu_limit(limit),
            ControlMessage::SetRelease(v) => self.set_release(v),
            ControlMessage::SetVibratoRate(v) => self.set_vibrato_rate(v),
            ControlMessage::SetVibratoDepth(v) => self.set_vibrato_depth(v),
            ControlMessage::SetVoiceTarget { slot, target } => {
                if let Some(voice) = self.voices.get_mut(slot) {
                    voice.target = target;
                }
            }
            ControlMessage::SetAllTargets(target) => self.set_all_targets(target),
            ControlMessage::SetVoicePan { slot, pan } => self.set_voice_pan(slot, pan),
            ControlMessage::SetSubharmonicParams(params) => self.apply_subharmonic_params(params),
            ControlMessage::SetReverb(settings) => self.reverb.apply_settings(settings),
            ControlMessage::SetReverbPreset(preset) => self.reverb.set_preset(preset),
            ControlMessage::SetReverbBypass(bypass) => self.reverb.set_bypass(bypass),
            ControlMessage::SetReverbFreeze(freeze) => self.reverb.set_freeze(freeze),
        }
    }

    /// Counters.
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            total_voices: self.allocator.max_voices(),
            active_voices: self.allocator.active_count(),
            stolen_voices: self.allocator.stats().stolen_voices,
            cpu_steals: self.cpu_steals,
            peak_cpu: self.peak_cpu,
            last_cpu: self.last_cpu,
            skipped_renders: self.skipped_renders,
            blocks_processed: self.blocks_processed,
        }
    }

    /// Number of allocated voices, releasing ones included.
    pub fn active_voice_count(&self) -> usize {
        self.allocator.active_count()
    }

    /// The allocator.
    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    /// Playback state of one slot.
    pub fn voice(&self, slot: usize) -> Option<&VoiceInstance> {
        self.voices.get(slot)
    }

    /// True after a successful [`prepare`](Self::prepare).
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Prepared sample rate.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Prepared block capacity.
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    fn synthesis_params(&self, sample_rate: f32, max_block_size: usize) -> SynthesisParams {
        SynthesisParams {
            sample_rate,
            max_block_size,
            max_voices: self.allocator.max_voices(),
            ..SynthesisParams::default()
        }
    }
}

impl Default for VoiceManager {
    fn default() -> Self {
        Self::new(crate::allocator::DEFAULT_MAX_VOICES)
    }
}
