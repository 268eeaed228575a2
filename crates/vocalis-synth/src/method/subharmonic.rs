//! Subharmonic synthesis for throat-singing styles.
//!
//! Each lane runs two paths:
//!
//! ```text
//! glottal(f0) -> target formants -> DC block -> [chest boost] ----------------+
//!                                                                              +-> blend -> [enhance] -> soft clip
//! PLL(f0 / ratio) -> pulse shape -> DC block -> [roughness] -> [resonance] -> [pulsing] +
//! ```
//!
//! The subharmonic is a Rosenberg pulse driven by the PLL phase, so it has
//! harmonics for the preset resonance to pick out. Parameters come from the
//! target's own [`SubharmonicParams`] when present, otherwise from the preset
//! selected on the method.

use core::f32::consts::TAU;
use std::time::Instant;

use vocalis_core::{
    DcBlocker, Effect, FormantResonator, GlottalModel, GlottalSource, Lfo, NoiseSource, SubharmonicGenerator,
    DEFAULT_NOISE_SEED, soft_clip,
};
use vocalis_effects::{DEFAULT_FFT_SIZE, FftPlans, SpectralEnhancer};

use super::bank::{FormantBank, CONTROL_INTERVAL};
use super::{CpuMeter, MethodStats, SynthesisMethod, SynthesisParams, SynthesisResult, check_render};
use crate::articulation::{ArticulationTarget, NUM_TARGET_FORMANTS, SubharmonicParams};
use crate::error::SynthesisError;
use crate::preset::PresetRegistry;

const OPEN_QUOTIENT: f32 = 0.7;
const SPEED_QUOTIENT: f32 = 0.3;
const RETURN_PHASE: f32 = 0.1;
const TRACT_GAINS: [f32; NUM_TARGET_FORMANTS] = [1.0, 0.7, 0.4, 0.25];
const TRACT_SMOOTHING_MS: f32 = 50.0;
const DEFAULT_MIX: f32 = 0.5;
/// +3 dB.
const CHEST_GAIN: f32 = 1.4;
const ROUGHNESS: f32 = 0.3;
const RESONANCE_SWEEP: f32 = 0.25;
const RESONANCE_GAIN: f32 = 4.0;

#[derive(Debug, Clone)]
struct Lane {
    glottal: GlottalSource,
    tract: FormantBank<NUM_TARGET_FORMANTS>,
    tract_dc: DcBlocker,
    pll: SubharmonicGenerator,
    sub_shape: GlottalSource,
    sub_dc: DcBlocker,
    resonance: FormantResonator,
    pulse: Lfo,
    noise: NoiseSource,
    enhancer: SpectralEnhancer,
    ratio: f32,
    pulse_gain: f32,
    countdown: usize,
}

impl Lane {
    fn new(sample_rate: f32, seed: u32, plans: FftPlans) -> Self {
        let mut glottal = GlottalSource::new(sample_rate);
        glottal.set_model(GlottalModel::Rosenberg);
        glottal.set_pulse_shape(OPEN_QUOTIENT, SPEED_QUOTIENT, RETURN_PHASE);
        let sub_shape = glottal.clone();

        let mut pll = SubharmonicGenerator::new(sample_rate);
        pll.set_mix(1.0);

        Self {
            glottal,
            tract: FormantBank::new(sample_rate, TRACT_SMOOTHING_MS),
            tract_dc: DcBlocker::new(sample_rate),
            pll,
            sub_shape,
            sub_dc: DcBlocker::new(sample_rate),
            resonance: FormantResonator::new(),
            pulse: Lfo::new(sample_rate, 0.0),
            noise: NoiseSource::new(seed),
            enhancer: SpectralEnhancer::with_plans(plans),
            ratio: 2.0,
            pulse_gain: 1.0,
            countdown: 0,
        }
    }

    fn reset(&mut self) {
        self.glottal.reset();
        self.tract.reset();
        self.tract_dc.reset();
        self.pll.reset();
        self.sub_dc.reset();
        self.resonance.reset();
        self.pulse.reset();
        self.noise.reset();
        self.enhancer.reset();
        self.pulse_gain = 1.0;
        self.countdown = 0;
    }

    /// Control-rate update of the pulse LFO and preset resonance.
    fn update_controls(&mut self, params: &SubharmonicParams, sample_rate: f32) {
        let lfo = if params.pulse_rate_hz > 0.0 {
            self.pulse.set_frequency(params.pulse_rate_hz);
            self.pulse.advance(CONTROL_INTERVAL)
        } else {
            0.0
        };

        self.pulse_gain = 1.0 - params.pulse_depth.clamp(0.0, 1.0) * 0.5 * (1.0 - lfo);

        let mut center = params.formant_hz;
        if params.formant_modulation {
            center *= 1.0 + RESONANCE_SWEEP * lfo;
        }
        let mut bandwidth = params.formant_bandwidth_hz;
        if params.sharp_resonance {
            bandwidth *= 0.5;
        }
        let center = center.clamp(20.0, sample_rate * 0.45);
        self.resonance.set_parameters(center, bandwidth.max(1.0), sample_rate);
    }
}

/// Subharmonic synthesis method.
///
/// # Example
///
/// ```rust
/// use vocalis_synth::{ArticulationTarget, PresetRegistry, SubharmonicMethod, SynthesisMethod, SynthesisParams};
///
/// let registry = PresetRegistry::with_factory_presets();
/// let mut method = SubharmonicMethod::new();
/// method.set_preset(&registry, "tuva_kargyraa").unwrap();
/// method.prepare(&SynthesisParams { max_voices: 2, ..Default::default() }).unwrap();
///
/// let mut out = [0.0f32; 256];
/// method.process(110.0, 0.8, &ArticulationTarget::A_AW, &mut out).unwrap();
/// assert!(out.iter().all(|s| s.abs() <= 0.8));
/// ```
#[derive(Debug, Clone)]
pub struct SubharmonicMethod {
    lanes: Vec<Lane>,
    sample_rate: f32,
    params: SubharmonicParams,
    mix: f32,
    formant_filtering: bool,
    spectral_enhancement: bool,
    enhancement_amount: f32,
    fft_size: usize,
    max_block_size: usize,
    meter: CpuMeter,
}

impl SubharmonicMethod {
    /// An unprepared method with default parameters.
    pub fn new() -> Self {
        Self {
            lanes: Vec::new(),
            sample_rate: 48000.0,
            params: SubharmonicParams::default(),
            mix: DEFAULT_MIX,
            formant_filtering: true,
            spectral_enhancement: false,
            enhancement_amount: 0.5,
            fft_size: DEFAULT_FFT_SIZE,
            max_block_size: 0,
            meter: CpuMeter::new(48000.0),
        }
    }

    /// Load a preset from `registry`.
    ///
    /// ## Errors
    /// [`SynthesisError::NotFound`] for unknown names; the current
    /// parameters are kept.
    pub fn set_preset(&mut self, registry: &PresetRegistry, name: &str) -> Result<(), SynthesisError> {
        self.params = registry.params(name)?;
        tracing::debug!(preset = name, ratio = self.params.ratio, "subharmonic preset loaded");
        Ok(())
    }

    /// Replace the parameters used when a target carries none.
    pub fn set_params(&mut self, params: SubharmonicParams) {
        self.params = params;
    }

    /// Parameters used when a target carries none.
    pub fn params(&self) -> &SubharmonicParams {
        &self.params
    }

    /// Division ratio (0.1-16).
    pub fn set_subharmonic_ratio(&mut self, ratio: f32) {
        self.params.ratio = ratio.clamp(0.1, 16.0);
    }

    /// Blend between fundamental (0) and subharmonic (1).
    pub fn set_subharmonic_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Blend between fundamental and subharmonic.
    pub fn subharmonic_mix(&self) -> f32 {
        self.mix
    }

    /// Route the subharmonic through the preset resonance.
    pub fn set_formant_filtering(&mut self, enabled: bool) {
        self.formant_filtering = enabled;
    }

    /// Whether the preset resonance is applied.
    pub fn formant_filtering(&self) -> bool {
        self.formant_filtering
    }

    /// Run each voice through a spectral enhancer. Adds one FFT frame of
    /// latency while enabled.
    pub fn set_spectral_enhancement(&mut self, enabled: bool) {
        self.spectral_enhancement = enabled;
    }

    /// Whether spectral enhancement is on.
    pub fn spectral_enhancement(&self) -> bool {
        self.spectral_enhancement
    }

    /// Enhancer contrast amount (0-1).
    pub fn set_enhancement_amount(&mut self, amount: f32) {
        self.enhancement_amount = amount.clamp(0.0, 1.0);
        for lane in &mut self.lanes {
            lane.enhancer.set_amount(self.enhancement_amount);
        }
    }

    /// FFT size for the enhancers; applied by the next
    /// [`prepare`](SynthesisMethod::prepare).
    pub fn set_fft_size(&mut self, size: usize) {
        self.fft_size = vocalis_effects::normalize_fft_size(size);
    }

    /// FFT size the enhancers use.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}

impl Default for SubharmonicMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisMethod for SubharmonicMethod {
    fn name(&self) -> &'static str {
        "subharmonic"
    }

    fn prepare(&mut self, params: &SynthesisParams) -> Result<(), SynthesisError> {
        params.validate()?;
        self.sample_rate = params.sample_rate;
        self.max_block_size = params.max_block_size;
        self.meter = CpuMeter::new(params.sample_rate);

        let plans = FftPlans::new(self.fft_size);
        self.lanes = (0..params.max_voices)
            .map(|i| {
                let mut lane = Lane::new(params.sample_rate, DEFAULT_NOISE_SEED.wrapping_add(i as u32), plans.clone());
                lane.enhancer.set_amount(self.enhancement_amount);
                lane
            })
            .collect();
        tracing::info!(
            sample_rate = params.sample_rate,
            lanes = params.max_voices,
            max_block_size = params.max_block_size,
            fft_size = self.fft_size,
            "subharmonic synthesis prepared"
        );
        Ok(())
    }

    fn lanes(&self) -> usize {
        self.lanes.len()
    }

    fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    fn process_voice(
        &mut self,
        lane: usize,
        frequency: f32,
        amplitude: f32,
        target: &ArticulationTarget,
        output: &mut [f32],
    ) -> SynthesisResult {
        check_render(lane, self.lanes.len(), output.len(), self.max_block_size)?;
        let started = Instant::now();

        let params = target.subharmonic.unwrap_or(self.params);
        let f0 = if frequency > 0.0 { frequency } else { params.fundamental_hz };
        let mix = self.mix;
        let sub_level = params.amplitude.clamp(0.0, 1.0);
        let resonance_mix = if self.formant_filtering {
            params.formant_amplitude.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let fundamental_gain = if params.chest_voice { CHEST_GAIN } else { 1.0 };
        let enhance = self.spectral_enhancement;
        let sample_rate = self.sample_rate;

        let state = &mut self.lanes[lane];
        if (state.ratio - params.ratio).abs() > f32::EPSILON {
            state.pll.set_ratio(params.ratio);
            state.ratio = state.pll.ratio();
        }
        state.glottal.set_frequency(f0);
        state
            .tract
            .set_targets(&target.formants.frequencies, &target.formants.bandwidths);

        for sample in output.iter_mut() {
            if state.countdown == 0 {
                state.update_controls(&params, sample_rate);
                state.countdown = CONTROL_INTERVAL;
            }
            state.countdown -= 1;

            state.tract.tick(&[1.0; NUM_TARGET_FORMANTS]);
            let voiced = state.tract.process_parallel(state.glottal.process(), &TRACT_GAINS);
            let fundamental = state.tract_dc.process(voiced) * fundamental_gain;

            state.pll.process(f0);
            let t = state.pll.sub_phase() / TAU + 0.5;
            let mut sub = state.sub_dc.process(state.sub_shape.pulse_at(t - libm::floorf(t)));
            if params.ventricular_folds {
                sub *= 1.0 + ROUGHNESS * state.noise.next_sample();
            }
            if resonance_mix > 0.0 {
                let resonant = state.resonance.process(sub) * RESONANCE_GAIN;
                sub = sub * (1.0 - resonance_mix) + resonant * resonance_mix;
            }
            sub *= sub_level * state.pulse_gain;

            let mut y = fundamental * (1.0 - mix) + sub * mix;
            if enhance {
                y = state.enhancer.process(y);
            }
            *sample = soft_clip(y) * amplitude;
        }

        Ok(self.meter.record(started, output.len()))
    }

    fn begin_block(&mut self, _num_samples: usize) {
        self.meter.begin_block();
    }

    fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.reset();
        }
        self.meter.reset();
    }

    fn reset_voice(&mut self, lane: usize) {
        if let Some(lane) = self.lanes.get_mut(lane) {
            lane.reset();
        }
    }

    fn stats(&self) -> MethodStats {
        self.meter.stats()
    }
}
