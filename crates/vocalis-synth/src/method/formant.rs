//! Formant synthesis: source-filter model with five resonators.
//!
//! The excitation depends on the target:
//!
//! | Target | Excitation |
//! |--------|------------|
//! | voiced vowel, nasal, approximant | glottal pulse train |
//! | voiced fricative, unvoiced vowel | pulse/noise blend (`pulse_mix`) |
//! | unvoiced fricative | noise x `noise_gain` |
//! | plosive | 10 ms noise burst x 2 at onset, then silence |
//!
//! The excitation runs through F1-F4 from the target and a fixed F5 at
//! 4500 Hz / 140 Hz, chained in series from F1 to F5 and levelled so the
//! tallest formant peak is constant across vowels. A parallel bank with
//! falling per-formant gains is available through [`FormantRouting`].
//! Formant centres glide through per-formant smoothers (50 ms by default)
//! and optionally carry a sine vibrato on F1 and F2.

use std::time::Instant;

use vocalis_core::{GlottalSource, Lfo, NoiseSource, DEFAULT_NOISE_SEED, semitones_to_ratio};

use super::bank::{FormantBank, CONTROL_INTERVAL};
use super::{CpuMeter, MethodStats, SynthesisMethod, SynthesisParams, SynthesisResult, check_render};
use crate::articulation::{ArticulationTarget, Category, Manner};
use crate::error::SynthesisError;

const NUM_FORMANTS: usize = 5;
const F5_HZ: f32 = 4500.0;
const F5_BANDWIDTH_HZ: f32 = 140.0;
const PARALLEL_GAINS: [f32; NUM_FORMANTS] = [1.0, 0.7, 0.4, 0.25, 0.15];

const DEFAULT_TRANSITION_MS: f32 = 50.0;
const DEFAULT_PULSE_MIX: f32 = 0.5;
const NOISE_GAIN: f32 = 0.3;
const BURST_SECONDS: f32 = 0.01;
const BURST_GAIN: f32 = 2.0;
const DEFAULT_VIBRATO_HZ: f32 = 6.0;
const DEFAULT_VIBRATO_SEMITONES: f32 = 1.0;

/// How the five resonators are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormantRouting {
    /// Chained F1 to F5, each resonator feeding the next.
    #[default]
    Series,
    /// Summed with falling per-formant gains.
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Excitation {
    Pulse,
    Mixed,
    Noise,
    Burst,
}

impl Excitation {
    fn for_target(target: &ArticulationTarget) -> Self {
        let voiced = target.is_voiced();
        match (target.category, target.manner) {
            (Category::Consonant, Manner::Plosive) => Excitation::Burst,
            (Category::Consonant, Manner::Fricative) if voiced => Excitation::Mixed,
            (Category::Consonant, _) if !voiced => Excitation::Noise,
            (Category::Consonant, _) => Excitation::Pulse,
            _ if voiced => Excitation::Pulse,
            _ => Excitation::Mixed,
        }
    }
}

#[derive(Debug, Clone)]
struct Lane {
    glottal: GlottalSource,
    noise: NoiseSource,
    bank: FormantBank<NUM_FORMANTS>,
    vibrato: Lfo,
    scale: [f32; NUM_FORMANTS],
    burst_remaining: usize,
    in_plosive: bool,
}

impl Lane {
    fn new(sample_rate: f32, seed: u32, transition_ms: f32, vibrato_hz: f32) -> Self {
        Self {
            glottal: GlottalSource::new(sample_rate),
            noise: NoiseSource::new(seed),
            bank: FormantBank::new(sample_rate, transition_ms),
            vibrato: Lfo::new(sample_rate, vibrato_hz),
            scale: [1.0; NUM_FORMANTS],
            burst_remaining: 0,
            in_plosive: false,
        }
    }

    #[inline]
    fn excitation(&mut self, kind: Excitation, pulse_mix: f32, noise_gain: f32) -> f32 {
        match kind {
            Excitation::Pulse => self.glottal.process(),
            Excitation::Noise => self.noise.next_sample() * noise_gain,
            Excitation::Mixed => {
                let pulse = self.glottal.process();
                let noise = self.noise.next_sample() * noise_gain;
                pulse * pulse_mix + noise * (1.0 - pulse_mix)
            }
            Excitation::Burst => {
                if self.burst_remaining > 0 {
                    self.burst_remaining -= 1;
                    self.noise.next_sample() * BURST_GAIN
                } else {
                    0.0
                }
            }
        }
    }

    fn reset(&mut self) {
        self.glottal.reset();
        self.noise.reset();
        self.bank.reset();
        self.vibrato.reset();
        self.scale = [1.0; NUM_FORMANTS];
        self.burst_remaining = 0;
        self.in_plosive = false;
    }
}

/// Formant synthesis method.
///
/// # Example
///
/// ```rust
/// use vocalis_synth::{ArticulationTarget, FormantMethod, FormantRouting, SynthesisMethod, SynthesisParams};
///
/// let mut formant = FormantMethod::new();
/// formant.prepare(&SynthesisParams { max_voices: 4, ..Default::default() }).unwrap();
/// assert_eq!(formant.routing(), FormantRouting::Series);
/// formant.set_routing(FormantRouting::Parallel);
/// formant.set_vibrato(true, 5.5, 0.3);
///
/// let mut out = [0.0f32; 480];
/// formant.process_voice(2, 196.0, 0.8, &ArticulationTarget::U_OO, &mut out).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FormantMethod {
    lanes: Vec<Lane>,
    routing: FormantRouting,
    transition_ms: f32,
    pulse_mix: f32,
    noise_gain: f32,
    vibrato_enabled: bool,
    vibrato_hz: f32,
    vibrato_semitones: f32,
    burst_samples: usize,
    max_block_size: usize,
    meter: CpuMeter,
}

impl FormantMethod {
    /// An unprepared method with default settings.
    pub fn new() -> Self {
        Self {
            lanes: Vec::new(),
            routing: FormantRouting::Series,
            transition_ms: DEFAULT_TRANSITION_MS,
            pulse_mix: DEFAULT_PULSE_MIX,
            noise_gain: NOISE_GAIN,
            vibrato_enabled: false,
            vibrato_hz: DEFAULT_VIBRATO_HZ,
            vibrato_semitones: DEFAULT_VIBRATO_SEMITONES,
            burst_samples: burst_samples(48000.0),
            max_block_size: 0,
            meter: CpuMeter::new(48000.0),
        }
    }

    /// Formant glide time constant in milliseconds (1-1000).
    pub fn set_transition_time_ms(&mut self, ms: f32) {
        self.transition_ms = ms.clamp(1.0, 1000.0);
        for lane in &mut self.lanes {
            lane.bank.set_smoothing_ms(self.transition_ms);
        }
    }

    /// Formant glide time constant in milliseconds.
    pub fn transition_time_ms(&self) -> f32 {
        self.transition_ms
    }

    /// Pulse share of the pulse/noise blend (0-1).
    pub fn set_excitation_mix(&mut self, pulse_mix: f32) {
        self.pulse_mix = pulse_mix.clamp(0.0, 1.0);
    }

    /// Pulse share of the pulse/noise blend.
    pub fn excitation_mix(&self) -> f32 {
        self.pulse_mix
    }

    /// Enable or disable F1/F2 vibrato. Rate is clamped to 0-20 Hz and depth
    /// to 0-2 semitones.
    pub fn set_vibrato(&mut self, enabled: bool, rate_hz: f32, depth_semitones: f32) {
        self.vibrato_enabled = enabled;
        self.vibrato_hz = rate_hz.clamp(0.0, 20.0);
        self.vibrato_semitones = depth_semitones.clamp(0.0, 2.0);
        for lane in &mut self.lanes {
            lane.vibrato.set_frequency(self.vibrato_hz);
        }
    }

    /// Select series (default) or parallel resonators.
    pub fn set_routing(&mut self, routing: FormantRouting) {
        self.routing = routing;
    }

    /// Current resonator routing.
    pub fn routing(&self) -> FormantRouting {
        self.routing
    }
}

impl Default for FormantMethod {
    fn default() -> Self {
        Self::new()
    }
}

fn burst_samples(sample_rate: f32) -> usize {
    (sample_rate * BURST_SECONDS) as usize
}

fn bank_targets(target: &ArticulationTarget) -> ([f32; NUM_FORMANTS], [f32; NUM_FORMANTS]) {
    let f = target.formants.frequencies;
    let b = target.formants.bandwidths;
    (
        [f[0], f[1], f[2], f[3], F5_HZ],
        [b[0], b[1], b[2], b[3], F5_BANDWIDTH_HZ],
    )
}

impl SynthesisMethod for FormantMethod {
    fn name(&self) -> &'static str {
        "formant"
    }

    fn prepare(&mut self, params: &SynthesisParams) -> Result<(), SynthesisError> {
        params.validate()?;
        self.burst_samples = burst_samples(params.sample_rate);
        self.max_block_size = params.max_block_size;
        self.meter = CpuMeter::new(params.sample_rate);
        self.lanes = (0..params.max_voices)
            .map(|i| {
                Lane::new(
                    params.sample_rate,
                    DEFAULT_NOISE_SEED.wrapping_add(i as u32),
                    self.transition_ms,
                    self.vibrato_hz,
                )
            })
            .collect();
        tracing::info!(
            sample_rate = params.sample_rate,
            lanes = params.max_voices,
            max_block_size = params.max_block_size,
            routing = ?self.routing,
            "formant synthesis prepared"
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

        let kind = Excitation::for_target(target);
        let (centers, bandwidths) = bank_targets(target);
        let vibrato = self.vibrato_enabled.then_some(self.vibrato_semitones);
        let routing = self.routing;
        let (pulse_mix, noise_gain) = (self.pulse_mix, self.noise_gain);
        let burst_samples = self.burst_samples;

        let state = &mut self.lanes[lane];
        state.glottal.set_frequency(frequency);
        state.bank.set_targets(&centers, &bandwidths);

        let plosive = kind == Excitation::Burst;
        if plosive && !state.in_plosive {
            state.burst_remaining = burst_samples;
        }
        state.in_plosive = plosive;

        for sample in output.iter_mut() {
            if state.bank.due() {
                if let Some(depth) = vibrato {
                    let ratio = semitones_to_ratio(depth * state.vibrato.advance(CONTROL_INTERVAL));
                    state.scale[0] = ratio;
                    state.scale[1] = ratio;
                } else {
                    state.scale = [1.0; NUM_FORMANTS];
                }
            }
            state.bank.tick(&state.scale);

            let x = state.excitation(kind, pulse_mix, noise_gain);
            let y = match routing {
                FormantRouting::Parallel => state.bank.process_parallel(x, &PARALLEL_GAINS),
                FormantRouting::Series => state.bank.process_series(x),
            };
            *sample = y * amplitude;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(voices: usize) -> FormantMethod {
        let mut method = FormantMethod::new();
        method
            .prepare(&SynthesisParams {
                max_voices: voices,
                max_block_size: 9600,
                ..SynthesisParams::default()
            })
            .expect("prepare");
        method
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn excitation_classification() {
        assert_eq!(Excitation::for_target(&ArticulationTarget::A_AH), Excitation::Pulse);
        assert_eq!(Excitation::for_target(&ArticulationTarget::S), Excitation::Noise);
        assert_eq!(Excitation::for_target(&ArticulationTarget::T), Excitation::Burst);
        assert_eq!(Excitation::for_target(&ArticulationTarget::M), Excitation::Pulse);

        let mut z = ArticulationTarget::S;
        z.features.voiced = true;
        assert_eq!(Excitation::for_target(&z), Excitation::Mixed);

        let mut whisper = ArticulationTarget::A_AH;
        whisper.features.voiced = false;
        assert_eq!(Excitation::for_target(&whisper), Excitation::Mixed);
    }

    #[test]
    fn vowel_renders_finite_audio() {
        let mut method = prepared(1);
        let mut out = vec![0.0f32; 4800];
        method
            .process(220.0, 0.8, &ArticulationTarget::A_AH, &mut out)
            .expect("render");
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(rms(&out) > 1e-3, "vowel should be audible, rms {}", rms(&out));
    }

    #[test]
    fn amplitude_scales_output() {
        let mut loud = prepared(1);
        let mut quiet = prepared(1);
        let mut a = vec![0.0f32; 1024];
        let mut b = vec![0.0f32; 1024];
        loud.process(150.0, 1.0, &ArticulationTarget::E_EH, &mut a).expect("loud");
        quiet.process(150.0, 0.25, &ArticulationTarget::E_EH, &mut b).expect("quiet");
        for i in 0..1024 {
            assert!((a[i] * 0.25 - b[i]).abs() < 1e-5, "sample {i}");
        }
    }

    #[test]
    fn plosive_burst_then_silence() {
        let mut method = prepared(1);
        let burst = 480;
        let mut out = vec![0.0f32; 4800];
        method.process(120.0, 1.0, &ArticulationTarget::K, &mut out).expect("render");

        assert!(rms(&out[..burst]) > 1e-3, "burst should be audible");
        let tail = rms(&out[4000..]);
        assert!(tail < rms(&out[..burst]) * 0.05, "resonators should ring down after the burst, tail {tail}");

        // Staying on the same plosive does not retrigger.
        let mut next = vec![0.0f32; 480];
        method.process(120.0, 1.0, &ArticulationTarget::K, &mut next).expect("render");
        assert!(rms(&next) < rms(&out[..burst]) * 0.05);
    }

    #[test]
    fn lanes_are_independent() {
        let mut method = prepared(2);
        let mut a = vec![0.0f32; 512];
        method.process_voice(0, 220.0, 1.0, &ArticulationTarget::I_EE, &mut a).expect("lane 0");
        let mut other = vec![0.0f32; 512];
        method.process_voice(1, 330.0, 1.0, &ArticulationTarget::U_OO, &mut other).expect("lane 1");

        let mut fresh = prepared(2);
        let mut b = vec![0.0f32; 512];
        fresh.process_voice(0, 220.0, 1.0, &ArticulationTarget::I_EE, &mut b).expect("fresh");
        let mut a2 = vec![0.0f32; 512];
        let mut b2 = vec![0.0f32; 512];
        method.process_voice(0, 220.0, 1.0, &ArticulationTarget::I_EE, &mut a2).expect("lane 0 again");
        fresh.process_voice(0, 220.0, 1.0, &ArticulationTarget::I_EE, &mut b2).expect("fresh again");
        assert_eq!(a2, b2, "rendering lane 1 must not disturb lane 0");
    }

    #[test]
    fn series_is_the_default_routing() {
        assert_eq!(FormantMethod::new().routing(), FormantRouting::Series);
        assert_eq!(FormantRouting::default(), FormantRouting::Series);
    }

    #[test]
    fn series_level_is_comparable_across_vowels() {
        let level = |target: &ArticulationTarget| {
            let mut method = prepared(1);
            let mut out = vec![0.0f32; 9600];
            method.process(120.0, 1.0, target, &mut out).expect("render");
            rms(&out[4800..])
        };
        let ah = level(&ArticulationTarget::A_AH);
        let ee = level(&ArticulationTarget::I_EE);
        let oo = level(&ArticulationTarget::U_OO);
        for (name, v) in [("ah", ah), ("ee", ee), ("oo", oo)] {
            assert!(v > 1e-3 && v < 2.0, "{name} rms {v}");
        }
        let (lo, hi) = (ah.min(ee).min(oo), ah.max(ee).max(oo));
        assert!(hi / lo < 100.0, "series vowels should stay within 40 dB, {lo}..{hi}");
    }

    #[test]
    fn routings_differ_and_vibrato_stays_finite() {
        let mut series = prepared(1);
        let mut parallel = prepared(1);
        parallel.set_routing(FormantRouting::Parallel);
        for method in [&mut series, &mut parallel] {
            method.set_vibrato(true, 6.0, 1.0);
        }
        let mut a = vec![0.0f32; 9600];
        let mut b = vec![0.0f32; 9600];
        series.process(110.0, 1.0, &ArticulationTarget::O_OH, &mut a).expect("series");
        parallel.process(110.0, 1.0, &ArticulationTarget::O_OH, &mut b).expect("parallel");
        assert!(a.iter().chain(&b).all(|s| s.is_finite()));
        assert_ne!(a, b);
        assert_eq!(parallel.routing(), FormantRouting::Parallel);
    }

    #[test]
    fn oversized_block_is_rejected_untouched() {
        let mut method = prepared(1);
        let mut out = vec![0.5f32; 9601];
        let err = method.process(110.0, 1.0, &ArticulationTarget::O_OH, &mut out).unwrap_err();
        assert_eq!(err, SynthesisError::CapacityExceeded { requested: 9601, capacity: 9600 });
        assert!(out.iter().all(|&s| s == 0.5));
        assert_eq!(method.stats().voices_processed, 0);
    }

    #[test]
    fn setters_clamp() {
        let mut method = FormantMethod::new();
        method.set_excitation_mix(3.0);
        assert_eq!(method.excitation_mix(), 1.0);
        method.set_transition_time_ms(0.0);
        assert_eq!(method.transition_time_ms(), 1.0);
    }

    #[test]
    fn reset_voice_reproduces_output() {
        let mut method = prepared(1);
        let mut first = vec![0.0f32; 256];
        method.process(200.0, 1.0, &ArticulationTarget::SCHWA, &mut first).expect("first");
        method.reset_voice(0);
        let mut second = vec![0.0f32; 256];
        method.process(200.0, 1.0, &ArticulationTarget::SCHWA, &mut second).expect("second");
        assert_eq!(first, second);
    }
}
