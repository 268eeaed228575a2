//! Diphone synthesis: timed transitions between consecutive targets.
//!
//! When a lane receives a target different from the one it is sounding, a
//! [`DiphoneTransition`] starts. Its kind (CV, VC, VV, CC) comes from the
//! vowel-likeness of both ends and decides how time maps onto the crossfade:
//! a consonant-vowel transition spends the first `consonant_ratio` of its
//! duration reaching the midpoint and the remaining `vowel_ratio` settling
//! into the vowel, and VC mirrors that.
//!
//! Formants and bandwidths are crossfaded with a power curve. With
//! coarticulation enabled the interpolated formants pass through 20 ms
//! smoothers; disabled, they are applied directly.
//!
//! Voiced segments are excited by a sawtooth, band-limited with PolyBLEP
//! unless anti-aliasing is switched off in [`SynthesisParams`].

use std::time::Instant;

use libm::powf;
use vocalis_core::{NoiseSource, DEFAULT_NOISE_SEED};

use super::bank::FormantBank;
use super::{CpuMeter, MethodStats, SynthesisMethod, SynthesisParams, SynthesisResult, check_render};
use crate::articulation::{ArticulationTarget, FormantData, Manner, NUM_TARGET_FORMANTS};
use crate::error::SynthesisError;

const DEFAULT_DURATION_SECONDS: f32 = 0.15;
const DEFAULT_CURVE: f32 = 1.0;
const DEFAULT_CONSONANT_RATIO: f32 = 0.3;
const DEFAULT_VOWEL_RATIO: f32 = 0.7;
const COARTICULATION_MS: f32 = 20.0;
const FORMANT_GAINS: [f32; NUM_TARGET_FORMANTS] = [1.0, 0.7, 0.4, 0.25];
const BURST_SECONDS: f32 = 0.01;
const BURST_GAIN: f32 = 2.0;
const FRICATIVE_GAIN: f32 = 0.5;
const UNVOICED_GAIN: f32 = 0.3;

/// Phonetic shape of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Consonant into vowel.
    ConsonantVowel,
    /// Vowel into consonant.
    VowelConsonant,
    /// Vowel into vowel.
    VowelVowel,
    /// Consonant into consonant.
    ConsonantConsonant,
}

impl TransitionKind {
    /// Classify by the vowel-likeness of both ends.
    pub fn classify(source: &ArticulationTarget, destination: &ArticulationTarget) -> Self {
        match (source.is_vowel_like(), destination.is_vowel_like()) {
            (true, true) => TransitionKind::VowelVowel,
            (true, false) => TransitionKind::VowelConsonant,
            (false, true) => TransitionKind::ConsonantVowel,
            (false, false) => TransitionKind::ConsonantConsonant,
        }
    }

    /// Map transition time `t` (0-1) to crossfade position (0-1).
    ///
    /// ```text
    /// CV: t < c ? t/c * 0.5 : 0.5 + (t-c)/v * 0.5
    /// VC: t < v ? t/v * 0.5 : 0.5 + (t-v)/c * 0.5
    /// VV, CC: t
    /// ```
    pub fn ratio(self, t: f32, consonant_ratio: f32, vowel_ratio: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let (first, second) = match self {
            TransitionKind::ConsonantVowel => (consonant_ratio, vowel_ratio),
            TransitionKind::VowelConsonant => (vowel_ratio, consonant_ratio),
            TransitionKind::VowelVowel | TransitionKind::ConsonantConsonant => return t,
        };
        let r = if t < first {
            t / first * 0.5
        } else {
            0.5 + (t - first) / second * 0.5
        };
        r.clamp(0.0, 1.0)
    }
}

/// `a * (1 - t^curve) + b * t^curve`.
#[inline]
pub fn crossfade(a: f32, b: f32, t: f32, curve: f32) -> f32 {
    let shaped = powf(t.clamp(0.0, 1.0), curve);
    a * (1.0 - shaped) + b * shaped
}

/// Two-sample polynomial band-limited step residual at phase `t`.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let n = t / dt;
        2.0 * n - n * n - 1.0
    } else if t > 1.0 - dt {
        let n = (t - 1.0) / dt;
        n * n + 2.0 * n + 1.0
    } else {
        0.0
    }
}

/// An in-flight move from one target to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiphoneTransition {
    /// Where the transition started.
    pub source: ArticulationTarget,
    /// Where it is heading.
    pub destination: ArticulationTarget,
    /// Phonetic shape.
    pub kind: TransitionKind,
    /// Elapsed fraction, 0-1.
    pub position: f32,
    /// Length in seconds.
    pub duration: f32,
}

impl DiphoneTransition {
    /// A transition at position 0.
    pub fn new(source: ArticulationTarget, destination: ArticulationTarget, duration: f32) -> Self {
        Self {
            source,
            destination,
            kind: TransitionKind::classify(&source, &destination),
            position: 0.0,
            duration,
        }
    }

    /// Crossfade position for the current time.
    pub fn ratio(&self, consonant_ratio: f32, vowel_ratio: f32) -> f32 {
        self.kind.ratio(self.position, consonant_ratio, vowel_ratio)
    }

    /// True once the destination has been reached.
    pub fn is_complete(&self) -> bool {
        self.position >= 1.0
    }

    /// Source side until the midpoint, destination after.
    pub fn sounding(&self, ratio: f32) -> &ArticulationTarget {
        if ratio < 0.5 { &self.source } else { &self.destination }
    }

    /// Interpolated formant centers and bandwidths at crossfade `ratio`.
    pub fn formants_at(&self, ratio: f32, curve: f32) -> ([f32; NUM_TARGET_FORMANTS], [f32; NUM_TARGET_FORMANTS]) {
        let a = &self.source.formants;
        let b = &self.destination.formants;
        let centers = core::array::from_fn(|i| crossfade(a.frequencies[i], b.frequencies[i], ratio, curve));
        let bandwidths = core::array::from_fn(|i| crossfade(a.bandwidths[i], b.bandwidths[i], ratio, curve));
        (centers, bandwidths)
    }
}

#[derive(Debug, Clone)]
struct Lane {
    settled: ArticulationTarget,
    transition: Option<DiphoneTransition>,
    bank: FormantBank<NUM_TARGET_FORMANTS>,
    noise: NoiseSource,
    saw_phase: f32,
    sounding: ArticulationTarget,
    burst_remaining: usize,
    primed: bool,
}

impl Lane {
    fn new(sample_rate: f32, seed: u32) -> Self {
        Self {
            settled: ArticulationTarget::SCHWA,
            transition: None,
            bank: FormantBank::new(sample_rate, COARTICULATION_MS),
            noise: NoiseSource::new(seed),
            saw_phase: 0.0,
            sounding: ArticulationTarget::SCHWA,
            burst_remaining: 0,
            primed: false,
        }
    }

    fn reset(&mut self) {
        self.settled = ArticulationTarget::SCHWA;
        self.transition = None;
        self.bank.reset();
        self.noise.reset();
        self.saw_phase = 0.0;
        self.sounding = ArticulationTarget::SCHWA;
        self.burst_remaining = 0;
        self.primed = false;
    }
}

/// Diphone synthesis method.
///
/// ```rust
/// use vocalis_synth::{ArticulationTarget, DiphoneMethod, SynthesisMethod, SynthesisParams};
///
/// let mut diphone = DiphoneMethod::new();
/// diphone.prepare(&SynthesisParams::default()).unwrap();
/// diphone.set_transition_duration(0.08);
///
/// let mut out = [0.0f32; 512];
/// diphone.process(140.0, 0.9, &ArticulationTarget::K, &mut out).unwrap();
/// diphone.process(140.0, 0.9, &ArticulationTarget::A_AH, &mut out).unwrap();
/// assert!(diphone.transition(0).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct DiphoneMethod {
    lanes: Vec<Lane>,
    sample_rate: f32,
    duration: f32,
    curve: f32,
    consonant_ratio: f32,
    vowel_ratio: f32,
    coarticulation: bool,
    burst_samples: usize,
    max_block_size: usize,
    anti_aliasing: bool,
    meter: CpuMeter,
}

impl DiphoneMethod {
    /// An unprepared method with default timing.
    pub fn new() -> Self {
        Self {
            lanes: Vec::new(),
            sample_rate: 48000.0,
            duration: DEFAULT_DURATION_SECONDS,
            curve: DEFAULT_CURVE,
            consonant_ratio: DEFAULT_CONSONANT_RATIO,
            vowel_ratio: DEFAULT_VOWEL_RATIO,
            coarticulation: true,
            burst_samples: (48000.0 * BURST_SECONDS) as usize,
            max_block_size: 0,
            anti_aliasing: true,
            meter: CpuMeter::new(48000.0),
        }
    }

    /// Transition length in seconds (0.01-1).
    pub fn set_transition_duration(&mut self, seconds: f32) {
        self.duration = seconds.clamp(0.01, 1.0);
    }

    /// Transition length in seconds.
    pub fn transition_duration(&self) -> f32 {
        self.duration
    }

    /// Crossfade curve exponent (0.1-3). 1 is linear.
    pub fn set_crossfade_curve(&mut self, curve: f32) {
        self.curve = curve.clamp(0.1, 3.0);
    }

    /// Crossfade curve exponent.
    pub fn crossfade_curve(&self) -> f32 {
        self.curve
    }

    /// Smooth formants through the coarticulation smoothers.
    pub fn set_coarticulation_enabled(&mut self, enabled: bool) {
        self.coarticulation = enabled;
    }

    /// Whether coarticulation smoothing is on.
    pub fn coarticulation_enabled(&self) -> bool {
        self.coarticulation
    }

    /// Consonant and vowel shares of CV/VC transitions. Both are clamped to
    /// 0.05-0.95 and then normalised to sum to 1.
    pub fn set_phase_ratios(&mut self, consonant_ratio: f32, vowel_ratio: f32) {
        let c = consonant_ratio.clamp(0.05, 0.95);
        let v = vowel_ratio.clamp(0.05, 0.95);
        self.consonant_ratio = c / (c + v);
        self.vowel_ratio = v / (c + v);
    }

    /// The in-flight transition on `lane`, if any.
    pub fn transition(&self, lane: usize) -> Option<&DiphoneTransition> {
        self.lanes.get(lane).and_then(|l| l.transition.as_ref())
    }

    fn start_transition(lane: &mut Lane, target: &ArticulationTarget, duration: f32, ratios: (f32, f32), curve: f32) {
        // Mid-transition retargets start from wherever the formants are now.
        let source = match &lane.transition {
            Some(t) => {
                let (centers, bandwidths) = t.formants_at(t.ratio(ratios.0, ratios.1), curve);
                t.destination.with_formants(FormantData::new(centers, bandwidths))
            }
            None => lane.settled,
        };
        lane.transition = Some(DiphoneTransition::new(source, *target, duration));
        lane.settled = *target;
    }
}

impl Default for DiphoneMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisMethod for DiphoneMethod {
    fn name(&self) -> &'static str {
        "diphone"
    }

    fn prepare(&mut self, params: &SynthesisParams) -> Result<(), SynthesisError> {
        params.validate()?;
        self.sample_rate = params.sample_rate;
        self.burst_samples = (params.sample_rate * BURST_SECONDS) as usize;
        self.max_block_size = params.max_block_size;
        self.anti_aliasing = params.enable_anti_aliasing;
        self.meter = CpuMeter::new(params.sample_rate);
        self.lanes = (0..params.max_voices)
            .map(|i| Lane::new(params.sample_rate, DEFAULT_NOISE_SEED.wrapping_add(i as u32)))
            .collect();
        tracing::info!(
            sample_rate = params.sample_rate,
            lanes = params.max_voices,
            max_block_size = params.max_block_size,
            anti_aliasing = params.enable_anti_aliasing,
            "diphone synthesis prepared"
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

        let ratios = (self.consonant_ratio, self.vowel_ratio);
        let curve = self.curve;
        let coarticulation = self.coarticulation;
        let step = 1.0 / (self.duration * self.sample_rate);
        let saw_inc = (frequency / self.sample_rate).clamp(0.0, 0.5);
        let burst_samples = self.burst_samples;
        let anti_aliasing = self.anti_aliasing;

        let state = &mut self.lanes[lane];
        if !state.primed {
            state.settled = *target;
            state.sounding = *target;
            state.bank.set_immediate(&target.formants.frequencies, &target.formants.bandwidths);
            if target.manner == Manner::Plosive {
                state.burst_remaining = burst_samples;
            }
            state.primed = true;
        } else if *target != state.settled {
            Self::start_transition(state, target, self.duration, ratios, curve);
        }

        for sample in output.iter_mut() {
            let mut sounding = state.settled;
            if let Some(transition) = state.transition.as_mut() {
                transition.position = (transition.position + step).min(1.0);
                let ratio = transition.ratio(ratios.0, ratios.1);
                sounding = *transition.sounding(ratio);

                if transition.is_complete() {
                    // Land exactly on the destination, not the last control-rate sample.
                    let formants = &transition.destination.formants;
                    if coarticulation {
                        state.bank.set_targets(&formants.frequencies, &formants.bandwidths);
                    } else {
                        state.bank.set_immediate(&formants.frequencies, &formants.bandwidths);
                    }
                    state.transition = None;
                } else if state.bank.due() {
                    let (centers, bandwidths) = transition.formants_at(ratio, curve);
                    if coarticulation {
                        state.bank.set_targets(&centers, &bandwidths);
                    } else {
                        state.bank.set_immediate(&centers, &bandwidths);
                    }
                }
            }

            if sounding != state.sounding {
                if sounding.manner == Manner::Plosive {
                    state.burst_remaining = burst_samples;
                }
                state.sounding = sounding;
            }

            let excitation = if sounding.manner == Manner::Plosive && state.burst_remaining > 0 {
                state.burst_remaining -= 1;
                state.noise.next_sample() * BURST_GAIN
            } else if sounding.manner == Manner::Fricative {
                state.noise.next_sample() * FRICATIVE_GAIN
            } else if sounding.is_voiced() {
                state.saw_phase += saw_inc;
                if state.saw_phase >= 1.0 {
                    state.saw_phase -= 1.0;
                }
                let naive = 2.0 * state.saw_phase - 1.0;
                if anti_aliasing {
                    naive - poly_blep(state.saw_phase, saw_inc)
                } else {
                    naive
                }
            } else {
                state.noise.next_sample() * UNVOICED_GAIN
            };

            state.bank.tick(&[1.0; NUM_TARGET_FORMANTS]);
            *sample = state.bank.process_parallel(excitation, &FORMANT_GAINS) * amplitude;
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

    fn prepared() -> DiphoneMethod {
        let mut method = DiphoneMethod::new();
        method
            .prepare(&SynthesisParams {
                max_voices: 2,
                max_block_size: 4800,
                ..SynthesisParams::default()
            })
            .expect("prepare");
        method
    }

    #[test]
    fn classification() {
        use ArticulationTarget as T;
        assert_eq!(TransitionKind::classify(&T::K, &T::A_AH), TransitionKind::ConsonantVowel);
        assert_eq!(TransitionKind::classify(&T::A_AH, &T::S), TransitionKind::VowelConsonant);
        assert_eq!(TransitionKind::classify(&T::I_EE, &T::U_OO), TransitionKind::VowelVowel);
        assert_eq!(TransitionKind::classify(&T::S, &T::T), TransitionKind::ConsonantConsonant);
        assert_eq!(TransitionKind::classify(&T::M, &T::A_AH), TransitionKind::VowelVowel, "nasals are vowel-like");
    }

    #[test]
    fn cv_timing() {
        let cv = TransitionKind::ConsonantVowel;
        assert!((cv.ratio(0.15, 0.3, 0.7) - 0.25).abs() < 1e-6);
        assert!((cv.ratio(0.3, 0.3, 0.7) - 0.5).abs() < 1e-6);
        assert!((cv.ratio(0.65, 0.3, 0.7) - 0.75).abs() < 1e-6);
        assert!((cv.ratio(1.0, 0.3, 0.7) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn vc_timing_is_mirrored() {
        let vc = TransitionKind::VowelConsonant;
        assert!((vc.ratio(0.35, 0.3, 0.7) - 0.25).abs() < 1e-6);
        assert!((vc.ratio(0.7, 0.3, 0.7) - 0.5).abs() < 1e-6);
        assert!((vc.ratio(0.85, 0.3, 0.7) - 0.75).abs() < 1e-6);
        assert_eq!(TransitionKind::VowelVowel.ratio(0.4, 0.3, 0.7), 0.4);
    }

    #[test]
    fn crossfade_curve() {
        assert_eq!(crossfade(100.0, 200.0, 0.0, 2.0), 100.0);
        assert_eq!(crossfade(100.0, 200.0, 1.0, 2.0), 200.0);
        assert!((crossfade(100.0, 200.0, 0.5, 1.0) - 150.0).abs() < 1e-4);
        assert!((crossfade(100.0, 200.0, 0.5, 2.0) - 125.0).abs() < 1e-4);
    }

    #[test]
    fn transition_runs_for_its_duration() {
        let mut method = prepared();
        method.set_transition_duration(0.1);
        let mut out = vec![0.0f32; 480];
        method.process(120.0, 1.0, &ArticulationTarget::I_EE, &mut out).expect("first");
        assert!(method.transition(0).is_none(), "first target has nothing to move from");

        method.process(120.0, 1.0, &ArticulationTarget::A_AH, &mut out).expect("second");
        let t = method.transition(0).expect("transition started");
        assert_eq!(t.kind, TransitionKind::VowelVowel);
        assert!((t.position - 0.1).abs() < 1e-3, "480 of 4800 samples, got {}", t.position);

        let mut rest = vec![0.0f32; 4400];
        method.process(120.0, 1.0, &ArticulationTarget::A_AH, &mut rest).expect("rest");
        assert!(method.transition(0).is_none(), "transition should be dropped at position 1");
        assert!(rest.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn completed_transition_lands_on_destination_formants() {
        let mut method = prepared();
        method.set_coarticulation_enabled(false);
        method.set_transition_duration(0.1);
        let mut out = vec![0.0f32; 480];
        method.process(120.0, 1.0, &ArticulationTarget::I_EE, &mut out).expect("ee");
        // 4801 samples: completion falls between two control-rate updates.
        let mut long = vec![0.0f32; 4801];
        let (head, tail) = long.split_at_mut(4800);
        method.process(120.0, 1.0, &ArticulationTarget::A_AH, head).expect("glide");
        method.process(120.0, 1.0, &ArticulationTarget::A_AH, tail).expect("settle");

        assert!(method.transition(0).is_none());
        let bank = &method.lanes[0].bank;
        for (i, &f) in ArticulationTarget::A_AH.formants.frequencies.iter().enumerate() {
            assert_eq!(bank.center(i), f, "formant {i} should sit on the destination");
        }
    }

    #[test]
    fn oversized_block_is_rejected_untouched() {
        let mut method = prepared();
        let mut out = vec![1.0f32; 4801];
        let err = method.process(120.0, 1.0, &ArticulationTarget::A_AH, &mut out).unwrap_err();
        assert_eq!(err, SynthesisError::CapacityExceeded { requested: 4801, capacity: 4800 });
        assert!(out.iter().all(|&s| s == 1.0));
        assert!(method.transition(0).is_none(), "a rejected render must not start a transition");
    }

    #[test]
    fn polyblep_softens_the_saw_reset() {
        assert_eq!(poly_blep(0.5, 0.01), 0.0);
        assert!((poly_blep(0.0, 0.01) + 1.0).abs() < 1e-6);
        assert!((poly_blep(0.9999, 0.01) - 1.0).abs() < 0.03);

        let render = |anti_aliasing: bool| {
            let mut method = DiphoneMethod::new();
            method
                .prepare(&SynthesisParams {
                    max_voices: 1,
                    enable_anti_aliasing: anti_aliasing,
                    ..SynthesisParams::default()
                })
                .expect("prepare");
            let mut out = vec![0.0f32; 512];
            method.process(2000.0, 1.0, &ArticulationTarget::A_AH, &mut out).expect("render");
            out
        };
        let smooth = render(true);
        let naive = render(false);
        assert_ne!(smooth, naive);
        assert!(smooth.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn retarget_mid_transition_starts_from_current_formants() {
        let mut method = prepared();
        method.set_transition_duration(0.1);
        let mut out = vec![0.0f32; 2400];
        method.process(120.0, 1.0, &ArticulationTarget::I_EE, &mut out).expect("ee");
        method.process(120.0, 1.0, &ArticulationTarget::A_AH, &mut out).expect("ah half");
        let mut short = vec![0.0f32; 16];
        method.process(120.0, 1.0, &ArticulationTarget::U_OO, &mut short).expect("oo");

        let t = method.transition(0).expect("retarget");
        let f1 = t.source.formants.frequencies[0];
        assert!(f1 > 270.0 && f1 < 730.0, "source F1 should be mid-glide, got {f1}");
        assert_eq!(t.destination, ArticulationTarget::U_OO);
    }

    #[test]
    fn setters_clamp() {
        let mut method = DiphoneMethod::new();
        method.set_transition_duration(5.0);
        assert_eq!(method.transition_duration(), 1.0);
        method.set_crossfade_curve(0.0);
        assert_eq!(method.crossfade_curve(), 0.1);
        method.set_coarticulation_enabled(false);
        assert!(!method.coarticulation_enabled());
    }

    #[test]
    fn plosive_onset_bursts() {
        let mut method = prepared();
        let mut out = vec![0.0f32; 480];
        method.process(100.0, 1.0, &ArticulationTarget::P, &mut out).expect("p");
        let energy: f32 = out.iter().map(|s| s * s).sum();
        assert!(energy > 1e-4, "plosive onset should carry a burst");
    }

    #[test]
    fn coarticulation_off_renders() {
        let mut method = prepared();
        method.set_coarticulation_enabled(false);
        let mut out = vec![0.0f32; 4800];
        method.process(150.0, 1.0, &ArticulationTarget::S, &mut out).expect("s");
        method.process(150.0, 1.0, &ArticulationTarget::E_EH, &mut out).expect("eh");
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(out.iter().any(|&s| s != 0.0));
    }
}
