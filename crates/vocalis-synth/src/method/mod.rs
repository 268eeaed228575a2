//! Synthesis methods.
//!
//! A [`SynthesisMethod`] turns a frequency, an amplitude and an
//! [`ArticulationTarget`] into mono samples for one voice. Per-voice state
//! lives in preallocated lanes, one per voice slot, so the same method
//! instance renders every voice without allocating.
//!
//! Three algorithms are provided, selected by name through the closed
//! [`Synthesizer`] enum:
//!
//! | Name | Type | Character |
//! |------|------|-----------|
//! | `"formant"` | [`FormantMethod`] | glottal or noise source into five resonators |
//! | `"diphone"` | [`DiphoneMethod`] | timed crossfades between consecutive targets |
//! | `"subharmonic"` | [`SubharmonicMethod`] | PLL-locked undertone for throat singing |
//!
//! # Example
//!
//! ```rust
//! use vocalis_synth::{ArticulationTarget, SynthesisMethod, SynthesisParams, Synthesizer};
//!
//! let mut method = Synthesizer::from_name("formant").expect("built-in method");
//! method.prepare(&SynthesisParams::default()).expect("prepare");
//!
//! let mut out = [0.0f32; 256];
//! method.process(220.0, 0.8, &ArticulationTarget::A_AH, &mut out).expect("render");
//! ```

mod bank;
pub mod diphone;
pub mod formant;
pub mod subharmonic;

pub use diphone::{DiphoneMethod, DiphoneTransition, TransitionKind};
pub use formant::{FormantMethod, FormantRouting};
pub use subharmonic::SubharmonicMethod;

use std::time::Instant;

use crate::articulation::ArticulationTarget;
use crate::error::SynthesisError;

/// Samples rendered per voice between mixing steps in
/// [`SynthesisMethod::process_batch`].
const BATCH_CHUNK: usize = 64;

/// Weight of the newest measurement in the running CPU average.
const CPU_AVERAGE_WEIGHT: f32 = 0.05;

/// Configuration handed to [`SynthesisMethod::prepare`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Longest block the host will request.
    pub max_block_size: usize,
    /// Number of voice lanes to preallocate.
    pub max_voices: usize,
    /// Band-limit the diphone sawtooth with PolyBLEP corrections.
    pub enable_anti_aliasing: bool,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            max_block_size: 512,
            max_voices: 60,
            enable_anti_aliasing: true,
        }
    }
}

impl SynthesisParams {
    /// Reject parameters no method can run with.
    pub fn validate(&self) -> Result<(), SynthesisError> {
        if !self.sample_rate.is_finite() || self.sample_rate < 8000.0 || self.sample_rate > 192_000.0 {
            return Err(SynthesisError::InvalidInput("sample rate outside 8-192 kHz"));
        }
        if self.max_block_size == 0 {
            return Err(SynthesisError::InvalidInput("max block size must be positive"));
        }
        if self.max_voices == 0 {
            return Err(SynthesisError::InvalidInput("max voices must be positive"));
        }
        Ok(())
    }
}

/// Outcome of a successful render call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderInfo {
    /// Render time as a fraction of the audio duration rendered.
    pub cpu_usage: f32,
}

/// Result of a render call.
pub type SynthesisResult = Result<RenderInfo, SynthesisError>;

/// Running counters for a method.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MethodStats {
    /// Smoothed CPU usage per voice render (0-1 is real time).
    pub average_cpu_usage: f32,
    /// Voice renders since the last reset.
    pub voices_processed: u64,
    /// Blocks started since the last reset.
    pub blocks_processed: u64,
}

/// A vocal synthesis algorithm.
///
/// Implementations are prepared once off the audio thread; after that every
/// method here is allocation-free.
pub trait SynthesisMethod {
    /// Lookup name, e.g. `"formant"`.
    fn name(&self) -> &'static str;

    /// Size lanes and buffers. Must be called before rendering; calling it
    /// again discards all voice state.
    fn prepare(&mut self, params: &SynthesisParams) -> Result<(), SynthesisError>;

    /// Number of prepared voice lanes (0 before [`prepare`](Self::prepare)).
    fn lanes(&self) -> usize;

    /// Longest render accepted, as passed to [`prepare`](Self::prepare).
    fn max_block_size(&self) -> usize;

    /// Render one voice into `output`, replacing its contents.
    ///
    /// ## Errors
    /// [`SynthesisError::InvalidInput`] when the method is unprepared or
    /// `lane` is out of range, [`SynthesisError::CapacityExceeded`] when
    /// `output` is longer than the prepared block size. Nothing is written
    /// in either case.
    fn process_voice(
        &mut self,
        lane: usize,
        frequency: f32,
        amplitude: f32,
        target: &ArticulationTarget,
        output: &mut [f32],
    ) -> SynthesisResult;

    /// Render on lane 0.
    fn process(
        &mut self,
        frequency: f32,
        amplitude: f32,
        target: &ArticulationTarget,
        output: &mut [f32],
    ) -> SynthesisResult {
        self.process_voice(0, frequency, amplitude, target, output)
    }

    /// Mark the start of a block of `num_samples` samples.
    fn begin_block(&mut self, _num_samples: usize) {}

    /// Render several voices centred into interleaved stereo.
    ///
    /// `output` receives `num_samples` frames (`2 * num_samples` values),
    /// each voice at equal level in both channels, scaled by
    /// `1 / lanes.len()`.
    ///
    /// ## Errors
    /// [`SynthesisError::InvalidInput`] when the method is unprepared, the
    /// slices differ in length, a lane is out of range or `output` is too
    /// short. [`SynthesisError::CapacityExceeded`] when `num_samples` is
    /// above the prepared block size. `output` is left untouched on error.
    fn process_batch(
        &mut self,
        lanes: &[usize],
        frequencies: &[f32],
        amplitudes: &[f32],
        targets: &[ArticulationTarget],
        output: &mut [f32],
        num_samples: usize,
    ) -> SynthesisResult {
        let voices = lanes.len();
        if self.lanes() == 0 {
            return Err(SynthesisError::InvalidInput("synthesis method not prepared"));
        }
        check_capacity(num_samples, self.max_block_size())?;
        if frequencies.len() != voices || amplitudes.len() != voices || targets.len() != voices {
            return Err(SynthesisError::InvalidInput("batch slices differ in length"));
        }
        if output.len() < num_samples * 2 {
            return Err(SynthesisError::InvalidInput("output shorter than two channels of num_samples"));
        }
        if lanes.iter().any(|&lane| lane >= self.lanes()) {
            return Err(SynthesisError::InvalidInput("voice lane out of range"));
        }

        self.begin_block(num_samples);
        let output = &mut output[..num_samples * 2];
        output.fill(0.0);
        if voices == 0 || num_samples == 0 {
            return Ok(RenderInfo::default());
        }

        let norm = 1.0 / voices as f32;
        let mut chunk = [0.0f32; BATCH_CHUNK];
        let mut cpu_usage = 0.0;
        let mut start = 0;

        while start < num_samples {
            let len = (num_samples - start).min(BATCH_CHUNK);
            let frames = &mut output[start * 2..(start + len) * 2];

            for v in 0..voices {
                let info = self.process_voice(lanes[v], frequencies[v], amplitudes[v], &targets[v], &mut chunk[..len])?;
                cpu_usage += info.cpu_usage * len as f32 / num_samples as f32;

                for (frame, &sample) in frames.chunks_exact_mut(2).zip(&chunk[..len]) {
                    frame[0] += sample * norm;
                    frame[1] += sample * norm;
                }
            }
            start += len;
        }

        Ok(RenderInfo { cpu_usage })
    }

    /// Clear every lane.
    fn reset(&mut self);

    /// Clear one lane. Out-of-range lanes are ignored.
    fn reset_voice(&mut self, lane: usize);

    /// Running counters.
    fn stats(&self) -> MethodStats;
}

/// CPU and render counters shared by the methods.
#[derive(Debug, Clone, Default)]
pub(crate) struct CpuMeter {
    sample_rate: f32,
    stats: MethodStats,
}

impl CpuMeter {
    pub(crate) fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            stats: MethodStats::default(),
        }
    }

    pub(crate) fn begin_block(&mut self) {
        self.stats.blocks_processed += 1;
    }

    /// Record a render of `samples` samples that started at `started`.
    pub(crate) fn record(&mut self, started: Instant, samples: usize) -> RenderInfo {
        let budget = samples as f32 / self.sample_rate;
        let cpu_usage = if budget > 0.0 {
            started.elapsed().as_secs_f32() / budget
        } else {
            0.0
        };
        let avg = &mut self.stats.average_cpu_usage;
        *avg += CPU_AVERAGE_WEIGHT * (cpu_usage - *avg);
        self.stats.voices_processed += 1;
        RenderInfo { cpu_usage }
    }

    pub(crate) fn stats(&self) -> MethodStats {
        self.stats
    }

    pub(crate) fn reset(&mut self) {
        self.stats = MethodStats::default();
    }
}

/// Check the common preconditions of `process_voice`.
pub(crate) fn check_render(lane: usize, lanes: usize, len: usize, capacity: usize) -> Result<(), SynthesisError> {
    if lanes == 0 {
        return Err(SynthesisError::InvalidInput("synthesis method not prepared"));
    }
    if lane >= lanes {
        return Err(SynthesisError::InvalidInput("voice lane out of range"));
    }
    check_capacity(len, capacity)
}

fn check_capacity(requested: usize, capacity: usize) -> Result<(), SynthesisError> {
    if requested > capacity {
        return Err(SynthesisError::CapacityExceeded { requested, capacity });
    }
    Ok(())
}

/// The built-in methods, resolved by name once and dispatched per voice
/// block.
#[derive(Debug)]
pub enum Synthesizer {
    /// Formant synthesis.
    Formant(FormantMethod),
    /// Diphone concatenation.
    Diphone(DiphoneMethod),
    /// Subharmonic (throat) synthesis.
    Subharmonic(Box<SubharmonicMethod>),
}

impl Synthesizer {
    /// Names accepted by [`from_name`](Self::from_name).
    pub const NAMES: [&'static str; 3] = ["formant", "diphone", "subharmonic"];

    /// Build an unprepared method by name.
    ///
    /// ## Errors
    /// [`SynthesisError::NotFound`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self, SynthesisError> {
        match name {
            "formant" => Ok(Synthesizer::Formant(FormantMethod::new())),
            "diphone" => Ok(Synthesizer::Diphone(DiphoneMethod::new())),
            "subharmonic" => Ok(Synthesizer::Subharmonic(Box::new(SubharmonicMethod::new()))),
            _ => Err(SynthesisError::unknown_method(name)),
        }
    }

    /// Like [`from_name`](Self::from_name), falling back to formant.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to formant synthesis");
            Synthesizer::Formant(FormantMethod::new())
        })
    }

    /// The subharmonic method, if selected.
    pub fn as_subharmonic_mut(&mut self) -> Option<&mut SubharmonicMethod> {
        match self {
            Synthesizer::Subharmonic(m) => Some(m.as_mut()),
            _ => None,
        }
    }

    /// The formant method, if selected.
    pub fn as_formant_mut(&mut self) -> Option<&mut FormantMethod> {
        match self {
            Synthesizer::Formant(m) => Some(m),
            _ => None,
        }
    }

    /// The diphone method, if selected.
    pub fn as_diphone_mut(&mut self) -> Option<&mut DiphoneMethod> {
        match self {
            Synthesizer::Diphone(m) => Some(m),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn SynthesisMethod {
        match self {
            Synthesizer::Formant(m) => m,
            Synthesizer::Diphone(m) => m,
            Synthesizer::Subharmonic(m) => m.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SynthesisMethod {
        match self {
            Synthesizer::Formant(m) => m,
            Synthesizer::Diphone(m) => m,
            Synthesizer::Subharmonic(m) => m.as_mut(),
        }
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Synthesizer::Formant(FormantMethod::new())
    }
}

impl SynthesisMethod for Synthesizer {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn prepare(&mut self, params: &SynthesisParams) -> Result<(), SynthesisError> {
        self.inner_mut().prepare(params)
    }

    fn lanes(&self) -> usize {
        self.inner().lanes()
    }

    fn max_block_size(&self) -> usize {
        self.inner().max_block_size()
    }

    #[inline]
    fn process_voice(
        &mut self,
        lane: usize,
        frequency: f32,
        amplitude: f32,
        target: &ArticulationTarget,
        output: &mut [f32],
    ) -> SynthesisResult {
        match self {
            Synthesizer::Formant(m) => m.process_voice(lane, frequency, amplitude, target, output),
            Synthesizer::Diphone(m) => m.process_voice(lane, frequency, amplitude, target, output),
            Synthesizer::Subharmonic(m) => m.process_voice(lane, frequency, amplitude, target, output),
        }
    }

    fn begin_block(&mut self, num_samples: usize) {
        self.inner_mut().begin_block(num_samples);
    }

    fn reset(&mut self) {
        self.inner_mut().reset();
    }

    fn reset_voice(&mut self, lane: usize) {
        self.inner_mut().reset_voice(lane);
    }

    fn stats(&self) -> MethodStats {
        self.inner().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(name: &str, voices: usize) -> Synthesizer {
        let mut method = Synthesizer::from_name(name).expect("known method");
        method
            .prepare(&SynthesisParams {
                max_voices: voices,
                ..SynthesisParams::default()
            })
            .expect("prepare");
        method
    }

    #[test]
    fn names_resolve() {
        for name in Synthesizer::NAMES {
            let method = Synthesizer::from_name(name).expect("built-in");
            assert_eq!(method.name(), name);
        }
    }

    #[test]
    fn unknown_name_is_not_found() {
        let err = Synthesizer::from_name("granular").unwrap_err();
        assert_eq!(err, SynthesisError::unknown_method("granular"));
        assert_eq!(Synthesizer::from_name_or_default("granular").name(), "formant");
    }

    #[test]
    fn params_validation() {
        assert!(SynthesisParams::default().validate().is_ok());
        let bad = SynthesisParams {
            max_block_size: 0,
            ..SynthesisParams::default()
        };
        assert!(bad.validate().is_err());
        let bad = SynthesisParams {
            sample_rate: f32::NAN,
            ..SynthesisParams::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn unprepared_method_rejects_render() {
        let mut method = Synthesizer::default();
        let mut out = [1.0f32; 32];
        let err = method.process(220.0, 1.0, &ArticulationTarget::A_AH, &mut out).unwrap_err();
        assert_eq!(err, SynthesisError::InvalidInput("synthesis method not prepared"));
        assert!(out.iter().all(|&s| s == 1.0), "output must be untouched");
    }

    #[test]
    fn batch_rejects_mismatched_lengths() {
        let mut method = prepared("formant", 4);
        let mut out = [0.0f32; 128];
        let result = method.process_batch(&[0, 1], &[220.0], &[1.0, 1.0], &[ArticulationTarget::A_AH; 2], &mut out, 64);
        assert!(matches!(result, Err(SynthesisError::InvalidInput(_))));

        let result = method.process_batch(&[7], &[220.0], &[1.0], &[ArticulationTarget::A_AH], &mut out, 64);
        assert_eq!(result, Err(SynthesisError::InvalidInput("voice lane out of range")));
    }

    #[test]
    fn every_method_rejects_oversized_blocks() {
        for name in Synthesizer::NAMES {
            let mut method = prepared(name, 2);
            assert_eq!(method.max_block_size(), 512);

            let mut out = vec![1.0f32; 513];
            let err = method.process(220.0, 1.0, &ArticulationTarget::A_AH, &mut out).unwrap_err();
            assert_eq!(err, SynthesisError::CapacityExceeded { requested: 513, capacity: 512 }, "{name}");
            assert!(out.iter().all(|&s| s == 1.0), "{name} wrote into a rejected block");

            let mut interleaved = vec![1.0f32; 2 * 513];
            let err = method
                .process_batch(&[0, 1], &[220.0, 330.0], &[1.0, 1.0], &[ArticulationTarget::A_AH; 2], &mut interleaved, 513)
                .unwrap_err();
            assert_eq!(err, SynthesisError::CapacityExceeded { requested: 513, capacity: 512 }, "{name}");
            assert!(interleaved.iter().all(|&s| s == 1.0), "{name} batch wrote into a rejected block");
            assert_eq!(method.stats().blocks_processed, 0, "{name} started a rejected block");

            let mut exact = vec![0.0f32; 512];
            method.process(220.0, 1.0, &ArticulationTarget::A_AH, &mut exact).expect("full block");
        }
    }

    #[test]
    fn unprepared_batch_is_rejected() {
        let mut method = Synthesizer::from_name("diphone").expect("known method");
        let mut out = [1.0f32; 64];
        let err = method
            .process_batch(&[], &[], &[], &[], &mut out, 32)
            .unwrap_err();
        assert_eq!(err, SynthesisError::InvalidInput("synthesis method not prepared"));
        assert!(out.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn batch_of_one_equals_single_voice() {
        let mut batch = prepared("formant", 2);
        let mut single = prepared("formant", 2);

        let mut interleaved = vec![0.0f32; 400];
        batch
            .process_batch(&[1], &[196.0], &[0.7], &[ArticulationTarget::O_OH], &mut interleaved, 200)
            .expect("batch");
        let mut mono = vec![0.0f32; 200];
        single
            .process_voice(1, 196.0, 0.7, &ArticulationTarget::O_OH, &mut mono)
            .expect("single");

        for i in 0..200 {
            assert!((interleaved[2 * i] - mono[i]).abs() < 1e-6, "left {i}");
            assert!((interleaved[2 * i + 1] - mono[i]).abs() < 1e-6, "right {i}");
        }
    }

    #[test]
    fn batch_normalises_by_voice_count() {
        let mut batch = prepared("formant", 4);
        let mut single = prepared("formant", 4);
        let targets = [ArticulationTarget::A_AH; 2];

        let mut interleaved = vec![0.0f32; 256];
        batch
            .process_batch(&[0, 1], &[220.0, 220.0], &[0.5, 0.5], &targets, &mut interleaved, 128)
            .expect("batch");
        let mut mono = vec![0.0f32; 128];
        single
            .process_voice(0, 220.0, 0.5, &ArticulationTarget::A_AH, &mut mono)
            .expect("single");

        // Identical voices on fresh lanes average back to one voice.
        for i in 0..128 {
            assert!((interleaved[2 * i] - mono[i]).abs() < 1e-5, "frame {i}");
        }
    }

    #[test]
    fn stats_count_renders_and_blocks() {
        let mut method = prepared("diphone", 2);
        let mut out = vec![0.0f32; 128];
        method
            .process_batch(&[0, 1], &[110.0, 165.0], &[1.0, 1.0], &[ArticulationTarget::E_EH; 2], &mut out, 64)
            .expect("batch");
        let stats = method.stats();
        assert_eq!(stats.blocks_processed, 1);
        assert_eq!(stats.voices_processed, 2);

        method.reset();
        assert_eq!(method.stats(), MethodStats::default());
    }
}
