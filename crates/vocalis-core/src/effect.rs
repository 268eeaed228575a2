//! The mono processing trait shared by filters and post effects.
//!
//! Resonators, the DC blocker, the reverb and the spectral enhancer all
//! implement [`Effect`].

/// A mono sample processor with resettable state.
///
/// # Example
///
/// ```rust
/// use vocalis_core::{DcBlocker, Effect, FormantResonator};
///
/// let mut resonator = FormantResonator::with_parameters(730.0, 80.0, 48000.0);
/// let mut dc = DcBlocker::new(48000.0);
///
/// let mut block = [0.5f32; 64];
/// resonator.process_block_inplace(&mut block);
/// dc.process_block_inplace(&mut block);
/// assert!(block.iter().all(|s| s.is_finite()));
/// ```
pub trait Effect {
    /// Process one sample.
    fn process(&mut self, input: f32) -> f32;

    /// Process `input` into `output`.
    ///
    /// Processes `min(input.len(), output.len())` samples.
    fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), output.len(), "block length mismatch");
        for (inp, out) in input.iter().zip(output.iter_mut()) {
            *out = self.process(*inp);
        }
    }

    /// Process a buffer in place.
    fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Recompute sample-rate dependent state.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Clear history without touching parameters.
    fn reset(&mut self);

    /// Delay introduced by the processor, in samples.
    fn latency_samples(&self) -> usize {
        0
    }
}
