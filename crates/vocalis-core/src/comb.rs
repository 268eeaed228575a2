//! Damped feedback comb, the Freeverb tail element.

use crate::DelayLine;
use crate::flush_denormal;

/// Feedback comb with a one-pole low-pass in the loop.
///
/// ```text
/// y[n]   = d[n - N]
/// lp[n]  = y[n] * (1 - damp) + lp[n-1] * damp
/// d[n]   = x[n] + lp[n] * feedback
/// ```
///
/// Feedback is allowed up to 1.0 so a frozen reverb can hold its tail; with
/// `damp = 0` the loop gain is then exactly one.
///
/// # Example
///
/// ```rust
/// use vocalis_core::CombFilter;
///
/// let mut comb = CombFilter::new(1116);
/// comb.set_feedback(0.84);
/// comb.set_damp(0.2);
/// let _ = comb.process(1.0);
/// ```
#[derive(Debug, Clone)]
pub struct CombFilter {
    delay: DelayLine,
    feedback: f32,
    damp1: f32,
    damp2: f32,
    filterstore: f32,
}

impl CombFilter {
    /// Comb with a delay of `delay_samples`.
    pub fn new(delay_samples: usize) -> Self {
        Self {
            delay: DelayLine::new(delay_samples),
            feedback: 0.5,
            damp1: 0.5,
            damp2: 0.5,
            filterstore: 0.0,
        }
    }

    /// Loop feedback, clamped to `[0, 1]`.
    #[inline]
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 1.0);
    }

    /// Loop feedback.
    #[inline]
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// High-frequency damping in the loop, 0 (bright) to 1 (dark).
    #[inline]
    pub fn set_damp(&mut self, damp: f32) {
        self.damp1 = damp.clamp(0.0, 1.0);
        self.damp2 = 1.0 - self.damp1;
    }

    /// Damping.
    #[inline]
    pub fn damp(&self) -> f32 {
        self.damp1
    }

    /// Feed one sample through the loop and return the delayed output.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.delay.read();
        self.filterstore = flush_denormal(output * self.damp2 + self.filterstore * self.damp1);
        self.delay.write(input + self.filterstore * self.feedback);
        output
    }

    /// Zero the delay and the damping state.
    pub fn clear(&mut self) {
        self.delay.clear();
        self.filterstore = 0.0;
    }

    /// Delay length in samples.
    pub fn len(&self) -> usize {
        self.delay.len()
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        false
    }
}
