//! Schroeder allpass used for reverb diffusion.

use crate::DelayLine;
use crate::flush_denormal;

/// Freeverb-style allpass section.
///
/// `out = d[n - N] - x[n]`, `d[n] = x[n] + d[n - N] * feedback`.
///
/// The reverb chains four of these after its comb bank to diffuse the tail.
///
/// # Example
///
/// ```rust
/// use vocalis_core::AllpassFilter;
///
/// let mut diffuser = AllpassFilter::new(556);
/// assert_eq!(diffuser.process(1.0), -1.0);
/// ```
#[derive(Debug, Clone)]
pub struct AllpassFilter {
    delay: DelayLine,
    feedback: f32,
}

impl AllpassFilter {
    /// Section with a delay of `delay_samples`, feedback 0.5.
    pub fn new(delay_samples: usize) -> Self {
        Self {
            delay: DelayLine::new(delay_samples),
            feedback: 0.5,
        }
    }

    /// Feedback, clamped to `[-0.99, 0.99]`.
    #[inline]
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(-0.99, 0.99);
    }

    /// Feedback.
    #[inline]
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// One sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delayed = self.delay.read();
        self.delay.write(flush_denormal(input + delayed * self.feedback));
        delayed - input
    }

    /// Zero the delay.
    pub fn clear(&mut self) {
        self.delay.clear();
    }
}
