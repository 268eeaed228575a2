//! First-order DC blocker.
//!
//! `H(z) = (1 - z^-1) / (1 - R z^-1)`. Glottal pulses are unipolar, so every
//! excitation path ends here before it reaches the mixer.

use core::f32::consts::PI;

use crate::Effect;

/// DC blocking high-pass.
///
/// The -3 dB point is `fc = (1 - R) * fs / (2 * pi)`; [`DcBlocker::new`]
/// places it near 7 Hz.
///
/// ## Example
///
/// ```rust
/// use vocalis_core::DcBlocker;
///
/// let mut blocker = DcBlocker::new(48000.0);
/// let mut last = 0.0;
/// for _ in 0..48000 {
///     last = blocker.process(0.4);
/// }
/// assert!(last.abs() < 0.01);
/// ```
#[derive(Debug, Clone)]
pub struct DcBlocker {
    coeff: f32,
    x_prev: f32,
    y_prev: f32,
}

impl DcBlocker {
    const DEFAULT_CUTOFF_HZ: f32 = 7.0;

    /// Blocker with a ~7 Hz cutoff at `sample_rate`.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_coeff(Self::coeff_for(Self::DEFAULT_CUTOFF_HZ, sample_rate))
    }

    /// Blocker with an explicit pole `R`, clamped to `[0.9, 0.9999]`.
    pub fn with_coeff(coeff: f32) -> Self {
        Self {
            coeff: coeff.clamp(0.9, 0.9999),
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    /// `y[n] = x[n] - x[n-1] + R * y[n-1]`
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = input - self.x_prev + self.coeff * self.y_prev;
        self.x_prev = input;
        self.y_prev = output;
        output
    }

    /// Pole position.
    pub fn coeff(&self) -> f32 {
        self.coeff
    }

    /// Zero the history.
    pub fn reset(&mut self) {
        self.x_prev = 0.0;
        self.y_prev = 0.0;
    }

    fn coeff_for(cutoff_hz: f32, sample_rate: f32) -> f32 {
        (1.0 - 2.0 * PI * cutoff_hz / sample_rate).clamp(0.9, 0.9999)
    }
}

impl Effect for DcBlocker {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        DcBlocker::process(self, input)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff = Self::coeff_for(Self::DEFAULT_CUTOFF_HZ, sample_rate);
    }

    fn reset(&mut self) {
        DcBlocker::reset(self);
    }
}
