//! Formant resonator: the atomic element of every formant bank.
//!
//! A single [`Biquad`] configured as an RBJ constant-peak band-pass from a
//! center frequency and a bandwidth. Coefficients are real and come from the
//! bilinear transform, so the pole radius is always inside the unit circle
//! for accepted parameters and `a2` stays in `(0, 1)`.

use core::f32::consts::PI;

use libm::{cosf, sinf, sqrtf};

use crate::Effect;
use crate::biquad::{Biquad, bandpass_coefficients};

/// Lowest Q the resonator accepts. Keeps `alpha < 1`, hence `a2 > 0`.
const MIN_Q: f32 = 0.55;

/// Highest center frequency as a fraction of the sample rate.
const MAX_CENTER_RATIO: f32 = 0.49;

/// Second-order band-pass resonator for one formant.
///
/// ## Parameters
/// - `center_hz`: resonance frequency, must be below Nyquist
/// - `bandwidth_hz`: -3 dB bandwidth; `Q = center / bandwidth`
///
/// # Example
///
/// ```rust
/// use vocalis_core::FormantResonator;
///
/// let mut f1 = FormantResonator::new();
/// assert!(f1.set_parameters(730.0, 80.0, 48000.0));
///
/// let [b0, _, _, _, a2] = f1.coefficients();
/// assert!(b0 > 0.0 && b0 < 1.0);
/// assert!(a2 > 0.0 && a2 < 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct FormantResonator {
    filter: Biquad,
    center_hz: f32,
    bandwidth_hz: f32,
    sample_rate: f32,
    valid: bool,
}

impl FormantResonator {
    /// Create an unconfigured resonator (passthrough).
    pub fn new() -> Self {
        Self {
            filter: Biquad::new(),
            center_hz: 0.0,
            bandwidth_hz: 0.0,
            sample_rate: 48000.0,
            valid: false,
        }
    }

    /// Create a resonator and configure it in one step.
    ///
    /// # Arguments
    /// * `center_hz` - Resonance frequency in Hz
    /// * `bandwidth_hz` - -3 dB bandwidth in Hz
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// Invalid arguments leave the resonator in passthrough, as with
    /// [`set_parameters`](Self::set_parameters).
    pub fn with_parameters(center_hz: f32, bandwidth_hz: f32, sample_rate: f32) -> Self {
        let mut resonator = Self::new();
        resonator.set_parameters(center_hz, bandwidth_hz, sample_rate);
        resonator
    }

    /// Recompute coefficients. History is kept so sweeps stay continuous.
    ///
    /// # Arguments
    /// * `center_hz` - Resonance frequency in Hz, below Nyquist
    /// * `bandwidth_hz` - -3 dB bandwidth in Hz
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// Returns `false` and falls back to passthrough when any argument is
    /// non-finite or non-positive, or the center is at or above Nyquist.
    /// Bandwidths wider than the center are narrowed to `Q = 0.55`.
    pub fn set_parameters(&mut self, center_hz: f32, bandwidth_hz: f32, sample_rate: f32) -> bool {
        self.center_hz = center_hz;
        self.bandwidth_hz = bandwidth_hz;
        self.sample_rate = sample_rate;

        let finite = center_hz.is_finite() && bandwidth_hz.is_finite() && sample_rate.is_finite();
        if !finite
            || center_hz <= 0.0
            || bandwidth_hz <= 0.0
            || sample_rate <= 0.0
            || center_hz >= sample_rate * 0.5
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(center_hz, bandwidth_hz, sample_rate, "resonator: invalid parameters, passthrough");
            self.filter.set_passthrough();
            self.valid = false;
            return false;
        }

        let center = center_hz.min(sample_rate * MAX_CENTER_RATIO);
        let q = (center / bandwidth_hz).max(MIN_Q);
        let (b0, b1, b2, a0, a1, a2) = bandpass_coefficients(center, q, sample_rate);
        self.filter.set_coefficients(b0, b1, b2, a0, a1, a2);
        self.valid = true;
        true
    }

    /// Normalized coefficients `[b0, b1, b2, a1, a2]`.
    pub fn coefficients(&self) -> [f32; 5] {
        self.filter.coefficients()
    }

    /// Magnitude response at `hz`, evaluated from the current coefficients.
    ///
    /// A passthrough resonator reports 1. Formant banks use this to level
    /// a series cascade, whose peak gain moves with every formant.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vocalis_core::FormantResonator;
    ///
    /// let f1 = FormantResonator::with_parameters(500.0, 60.0, 48000.0);
    /// assert!((f1.magnitude_at(500.0) - 1.0).abs() < 1e-3);
    /// assert!(f1.magnitude_at(5000.0) < 0.05);
    /// ```
    pub fn magnitude_at(&self, hz: f32) -> f32 {
        if !self.valid {
            return 1.0;
        }
        let [b0, b1, b2, a1, a2] = self.coefficients();
        let w = 2.0 * PI * hz / self.sample_rate;
        let (c1, s1) = (cosf(w), sinf(w));
        let (c2, s2) = (cosf(2.0 * w), sinf(2.0 * w));
        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = 1.0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);
        let den = sqrtf(den_re * den_re + den_im * den_im);
        if den <= f32::EPSILON {
            return 0.0;
        }
        sqrtf(num_re * num_re + num_im * num_im) / den
    }

    /// True when the last [`set_parameters`](Self::set_parameters) call was accepted.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Configured center frequency in Hz.
    pub fn center_hz(&self) -> f32 {
        self.center_hz
    }

    /// Configured bandwidth in Hz.
    pub fn bandwidth_hz(&self) -> f32 {
        self.bandwidth_hz
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.filter.process(input)
    }

    /// Filter a block in place.
    ///
    /// # Arguments
    /// * `buffer` - Samples to filter, overwritten with the output
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.filter.process(*sample);
        }
    }

    /// Clear the two-sample history without recomputing coefficients.
    pub fn reset(&mut self) {
        self.filter.clear();
    }
}

impl Default for FormantResonator {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for FormantResonator {
    fn process(&mut self, input: f32) -> f32 {
        self.filter.process(input)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.set_parameters(self.center_hz, self.bandwidth_hz, sample_rate);
    }

    fn reset(&mut self) {
        self.filter.clear();
    }
}
