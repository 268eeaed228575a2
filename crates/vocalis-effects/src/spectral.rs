//! STFT spectral contrast enhancer.
//!
//! Overlap-add at 50% hop with square-root Hann windows on both analysis
//! and synthesis, so the squared window sums to one and the unmodified path
//! reconstructs the input exactly (delayed by the FFT size).
//!
//! Each frame boosts bins that stand above the mean magnitude and cuts
//! those below it, then applies a gentle rising tilt:
//!
//! ```text
//! gain[k] = clamp((|X[k]| / mean)^(amount / 2), 0.25, 4) * (1 + amount * k / (N/2) * 0.5)
//! ```

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use vocalis_core::Effect;

/// Default FFT size.
pub const DEFAULT_FFT_SIZE: usize = 1024;

/// Smallest accepted FFT size.
pub const MIN_FFT_SIZE: usize = 64;

/// Largest accepted FFT size.
pub const MAX_FFT_SIZE: usize = 8192;

const MIN_GAIN: f32 = 0.25;
const MAX_GAIN: f32 = 4.0;

/// Round `size` up to a power of two within `[MIN_FFT_SIZE, MAX_FFT_SIZE]`.
pub fn normalize_fft_size(size: usize) -> usize {
    size.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE).next_power_of_two()
}

/// Forward and inverse plans for one FFT size.
///
/// Plans are immutable and shared by every enhancer of that size, so a
/// method with one enhancer per voice plans once.
#[derive(Clone)]
pub struct FftPlans {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    size: usize,
}

impl FftPlans {
    /// Plan both directions for `size` (normalized with [`normalize_fft_size`]).
    pub fn new(size: usize) -> Self {
        let size = normalize_fft_size(size);
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
            size,
        }
    }

    /// FFT length.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl std::fmt::Debug for FftPlans {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftPlans").field("size", &self.size).finish()
    }
}

/// Streaming spectral contrast enhancer.
///
/// ## Parameters
/// - `amount`: 0 (transparent) to 1 (strongest contrast and tilt)
///
/// Latency equals the FFT size. All buffers are allocated at construction.
///
/// # Example
///
/// ```rust
/// use vocalis_core::Effect;
/// use vocalis_effects::SpectralEnhancer;
///
/// let mut enhancer = SpectralEnhancer::new(512);
/// enhancer.set_amount(0.6);
/// assert_eq!(enhancer.latency_samples(), 512);
///
/// let input = [0.1f32; 1024];
/// let mut output = [0.0f32; 1024];
/// enhancer.process_block(&input, &mut output);
/// ```
#[derive(Debug, Clone)]
pub struct SpectralEnhancer {
    plans: FftPlans,
    window: Vec<f32>,
    input: Vec<f32>,
    accum: Vec<f32>,
    output: Vec<f32>,
    frame: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    gains: Vec<f32>,
    pos: usize,
    amount: f32,
}

impl SpectralEnhancer {
    /// Enhancer with its own plans.
    pub fn new(fft_size: usize) -> Self {
        Self::with_plans(FftPlans::new(fft_size))
    }

    /// Enhancer reusing existing plans.
    pub fn with_plans(plans: FftPlans) -> Self {
        let n = plans.size;
        let hop = n / 2;
        let scratch_len = plans
            .forward
            .get_inplace_scratch_len()
            .max(plans.inverse.get_inplace_scratch_len());

        let window = (0..n)
            .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos())).sqrt())
            .collect();

        Self {
            plans,
            window,
            input: vec![0.0; n],
            accum: vec![0.0; n],
            output: vec![0.0; hop],
            frame: vec![Complex::new(0.0, 0.0); n],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            gains: vec![1.0; hop + 1],
            pos: 0,
            amount: 0.5,
        }
    }

    /// FFT length.
    pub fn fft_size(&self) -> usize {
        self.plans.size
    }

    /// Set enhancement amount, clamped to 0-1.
    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, 1.0);
    }

    /// Enhancement amount.
    pub fn amount(&self) -> f32 {
        self.amount
    }

    fn process_frame(&mut self) {
        let n = self.plans.size;
        let half = n / 2;

        for ((bin, &x), &w) in self.frame.iter_mut().zip(&self.input).zip(&self.window) {
            *bin = Complex::new(x * w, 0.0);
        }
        self.plans
            .forward
            .process_with_scratch(&mut self.frame, &mut self.scratch);

        if self.amount > 0.0 {
            self.shape_spectrum(half);
        }

        self.plans
            .inverse
            .process_with_scratch(&mut self.frame, &mut self.scratch);

        let norm = 1.0 / n as f32;
        for ((acc, bin), &w) in self.accum.iter_mut().zip(&self.frame).zip(&self.window) {
            *acc += bin.re * w * norm;
        }

        self.output.copy_from_slice(&self.accum[..half]);
        self.accum.copy_within(half.., 0);
        self.accum[half..].fill(0.0);
        self.input.copy_within(half.., 0);
    }

    fn shape_spectrum(&mut self, half: usize) {
        let n = self.plans.size;
        let mean = self.frame[..=half].iter().map(|c| c.norm()).sum::<f32>() / (half + 1) as f32;
        if mean <= 1e-12 {
            return;
        }

        let exponent = self.amount * 0.5;
        for (k, gain) in self.gains.iter_mut().enumerate() {
            let contrast = (self.frame[k].norm() / mean).powf(exponent).clamp(MIN_GAIN, MAX_GAIN);
            let tilt = 1.0 + self.amount * k as f32 / half as f32 * 0.5;
            *gain = contrast * tilt;
        }

        self.frame[0] *= self.gains[0];
        self.frame[half] *= self.gains[half];
        for k in 1..half {
            let g = self.gains[k];
            self.frame[k] *= g;
            self.frame[n - k] *= g;
        }
    }
}

impl Effect for SpectralEnhancer {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let half = self.plans.size / 2;
        let out = self.output[self.pos];
        self.input[half + self.pos] = input;
        self.pos += 1;
        if self.pos == half {
            self.pos = 0;
            self.process_frame();
        }
        out
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {
        self.input.fill(0.0);
        self.accum.fill(0.0);
        self.output.fill(0.0);
        self.pos = 0;
    }

    fn latency_samples(&self) -> usize {
        self.plans.size
    }
}
