//! Phase-locked subharmonic oscillator.
//!
//! The generator keeps its own fundamental phase accumulator and a tracked
//! subharmonic phase. Each sample a proportional-integral controller pulls
//! the subharmonic phase toward `fundamental_phase / ratio`, so the
//! subharmonic stays locked to the fundamental with bounded phase error for
//! arbitrarily long notes.
//!
//! The fundamental phase is kept wrapped to `[-pi, pi]`. To divide it by a
//! non-unit ratio the generator also counts wraps modulo the smallest cycle
//! count `m` for which `m / ratio` is an integer, so the target phase stays
//! continuous across wraps.

use core::f32::consts::{PI, TAU};
use libm::{roundf, sinf};

use crate::math::wrap_phase;

/// Default proportional gain.
pub const DEFAULT_KP: f32 = 0.1;

/// Default integral gain.
pub const DEFAULT_KI: f32 = 0.001;

/// Anti-windup bound on the integral term.
pub const INTEGRAL_LIMIT: f32 = 100.0;

/// Longest wrap cycle searched when reducing the ratio.
const MAX_WRAP_CYCLE: u32 = 64;

/// Phase-locked loop subharmonic generator.
///
/// `ratio` is a division ratio: 2.0 produces a subharmonic one octave below
/// the fundamental, 3.0 an octave and a fifth below, 0.5 an octave above.
///
/// # Example
///
/// ```rust
/// use vocalis_core::SubharmonicGenerator;
///
/// let mut pll = SubharmonicGenerator::new(48000.0);
/// pll.set_ratio(2.0);
/// pll.set_mix(1.0);
///
/// for _ in 0..48000 {
///     let _sub = pll.process(110.0);
/// }
/// assert!(pll.phase_error().abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct SubharmonicGenerator {
    sample_rate: f32,
    ratio: f32,
    mix: f32,
    kp: f32,
    ki: f32,

    fundamental_phase: f32,
    wrap_count: u32,
    wrap_cycle: u32,
    sub_phase: f32,
    integral: f32,
    phase_error: f32,
}

impl SubharmonicGenerator {
    /// Create a generator with ratio 2 and mix 0.3.
    pub fn new(sample_rate: f32) -> Self {
        let mut pll = Self {
            sample_rate,
            ratio: 2.0,
            mix: 0.3,
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            fundamental_phase: 0.0,
            wrap_count: 0,
            wrap_cycle: 1,
            sub_phase: 0.0,
            integral: 0.0,
            phase_error: 0.0,
        };
        pll.wrap_cycle = wrap_cycle_for(pll.ratio);
        pll
    }

    /// Set the division ratio, clamped to 0.1-16.
    pub fn set_ratio(&mut self, ratio: f32) {
        let ratio = if ratio.is_finite() { ratio.clamp(0.1, 16.0) } else { 2.0 };
        if ratio == self.ratio {
            return;
        }
        self.ratio = ratio;
        self.wrap_cycle = wrap_cycle_for(ratio);
        self.wrap_count %= self.wrap_cycle;

        #[cfg(feature = "tracing")]
        tracing::debug!(ratio, wrap_cycle = self.wrap_cycle, "pll: ratio changed");
    }

    /// Division ratio.
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Set the output level, 0-1.
    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Output level.
    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Override the controller gains.
    ///
    /// # Arguments
    /// * `kp` - Proportional gain applied to the wrapped phase error
    /// * `ki` - Integral gain; the accumulated error is bounded to avoid windup
    pub fn set_gains(&mut self, kp: f32, ki: f32) {
        self.kp = kp.clamp(0.0, 1.0);
        self.ki = ki.clamp(0.0, 0.1);
    }

    /// Update the sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Wrapped phase error measured on the most recent sample, radians.
    pub fn phase_error(&self) -> f32 {
        self.phase_error
    }

    /// Current subharmonic phase in `[-pi, pi]`.
    pub fn sub_phase(&self) -> f32 {
        self.sub_phase
    }

    /// Advance one sample locked to `fundamental_hz` and return the
    /// subharmonic sample scaled by the mix.
    ///
    /// # Arguments
    /// * `fundamental_hz` - Frequency the loop tracks this sample. It may
    ///   change every call; the loop re-locks within a few periods.
    #[inline]
    pub fn process(&mut self, fundamental_hz: f32) -> f32 {
        let increment = TAU * fundamental_hz / self.sample_rate;

        self.fundamental_phase += increment;
        if self.fundamental_phase > PI {
            self.fundamental_phase -= TAU;
            self.wrap_count = (self.wrap_count + 1) % self.wrap_cycle;
        }

        let unwrapped = self.fundamental_phase + TAU * self.wrap_count as f32;
        let target = wrap_phase(unwrapped / self.ratio);
        let error = wrap_phase(target - self.sub_phase);

        let correction = self.kp * error + self.ki * self.integral;
        self.integral = (self.integral + error).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);

        self.sub_phase = wrap_phase(self.sub_phase + increment / self.ratio + correction);
        self.phase_error = error;

        sinf(self.sub_phase) * self.mix
    }

    /// Fill `output` with samples locked to a constant fundamental.
    pub fn process_block(&mut self, fundamental_hz: f32, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.process(fundamental_hz);
        }
    }

    /// Clear phases, wrap count and controller state.
    pub fn reset(&mut self) {
        self.fundamental_phase = 0.0;
        self.wrap_count = 0;
        self.sub_phase = 0.0;
        self.integral = 0.0;
        self.phase_error = 0.0;
    }
}

/// Smallest `m` in `1..=64` such that `m / ratio` is (nearly) an integer.
fn wrap_cycle_for(ratio: f32) -> u32 {
    (1..=MAX_WRAP_CYCLE)
        .find(|&m| {
            let cycles = m as f32 / ratio;
            (cycles - roundf(cycles)).abs() < 1e-4 * cycles.max(1.0)
        })
        .unwrap_or(MAX_WRAP_CYCLE)
}
