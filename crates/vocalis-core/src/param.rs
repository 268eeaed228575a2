//! Exponential parameter smoothing.
//!
//! Every control that reaches the audio path (formant frequencies, gains,
//! envelope times, reverb controls) goes through a [`SmoothedParam`] so that
//! target changes turn into ramps instead of steps.
//!
//! ## Usage
//!
//! ```rust
//! use vocalis_core::SmoothedParam;
//!
//! let mut f1 = SmoothedParam::with_config(500.0, 48000.0, 50.0);
//! f1.set_target(730.0);
//!
//! for _ in 0..480 {
//!     let _hz = f1.advance();
//! }
//! assert!(f1.get() > 500.0 && f1.get() < 730.0);
//! ```

use libm::{expf, powf};

/// A one-pole exponential smoother.
///
/// Each call to [`advance`](Self::advance) moves the current value a fixed
/// fraction of the remaining distance toward the target:
///
/// ```text
/// current += coeff * (target - current)
/// coeff    = 1 - exp(-1 / (tau * sample_rate))
/// ```
///
/// `tau` is the time constant. After `5 * tau` the value is within 1% of the
/// target at any sample rate.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    time_constant_ms: f32,
}

impl SmoothedParam {
    /// Create a parameter at `initial` with smoothing disabled.
    ///
    /// Call [`set_sample_rate`](Self::set_sample_rate) and
    /// [`set_time_constant_ms`](Self::set_time_constant_ms) to enable ramps.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 48000.0,
            time_constant_ms: 0.0,
        }
    }

    /// Create a parameter with sample rate and time constant configured.
    ///
    /// # Arguments
    /// * `initial` - Starting value (current and target)
    /// * `sample_rate` - Sample rate in Hz
    /// * `time_constant_ms` - Time constant in milliseconds
    pub fn with_config(initial: f32, sample_rate: f32, time_constant_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.time_constant_ms = time_constant_ms;
        param.recalculate_coeff();
        param
    }

    /// Set the value to ramp toward.
    ///
    /// The current value is untouched; it moves on the next
    /// [`advance`](Self::advance) or [`advance_by`](Self::advance_by).
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Set the target and jump to it without ramping.
    ///
    /// Used on reset and preset load.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Update the sample rate, keeping the time constant.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Set the time constant in milliseconds. Zero disables smoothing.
    pub fn set_time_constant_ms(&mut self, time_ms: f32) {
        self.time_constant_ms = time_ms.max(0.0);
        self.recalculate_coeff();
    }

    /// Time constant in milliseconds.
    pub fn time_constant_ms(&self) -> f32 {
        self.time_constant_ms
    }

    /// Advance by one sample and return the new value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Advance by `samples` samples at once and return the new value.
    ///
    /// Uses the closed form `target + (current - target) * (1 - coeff)^n`,
    /// so block-rate callers land on the same value as `n` calls to
    /// [`advance`](Self::advance) (up to rounding).
    #[inline]
    pub fn advance_by(&mut self, samples: usize) -> f32 {
        if samples == 0 {
            return self.current;
        }
        let remaining = powf(1.0 - self.coeff, samples as f32);
        self.current = self.target + (self.current - self.target) * remaining;
        self.current
    }

    /// Current smoothed value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Value being ramped toward.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the current value is within `1e-6` of the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    /// Jump to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    fn recalculate_coeff(&mut self) {
        if self.time_constant_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.time_constant_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
