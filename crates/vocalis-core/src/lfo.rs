//! Low-frequency sine oscillator for vibrato and pulsed phonation.

use core::f32::consts::TAU;
use libm::sinf;

/// Phase-accumulating sine LFO with output in `[-1, 1]`.
///
/// The voice manager runs one at control rate and turns its output into a
/// pitch ratio, so [`advance`](Self::advance) skips a whole control
/// interval in one step.
///
/// # Example
///
/// ```rust
/// use vocalis_core::Lfo;
///
/// let mut vibrato = Lfo::new(48000.0, 6.0);
/// let v = vibrato.next();
/// assert!((-1.0..=1.0).contains(&v));
///
/// // 16 samples later, evaluated once
/// let w = vibrato.advance(16);
/// assert!(w > v);
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new(48000.0, 1.0)
    }
}

impl Lfo {
    /// LFO at phase 0.
    ///
    /// # Arguments
    /// * `sample_rate` - Rate at which [`next`](Self::next) is called, in Hz
    /// * `freq_hz` - Oscillation rate in Hz
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: freq_hz / sample_rate,
            sample_rate,
        }
    }

    /// Set the rate in Hz. Negative rates are clamped to 0.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.phase_inc = freq_hz.max(0.0) / self.sample_rate;
    }

    /// Rate in Hz.
    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    /// Change the sample rate, keeping the rate in Hz.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let freq = self.frequency();
        self.sample_rate = sample_rate;
        self.phase_inc = freq / sample_rate;
    }

    /// Phase in `[0, 1)`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Restart at phase 0.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Value at the current phase, then step one sample.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f32 {
        let value = sinf(self.phase * TAU);
        self.advance(1);
        value
    }

    /// Skip `samples` samples and return the value at the new phase.
    ///
    /// # Arguments
    /// * `samples` - Number of samples to step over
    #[inline]
    pub fn advance(&mut self, samples: usize) -> f32 {
        self.phase += self.phase_inc * samples as f32;
        self.phase -= libm::floorf(self.phase);
        sinf(self.phase * TAU)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_completes_cycle() {
        let mut lfo = Lfo::new(1000.0, 10.0);
        let values: [f32; 100] = core::array::from_fn(|_| lfo.next());
        assert!(values[0].abs() < 1e-6);
        assert!((values[25] - 1.0).abs() < 1e-3, "quarter cycle should peak");
        assert!(lfo.phase() < 1e-4 || lfo.phase() > 0.9999, "should be back at phase 0");
    }

    #[test]
    fn advance_matches_repeated_next() {
        let mut stepped = Lfo::new(48000.0, 5.5);
        let mut skipped = stepped.clone();
        for _ in 0..160 {
            stepped.next();
        }
        let v = skipped.advance(160);
        assert!((stepped.phase() - skipped.phase()).abs() < 1e-5);
        assert!((-1.0..=1.0).contains(&v));
    }

    #[test]
    fn sample_rate_change_keeps_rate() {
        let mut lfo = Lfo::new(44100.0, 6.0);
        lfo.set_sample_rate(96000.0);
        assert!((lfo.frequency() - 6.0).abs() < 1e-4);
    }

    #[test]
    fn negative_rate_stops() {
        let mut lfo = Lfo::new(48000.0, 6.0);
        lfo.set_frequency(-3.0);
        assert_eq!(lfo.frequency(), 0.0);
    }
}
