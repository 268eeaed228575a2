//! Glottal excitation source.
//!
//! Periodic pulse trains modelling airflow through the vocal folds. The
//! pulse is defined over one normalized period `t` in `[0, 1)`:
//!
//! | Segment | Span | Shape |
//! |---------|------|-------|
//! | opening | `0 .. OQ` | rising half cosine (Rosenberg) or power curve (LF) |
//! | return  | `OQ .. t_return` | exponential decay |
//! | closed  | `t_return .. 1` | zero |
//!
//! `OQ` is the open quotient. The speed quotient sets how much of the
//! remaining period the Rosenberg return takes; the return phase sets how
//! early the LF return ends.

use core::f32::consts::PI;
use libm::{cosf, expf, powf};

/// Frequency range accepted by [`GlottalSource::set_frequency`].
pub const GLOTTAL_FREQ_RANGE: (f32, f32) = (20.0, 1000.0);

/// Sample-rate range accepted by [`GlottalSource::set_sample_rate`].
pub const GLOTTAL_SAMPLE_RATE_RANGE: (f32, f32) = (8000.0, 192_000.0);

/// Step used for the numeric derivative of the differentiated model.
const DERIVATIVE_STEP: f32 = 0.001;

/// Output scale of the differentiated model.
const DERIVATIVE_SCALE: f32 = 0.1;

/// Flow level at the LF closing instant; the return phase decays from here.
const LF_RETURN_LEVEL: f32 = 0.1;

/// Pulse model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GlottalModel {
    /// Half-cosine rise to full flow at `open_quotient`, then an
    /// exponential fall that reaches zero a `speed_quotient` share of the
    /// closed phase later.
    #[default]
    Rosenberg,
    /// Liljencrants-Fant style asymmetric pulse.
    Lf,
    /// Numeric derivative of the Rosenberg flow.
    Differentiated,
}

/// Pulse shape controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseShape {
    /// Open quotient, 0.1 to 0.9.
    pub open_quotient: f32,
    /// Speed quotient, 0.1 to 0.9.
    pub speed_quotient: f32,
    /// Return phase, 0.0 to 0.5.
    pub return_phase: f32,
}

impl PulseShape {
    /// Build a shape with every field clamped to its range.
    pub fn new(open_quotient: f32, speed_quotient: f32, return_phase: f32) -> Self {
        Self {
            open_quotient: open_quotient.clamp(0.1, 0.9),
            speed_quotient: speed_quotient.clamp(0.1, 0.9),
            return_phase: return_phase.clamp(0.0, 0.5),
        }
    }
}

impl Default for PulseShape {
    fn default() -> Self {
        Self::new(0.6, 0.3, 0.1)
    }
}

/// Periodic glottal pulse generator.
///
/// # Example
///
/// ```rust
/// use vocalis_core::{GlottalModel, GlottalSource};
///
/// let mut source = GlottalSource::new(48000.0);
/// source.set_frequency(110.0);
/// source.set_model(GlottalModel::Lf);
///
/// let mut block = [0.0f32; 256];
/// source.process_block(&mut block);
/// assert!(block.iter().all(|s| s.is_finite()));
/// ```
#[derive(Debug, Clone)]
pub struct GlottalSource {
    model: GlottalModel,
    shape: PulseShape,
    frequency: f32,
    sample_rate: f32,
    phase: f32,
    phase_inc: f32,
}

impl GlottalSource {
    /// Create a Rosenberg source at 110 Hz.
    pub fn new(sample_rate: f32) -> Self {
        let mut source = Self {
            model: GlottalModel::Rosenberg,
            shape: PulseShape::default(),
            frequency: 110.0,
            sample_rate: sample_rate.clamp(GLOTTAL_SAMPLE_RATE_RANGE.0, GLOTTAL_SAMPLE_RATE_RANGE.1),
            phase: 0.0,
            phase_inc: 0.0,
        };
        source.update_increment();
        source
    }

    /// Select the pulse model.
    pub fn set_model(&mut self, model: GlottalModel) {
        self.model = model;
    }

    /// Current pulse model.
    pub fn model(&self) -> GlottalModel {
        self.model
    }

    /// Set the fundamental, clamped to 20-1000 Hz.
    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency = hz.clamp(GLOTTAL_FREQ_RANGE.0, GLOTTAL_FREQ_RANGE.1);
        self.update_increment();
    }

    /// Fundamental in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Set the sample rate, clamped to 8-192 kHz.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.clamp(GLOTTAL_SAMPLE_RATE_RANGE.0, GLOTTAL_SAMPLE_RATE_RANGE.1);
        self.update_increment();
    }

    /// Set the pulse shape.
    ///
    /// # Arguments
    /// * `open_quotient` - Fraction of the period before closure, 0.1-0.9
    /// * `speed_quotient` - Length (Rosenberg) or steepness (LF) of the
    ///   post-closure decay, 0.1-0.9
    /// * `return_phase` - LF only: trims the decay short of the period end,
    ///   0.0-0.5
    ///
    /// Out-of-range values are clamped, see [`PulseShape::new`].
    pub fn set_pulse_shape(&mut self, open_quotient: f32, speed_quotient: f32, return_phase: f32) {
        self.shape = PulseShape::new(open_quotient, speed_quotient, return_phase);
    }

    /// Current pulse shape.
    pub fn pulse_shape(&self) -> PulseShape {
        self.shape
    }

    /// Phase within the period, `[0, 1)`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Next output sample.
    ///
    /// Rosenberg and LF pulses are unipolar (flow, `[0, 1]`); the
    /// differentiated model is bipolar. Feed unipolar output through a
    /// [`DcBlocker`](crate::DcBlocker) before resonators.
    #[inline]
    pub fn process(&mut self) -> f32 {
        let sample = self.pulse_at(self.phase);
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }

    /// Fill `output` with consecutive samples.
    pub fn process_block(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = self.process();
        }
    }

    /// Restart at phase zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Pulse value at normalized period position `t`.
    ///
    /// # Arguments
    /// * `t` - Position within the period, `[0, 1)`
    ///
    /// # Example
    ///
    /// ```rust
    /// use vocalis_core::GlottalSource;
    ///
    /// let source = GlottalSource::new(48000.0);
    /// let open = source.pulse_shape().open_quotient;
    /// assert!(source.pulse_at(0.0).abs() < 1e-6);
    /// assert!(source.pulse_at(open * 0.5) > 0.4);
    /// assert_eq!(source.pulse_at(0.999), 0.0);
    /// ```
    pub fn pulse_at(&self, t: f32) -> f32 {
        match self.model {
            GlottalModel::Rosenberg => rosenberg(t, self.shape),
            GlottalModel::Lf => liljencrants_fant(t, self.shape),
            GlottalModel::Differentiated => {
                let ahead = rosenberg(t + DERIVATIVE_STEP, self.shape);
                (ahead - rosenberg(t, self.shape)) / DERIVATIVE_STEP * DERIVATIVE_SCALE
            }
        }
    }

    fn update_increment(&mut self) {
        self.phase_inc = self.frequency / self.sample_rate;
    }
}

fn rosenberg(t: f32, shape: PulseShape) -> f32 {
    let t_open = shape.open_quotient;
    let t_return = t_open + (1.0 - t_open) * shape.speed_quotient;

    if t < t_open {
        0.5 * (1.0 - cosf(PI * t / t_open))
    } else if t < t_return {
        expf(-3.0 * (t - t_open) / (t_return - t_open))
    } else {
        0.0
    }
}

fn liljencrants_fant(t: f32, shape: PulseShape) -> f32 {
    let t_open = shape.open_quotient;
    let t_peak = t_open * 0.7;
    let t_return = t_open + (1.0 - t_open) * (1.0 - shape.return_phase);
    let alpha = 1.0 / (t_open * t_open);
    let epsilon = 1.0 / ((1.0 - t_open) * shape.speed_quotient);

    if t < t_peak {
        powf(t / t_peak, alpha)
    } else if t < t_open {
        let fall = powf(1.0 - (t - t_peak) / (t_open - t_peak), alpha);
        LF_RETURN_LEVEL + (1.0 - LF_RETURN_LEVEL) * fall
    } else if t < t_return {
        LF_RETURN_LEVEL * expf(-epsilon * (t - t_open) / (t_return - t_open))
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_period(source: &mut GlottalSource) -> ([f32; 480], usize) {
        source.reset();
        let period = (source.sample_rate / source.frequency()) as usize;
        let mut buf = [0.0; 480];
        for s in buf.iter_mut().take(period) {
            *s = source.process();
        }
        (buf, period)
    }

    #[test]
    fn frequency_and_rate_are_clamped() {
        let mut source = GlottalSource::new(1000.0);
        assert_eq!(source.sample_rate, 8000.0);
        source.set_frequency(5.0);
        assert_eq!(source.frequency(), 20.0);
        source.set_frequency(5000.0);
        assert_eq!(source.frequency(), 1000.0);
    }

    #[test]
    fn pulse_shape_is_clamped() {
        let mut source = GlottalSource::new(48000.0);
        source.set_pulse_shape(0.0, 2.0, 1.0);
        let shape = source.pulse_shape();
        assert_eq!(shape.open_quotient, 0.1);
        assert_eq!(shape.speed_quotient, 0.9);
        assert_eq!(shape.return_phase, 0.5);
    }

    #[test]
    fn rosenberg_peaks_at_open_quotient_and_closes() {
        let mut source = GlottalSource::new(48000.0);
        source.set_frequency(100.0);
        source.set_pulse_shape(0.5, 0.3, 0.1);
        let (buf, period) = one_period(&mut source);

        let (peak_idx, peak) = buf[..period]
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert!(peak > 0.99, "peak should approach 1, got {peak}");
        let expected = (0.5 * period as f32) as usize;
        assert!(peak_idx.abs_diff(expected) <= 2, "peak at {peak_idx}, expected ~{expected}");
        assert_eq!(buf[period - 1], 0.0, "closed phase should be silent");
    }

    #[test]
    fn lf_pulse_is_bounded() {
        let mut source = GlottalSource::new(44100.0);
        source.set_model(GlottalModel::Lf);
        source.set_frequency(220.0);
        for _ in 0..44100 {
            let s = source.process();
            assert!((0.0..=1.0).contains(&s), "LF sample out of range: {s}");
        }
    }

    #[test]
    fn differentiated_pulse_has_both_signs() {
        let mut source = GlottalSource::new(48000.0);
        source.set_model(GlottalModel::Differentiated);
        source.set_frequency(100.0);
        let (buf, period) = one_period(&mut source);
        let max = buf[..period].iter().copied().fold(f32::MIN, f32::max);
        let min = buf[..period].iter().copied().fold(f32::MAX, f32::min);
        assert!(max > 0.0 && min < 0.0, "derivative should swing both ways: {min}..{max}");
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut source = GlottalSource::new(48000.0);
        source.set_frequency(137.0);
        let first: [f32; 32] = core::array::from_fn(|_| source.process());
        for _ in 0..1000 {
            source.process();
        }
        source.reset();
        for (i, &expected) in first.iter().enumerate() {
            assert_eq!(source.process(), expected, "sample {i} after reset");
        }
    }
}
