//! Smoothed formant resonator bank shared by the synthesis methods.

use vocalis_core::{FormantResonator, SmoothedParam};

/// Samples between coefficient updates.
pub(crate) const CONTROL_INTERVAL: usize = 16;

/// Highest center frequency handed to a resonator, as a fraction of the
/// sample rate.
const MAX_CENTER_RATIO: f32 = 0.45;

/// Level of the series cascade's tallest formant peak after normalisation.
const SERIES_MAKEUP: f32 = 4.0;

/// `N` resonators whose centers and bandwidths glide toward their targets.
///
/// Smoothers run at audio rate in closed form; resonator coefficients are
/// recomputed every [`CONTROL_INTERVAL`] samples.
///
/// Each constant-peak band-pass attenuates every other formant, so a plain
/// series cascade is tens of dB down and its level swings with the vowel.
/// [`process_series`](Self::process_series) divides by the cascade's
/// largest magnitude over the formant centers, re-measured whenever the
/// coefficients change.
#[derive(Debug, Clone)]
pub(crate) struct FormantBank<const N: usize> {
    resonators: [FormantResonator; N],
    centers: [SmoothedParam; N],
    bandwidths: [SmoothedParam; N],
    applied_hz: [f32; N],
    series_gain: f32,
    series_stale: bool,
    sample_rate: f32,
    countdown: usize,
    primed: bool,
}

impl<const N: usize> FormantBank<N> {
    pub(crate) fn new(sample_rate: f32, smoothing_ms: f32) -> Self {
        Self {
            resonators: core::array::from_fn(|_| FormantResonator::new()),
            centers: core::array::from_fn(|_| SmoothedParam::with_config(500.0, sample_rate, smoothing_ms)),
            bandwidths: core::array::from_fn(|_| SmoothedParam::with_config(100.0, sample_rate, smoothing_ms)),
            applied_hz: [0.0; N],
            series_gain: 1.0,
            series_stale: true,
            sample_rate,
            countdown: 0,
            primed: false,
        }
    }

    pub(crate) fn set_smoothing_ms(&mut self, ms: f32) {
        for p in self.centers.iter_mut().chain(self.bandwidths.iter_mut()) {
            p.set_time_constant_ms(ms);
        }
    }

    /// Glide toward new targets. The first call after a reset jumps.
    pub(crate) fn set_targets(&mut self, centers: &[f32; N], bandwidths: &[f32; N]) {
        if !self.primed {
            self.set_immediate(centers, bandwidths);
            return;
        }
        for i in 0..N {
            self.centers[i].set_target(centers[i]);
            self.bandwidths[i].set_target(bandwidths[i]);
        }
    }

    /// Jump to new values and recompute coefficients now.
    pub(crate) fn set_immediate(&mut self, centers: &[f32; N], bandwidths: &[f32; N]) {
        for i in 0..N {
            self.centers[i].set_immediate(centers[i]);
            self.bandwidths[i].set_immediate(bandwidths[i]);
        }
        self.primed = true;
        self.countdown = 0;
    }

    /// Current (smoothed) center of formant `index`.
    #[cfg(test)]
    pub(crate) fn center(&self, index: usize) -> f32 {
        self.centers[index].get()
    }

    /// True when the next [`tick`](Self::tick) rebuilds coefficients.
    #[inline]
    pub(crate) fn due(&self) -> bool {
        self.countdown == 0
    }

    /// Advance one sample. Every [`CONTROL_INTERVAL`] samples the smoothers
    /// step forward and coefficients are rebuilt with centers multiplied by
    /// `scale`.
    #[inline]
    pub(crate) fn tick(&mut self, scale: &[f32; N]) {
        if self.countdown == 0 {
            let nyquist_guard = self.sample_rate * MAX_CENTER_RATIO;
            for i in 0..N {
                let center = self.centers[i].advance_by(CONTROL_INTERVAL);
                let bandwidth = self.bandwidths[i].advance_by(CONTROL_INTERVAL);
                let hz = (center * scale[i]).clamp(20.0, nyquist_guard);
                self.resonators[i].set_parameters(hz, bandwidth.max(1.0), self.sample_rate);
                self.applied_hz[i] = hz;
            }
            self.series_stale = true;
            self.countdown = CONTROL_INTERVAL;
        }
        self.countdown -= 1;
    }

    /// Sum of the resonators fed in parallel, weighted by `gains`.
    #[inline]
    pub(crate) fn process_parallel(&mut self, input: f32, gains: &[f32; N]) -> f32 {
        let mut sum = 0.0;
        for (resonator, &gain) in self.resonators.iter_mut().zip(gains) {
            sum += resonator.process(input) * gain;
        }
        sum
    }

    /// Resonators chained in series, F1 first, levelled so the tallest
    /// formant peak sits at [`SERIES_MAKEUP`].
    #[inline]
    pub(crate) fn process_series(&mut self, input: f32) -> f32 {
        if self.series_stale {
            self.series_gain = self.series_normalisation();
            self.series_stale = false;
        }
        self.resonators.iter_mut().fold(input, |x, r| r.process(x)) * self.series_gain
    }

    fn series_normalisation(&self) -> f32 {
        let peak = self
            .applied_hz
            .iter()
            .map(|&hz| self.resonators.iter().map(|r| r.magnitude_at(hz)).product::<f32>())
            .fold(0.0f32, f32::max);
        if peak.is_finite() && peak > f32::MIN_POSITIVE {
            SERIES_MAKEUP / peak
        } else {
            1.0
        }
    }

    /// Clear filter history and forget the last targets.
    pub(crate) fn reset(&mut self) {
        for r in &mut self.resonators {
            r.reset();
        }
        self.series_stale = true;
        self.countdown = 0;
        self.primed = false;
    }
}
