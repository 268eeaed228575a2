//! Stereo algorithmic reverb.
//!
//! Freeverb topology per channel: eight parallel damped combs into four
//! series allpasses. The right channel's delays are offset by
//! [`STEREO_SPREAD_44K`] samples so the two tails decorrelate.

use vocalis_core::{AllpassFilter, CombFilter, Effect, SmoothedParam};

/// Comb delay times at the 44.1 kHz reference rate.
const COMB_TUNINGS_44K: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass delay times at the 44.1 kHz reference rate.
const ALLPASS_TUNINGS_44K: [usize; 4] = [556, 441, 341, 225];

/// Right-channel delay offset at the reference rate.
pub const STEREO_SPREAD_44K: usize = 23;

const REFERENCE_RATE: f32 = 44100.0;

/// Smoothing time for every continuous control.
const SMOOTHING_MS: f32 = 20.0;

fn scale_to_rate(samples: usize, target_rate: f32) -> usize {
    ((samples as f32 * target_rate / REFERENCE_RATE).round() as usize).max(1)
}

/// Continuous reverb controls, each 0-1.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReverbSettings {
    /// Tail length.
    pub room_size: f32,
    /// High-frequency absorption.
    pub damping: f32,
    /// Reverberant level.
    pub wet: f32,
    /// Direct level.
    pub dry: f32,
    /// Stereo width of the tail.
    pub width: f32,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            wet: 0.33,
            dry: 0.67,
            width: 1.0,
        }
    }
}

/// Named reverb settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReverbPreset {
    /// Short, fairly dry room.
    SmallRoom,
    /// Concert hall.
    LargeHall,
    /// Long, dark, fully wide.
    Cathedral,
    /// Bright plate.
    Plate,
}

impl ReverbPreset {
    /// Every preset, in declaration order.
    pub const ALL: [ReverbPreset; 4] = [
        ReverbPreset::SmallRoom,
        ReverbPreset::LargeHall,
        ReverbPreset::Cathedral,
        ReverbPreset::Plate,
    ];

    /// Control values for this preset.
    pub fn settings(self) -> ReverbSettings {
        let (room_size, damping, wet, dry, width) = match self {
            ReverbPreset::SmallRoom => (0.3, 0.5, 0.2, 0.8, 0.5),
            ReverbPreset::LargeHall => (0.7, 0.4, 0.4, 0.6, 0.8),
            ReverbPreset::Cathedral => (0.9, 0.3, 0.5, 0.5, 1.0),
            ReverbPreset::Plate => (0.5, 0.6, 0.3, 0.7, 0.7),
        };
        ReverbSettings {
            room_size,
            damping,
            wet,
            dry,
            width,
        }
    }

    /// Snake-case name, as used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            ReverbPreset::SmallRoom => "small_room",
            ReverbPreset::LargeHall => "large_hall",
            ReverbPreset::Cathedral => "cathedral",
            ReverbPreset::Plate => "plate",
        }
    }

    /// Look a preset up by its [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

/// Stereo Freeverb with smoothed controls, freeze and bypass.
///
/// ## Parameters
/// - `room_size`: 0-1, comb feedback `0.28 + room * 0.7`
/// - `damping`: 0-1, loop low-pass amount
/// - `wet`, `dry`: 0-1 output levels
/// - `width`: 0 (mono tail) to 1 (fully decorrelated)
/// - `freeze`: hold the current tail indefinitely and ignore input
/// - `bypass`: return the input unchanged
///
/// # Example
///
/// ```rust
/// use vocalis_effects::{Reverb, ReverbPreset};
///
/// let mut reverb = Reverb::new(48000.0);
/// reverb.set_preset(ReverbPreset::Cathedral);
///
/// let mut left = [0.0f32; 256];
/// let mut right = [0.0f32; 256];
/// left[0] = 1.0;
/// right[0] = 1.0;
/// reverb.process_block_stereo(&mut left, &mut right);
/// ```
#[derive(Debug, Clone)]
pub struct Reverb {
    combs_l: [CombFilter; 8],
    combs_r: [CombFilter; 8],
    allpasses_l: [AllpassFilter; 4],
    allpasses_r: [AllpassFilter; 4],

    room_size: SmoothedParam,
    damping: SmoothedParam,
    wet: SmoothedParam,
    dry: SmoothedParam,
    width: SmoothedParam,

    freeze: bool,
    bypass: bool,
    sample_rate: f32,

    cached_room: f32,
    cached_damp: f32,
    cached_freeze: bool,
}

impl Reverb {
    /// Reverb at `sample_rate` with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let defaults = ReverbSettings::default();
        let smoothed = |v| SmoothedParam::with_config(v, sample_rate, SMOOTHING_MS);

        let mut reverb = Self {
            combs_l: build_combs(sample_rate, 0),
            combs_r: build_combs(sample_rate, STEREO_SPREAD_44K),
            allpasses_l: build_allpasses(sample_rate, 0),
            allpasses_r: build_allpasses(sample_rate, STEREO_SPREAD_44K),
            room_size: smoothed(defaults.room_size),
            damping: smoothed(defaults.damping),
            wet: smoothed(defaults.wet),
            dry: smoothed(defaults.dry),
            width: smoothed(defaults.width),
            freeze: false,
            bypass: false,
            sample_rate,
            cached_room: -1.0,
            cached_damp: -1.0,
            cached_freeze: false,
        };
        reverb.update_comb_params();
        reverb
    }

    /// Set room size (0-1).
    pub fn set_room_size(&mut self, value: f32) {
        self.room_size.set_target(value.clamp(0.0, 1.0));
    }

    /// Room size target.
    pub fn room_size(&self) -> f32 {
        self.room_size.target()
    }

    /// Set damping (0-1).
    pub fn set_damping(&mut self, value: f32) {
        self.damping.set_target(value.clamp(0.0, 1.0));
    }

    /// Damping target.
    pub fn damping(&self) -> f32 {
        self.damping.target()
    }

    /// Set wet level (0-1).
    pub fn set_wet(&mut self, value: f32) {
        self.wet.set_target(value.clamp(0.0, 1.0));
    }

    /// Wet level target.
    pub fn wet(&self) -> f32 {
        self.wet.target()
    }

    /// Set dry level (0-1).
    pub fn set_dry(&mut self, value: f32) {
        self.dry.set_target(value.clamp(0.0, 1.0));
    }

    /// Dry level target.
    pub fn dry(&self) -> f32 {
        self.dry.target()
    }

    /// Set stereo width (0-1).
    pub fn set_width(&mut self, value: f32) {
        self.width.set_target(value.clamp(0.0, 1.0));
    }

    /// Width target.
    pub fn width(&self) -> f32 {
        self.width.target()
    }

    /// Hold the tail: feedback 1, no damping, input muted.
    pub fn set_freeze(&mut self, freeze: bool) {
        self.freeze = freeze;
    }

    /// True while frozen.
    pub fn is_frozen(&self) -> bool {
        self.freeze
    }

    /// Pass the input through untouched. Tail state is kept.
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    /// True while bypassed.
    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Ramp every control toward `settings`.
    pub fn apply_settings(&mut self, settings: ReverbSettings) {
        self.set_room_size(settings.room_size);
        self.set_damping(settings.damping);
        self.set_wet(settings.wet);
        self.set_dry(settings.dry);
        self.set_width(settings.width);
    }

    /// Ramp toward a preset.
    pub fn set_preset(&mut self, preset: ReverbPreset) {
        self.apply_settings(preset.settings());
    }

    /// Current control targets.
    pub fn settings(&self) -> ReverbSettings {
        ReverbSettings {
            room_size: self.room_size(),
            damping: self.damping(),
            wet: self.wet(),
            dry: self.dry(),
            width: self.width(),
        }
    }

    /// Process one stereo frame.
    #[inline]
    pub fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.bypass {
            return (left, right);
        }

        self.room_size.advance();
        self.damping.advance();
        let wet = self.wet.advance();
        let dry = self.dry.advance();
        let width = self.width.advance();
        self.update_comb_params();

        let input = if self.freeze { 0.0 } else { (left + right) * 0.5 };

        let out_l = run_channel(&mut self.combs_l, &mut self.allpasses_l, input);
        let out_r = run_channel(&mut self.combs_r, &mut self.allpasses_r, input);

        let wet1 = wet * (width * 0.5 + 0.5);
        let wet2 = wet * ((1.0 - width) * 0.5);

        (
            out_l * wet1 + out_r * wet2 + left * dry,
            out_r * wet1 + out_l * wet2 + right * dry,
        )
    }

    /// Process two channel buffers in place.
    ///
    /// Processes `min(left.len(), right.len())` frames.
    pub fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.bypass {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (out_l, out_r) = self.process_stereo(*l, *r);
            *l = out_l;
            *r = out_r;
        }
    }

    fn update_comb_params(&mut self) {
        let room = self.room_size.get();
        let damp = self.damping.get();

        if self.freeze == self.cached_freeze
            && (room - self.cached_room).abs() < 0.001
            && (damp - self.cached_damp).abs() < 0.001
        {
            return;
        }
        self.cached_room = room;
        self.cached_damp = damp;
        self.cached_freeze = self.freeze;

        let (feedback, damp) = if self.freeze {
            (1.0, 0.0)
        } else {
            (0.28 + room * 0.7, damp)
        };

        for comb in self.combs_l.iter_mut().chain(self.combs_r.iter_mut()) {
            comb.set_feedback(feedback);
            comb.set_damp(damp);
        }
    }
}

fn build_combs(sample_rate: f32, spread: usize) -> [CombFilter; 8] {
    core::array::from_fn(|i| CombFilter::new(scale_to_rate(COMB_TUNINGS_44K[i] + spread, sample_rate)))
}

fn build_allpasses(sample_rate: f32, spread: usize) -> [AllpassFilter; 4] {
    core::array::from_fn(|i| {
        let mut ap = AllpassFilter::new(scale_to_rate(ALLPASS_TUNINGS_44K[i] + spread, sample_rate));
        ap.set_feedback(0.5);
        ap
    })
}

#[inline]
fn run_channel(combs: &mut [CombFilter; 8], allpasses: &mut [AllpassFilter; 4], input: f32) -> f32 {
    let mut sum = 0.0f32;
    for comb in combs.iter_mut() {
        sum += comb.process(input);
    }
    let mut out = sum * 0.125;
    for allpass in allpasses.iter_mut() {
        out = allpass.process(out);
    }
    out
}

impl Effect for Reverb {
    /// Mono use: the input feeds both channels and the left output is returned.
    fn process(&mut self, input: f32) -> f32 {
        self.process_stereo(input, input).0
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.combs_l = build_combs(sample_rate, 0);
        self.combs_r = build_combs(sample_rate, STEREO_SPREAD_44K);
        self.allpasses_l = build_allpasses(sample_rate, 0);
        self.allpasses_r = build_allpasses(sample_rate, STEREO_SPREAD_44K);

        for param in [
            &mut self.room_size,
            &mut self.damping,
            &mut self.wet,
            &mut self.dry,
            &mut self.width,
        ] {
            param.set_sample_rate(sample_rate);
        }

        self.cached_room = -1.0;
        self.update_comb_params();
    }

    fn reset(&mut self) {
        for comb in self.combs_l.iter_mut().chain(self.combs_r.iter_mut()) {
            comb.clear();
        }
        for ap in self.allpasses_l.iter_mut().chain(self.allpasses_r.iter_mut()) {
            ap.clear();
        }
        for param in [
            &mut self.room_size,
            &mut self.damping,
            &mut self.wet,
            &mut self.dry,
            &mut self.width,
        ] {
            param.snap_to_target();
        }
        self.cached_room = -1.0;
        self.update_comb_params();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn impulse_response(reverb: &mut Reverb, len: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; len];
        let mut right = vec![0.0; len];
        left[0] = 1.0;
        right[0] = 1.0;
        reverb.process_block_stereo(&mut left, &mut right);
        (left, right)
    }

    fn energy(signal: &[f32]) -> f32 {
        signal.iter().map(|s| s * s).sum()
    }

    #[test]
    fn bypass_is_bit_identical() {
        let mut reverb = Reverb::new(SR);
        reverb.set_preset(ReverbPreset::Cathedral);
        reverb.set_bypass(true);

        let input_l: Vec<f32> = (0..512).map(|i| libm::sinf(i as f32 * 0.05) * 0.7).collect();
        let input_r: Vec<f32> = (0..512).map(|i| libm::cosf(i as f32 * 0.031) * -0.4).collect();
        let mut left = input_l.clone();
        let mut right = input_r.clone();
        reverb.process_block_stereo(&mut left, &mut right);

        for i in 0..512 {
            assert_eq!(left[i].to_bits(), input_l[i].to_bits(), "left sample {i}");
            assert_eq!(right[i].to_bits(), input_r[i].to_bits(), "right sample {i}");
        }
    }

    #[test]
    fn presets_carry_documented_values() {
        let hall = ReverbPreset::LargeHall.settings();
        assert_eq!((hall.room_size, hall.damping, hall.wet, hall.dry, hall.width), (0.7, 0.4, 0.4, 0.6, 0.8));
        let small = ReverbPreset::SmallRoom.settings();
        assert_eq!((small.room_size, small.width), (0.3, 0.5));

        for preset in ReverbPreset::ALL {
            assert_eq!(ReverbPreset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(ReverbPreset::from_name("bathroom"), None);
    }

    #[test]
    fn tail_decorrelates_channels() {
        let mut reverb = Reverb::new(SR);
        reverb.set_dry(0.0);
        reverb.reset();
        let (left, right) = impulse_response(&mut reverb, 24000);

        let diff: f32 = left.iter().zip(&right).map(|(l, r)| (l - r).abs()).sum();
        assert!(diff > 1.0, "full width should produce different channels, diff {diff}");
    }

    #[test]
    fn zero_width_tail_is_mono() {
        let mut reverb = Reverb::new(SR);
        reverb.set_width(0.0);
        reverb.set_dry(0.0);
        reverb.reset();
        let (left, right) = impulse_response(&mut reverb, 8000);
        for (i, (l, r)) in left.iter().zip(&right).enumerate() {
            assert!((l - r).abs() < 1e-6, "sample {i}: {l} vs {r}");
        }
    }

    #[test]
    fn bigger_room_rings_longer() {
        let late_energy = |room: f32| {
            let mut reverb = Reverb::new(SR);
            reverb.set_room_size(room);
            reverb.set_dry(0.0);
            reverb.reset();
            let (left, _) = impulse_response(&mut reverb, 96000);
            energy(&left[48000..])
        };
        assert!(late_energy(0.9) > late_energy(0.3) * 10.0);
    }

    #[test]
    fn freeze_holds_tail_and_mutes_input() {
        let mut reverb = Reverb::new(SR);
        reverb.set_dry(0.0);
        reverb.reset();

        let mut left = vec![0.0; 4800];
        let mut right = vec![0.0; 4800];
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let x = libm::sinf(i as f32 * 0.07) * 0.5;
            *l = x;
            *r = x;
        }
        reverb.process_block_stereo(&mut left, &mut right);

        reverb.set_freeze(true);
        let mut measure = |reverb: &mut Reverb| {
            let mut l = vec![0.3; 48000];
            let mut r = vec![0.3; 48000];
            reverb.process_block_stereo(&mut l, &mut r);
            energy(&l[24000..])
        };
        let first = measure(&mut reverb);
        let later = measure(&mut reverb);
        assert!(first > 1e-3, "frozen tail should be audible");
        assert!(later > first * 0.5, "frozen tail should not decay: {first} -> {later}");
    }

    #[test]
    fn controls_are_smoothed() {
        let mut reverb = Reverb::new(SR);
        reverb.set_wet(0.0);
        reverb.set_dry(1.0);
        reverb.reset();

        reverb.set_dry(0.0);
        let (l, _) = reverb.process_stereo(1.0, 1.0);
        assert!(l > 0.99, "dry should ramp down over 20 ms, not jump: {l}");
    }

    #[test]
    fn reset_clears_tail() {
        let mut reverb = Reverb::new(SR);
        reverb.set_dry(0.0);
        impulse_response(&mut reverb, 1000);
        reverb.reset();
        let (l, r) = reverb.process_stereo(0.0, 0.0);
        assert_eq!((l, r), (0.0, 0.0));
    }

    #[test]
    fn controls_are_clamped() {
        let mut reverb = Reverb::new(SR);
        reverb.set_room_size(3.0);
        reverb.set_wet(-1.0);
        assert_eq!(reverb.room_size(), 1.0);
        assert_eq!(reverb.wet(), 0.0);
    }
}
