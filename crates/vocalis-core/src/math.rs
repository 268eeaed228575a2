//! Small numeric helpers shared by the voice path.
//!
//! # Pitch
//!
//! - [`midi_to_freq`] - equal-tempered note number to Hz (A4 = 440)
//! - [`semitones_to_ratio`] - interval to frequency ratio, used by vibrato
//!
//! # Shaping
//!
//! | Function | Use |
//! |----------|-----|
//! | [`soft_clip`] | final stage of the subharmonic blend |
//! | [`flush_denormal`] | feedback paths that decay toward zero |
//!
//! # Phase and panning
//!
//! - [`wrap_phase`] - wrap radians to `[-pi, pi]`
//! - [`equal_power_pan`] - `(left, right)` gains for a pan position

use core::f32::consts::{FRAC_PI_2, PI, TAU};
use libm::{exp2f, floorf, sincosf, tanhf};

/// MIDI note number to frequency in Hz.
///
/// `440 * 2^((note - 69) / 12)`
///
/// # Example
/// ```rust
/// use vocalis_core::midi_to_freq;
///
/// assert!((midi_to_freq(69.0) - 440.0).abs() < 1e-3);
/// assert!((midi_to_freq(57.0) - 220.0).abs() < 1e-3);
/// ```
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * exp2f((note - 69.0) / 12.0)
}

/// Frequency ratio of an interval in semitones.
///
/// # Example
/// ```rust
/// use vocalis_core::semitones_to_ratio;
///
/// assert!((semitones_to_ratio(12.0) - 2.0).abs() < 1e-5);
/// assert!((semitones_to_ratio(-0.5) * semitones_to_ratio(0.5) - 1.0).abs() < 1e-6);
/// ```
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    exp2f(semitones / 12.0)
}

/// Hyperbolic-tangent soft clip into `(-1, 1)`.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    tanhf(x)
}

/// Replace magnitudes below `1e-20` with zero.
///
/// Subnormal floats are slow on most FPUs; reverb tails and resonator
/// feedback decay into that range when the input goes silent.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Wrap an angle in radians to `[-pi, pi]`.
///
/// # Example
/// ```rust
/// use vocalis_core::wrap_phase;
/// use core::f32::consts::PI;
///
/// assert!((wrap_phase(3.0 * PI) - PI).abs() < 1e-5 || (wrap_phase(3.0 * PI) + PI).abs() < 1e-5);
/// assert!((wrap_phase(0.5) - 0.5).abs() < 1e-7);
/// ```
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    if (-PI..=PI).contains(&phase) {
        return phase;
    }
    (phase - TAU * floorf((phase + PI) / TAU)).clamp(-PI, PI)
}

/// Equal-power pan gains for `pan` in `[-1, 1]`.
///
/// `angle = (pan + 1) / 2 * pi / 2`; left is `cos(angle)`, right is
/// `sin(angle)`. The centre sits at -3 dB on both sides.
///
/// ## Example
/// ```rust
/// use vocalis_core::equal_power_pan;
///
/// let (l, r) = equal_power_pan(0.0);
/// assert!((l - r).abs() < 1e-6);
/// assert!((l * l + r * r - 1.0).abs() < 1e-5);
/// ```
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5 * FRAC_PI_2;
    let (sin, cos) = sincosf(angle);
    (cos, sin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octaves_double_frequency() {
        assert!((midi_to_freq(81.0) - 880.0).abs() < 1e-2);
        assert!((semitones_to_ratio(12.0) - 2.0).abs() < 1e-6);
        assert!((semitones_to_ratio(-12.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wrap_phase_stays_in_range() {
        for i in -2000..2000 {
            let phase = i as f32 * 0.05;
            let w = wrap_phase(phase);
            assert!((-PI..=PI).contains(&w), "{phase} wrapped to {w}");
            let diff = (phase - w) / TAU;
            assert!((diff - libm::roundf(diff)).abs() < 1e-4, "{phase} -> {w} is not a 2pi multiple");
        }
    }

    #[test]
    fn pan_extremes_are_hard() {
        let (l, r) = equal_power_pan(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = equal_power_pan(1.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
        let (l, _) = equal_power_pan(0.0);
        assert!((l - core::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6, "centre should be -3 dB");
    }

    #[test]
    fn denormals_flush() {
        assert_eq!(flush_denormal(1e-25), 0.0);
        assert_eq!(flush_denormal(-1e-30), 0.0);
        assert_eq!(flush_denormal(1e-10), 1e-10);
    }

    #[test]
    fn soft_clip_is_bounded() {
        for x in [-100.0, -2.0, 0.0, 0.3, 50.0] {
            assert!(soft_clip(x).abs() <= 1.0);
        }
    }
}
