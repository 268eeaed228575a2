//! Property-based tests for vocalis effects.
//!
//! Finite, bounded output for random settings; bit-exact bypass; exact
//! delayed reconstruction of the spectral enhancer at amount 0.

use proptest::prelude::*;
use vocalis_core::Effect;
use vocalis_effects::{Reverb, ReverbSettings, SpectralEnhancer};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// For any settings and input in [-1, 1] the reverb stays finite and
    /// bounded.
    #[test]
    fn reverb_bounded(
        room_size in 0.0f32..=1.0,
        damping in 0.0f32..=1.0,
        wet in 0.0f32..=1.0,
        dry in 0.0f32..=1.0,
        width in 0.0f32..=1.0,
        input in prop::collection::vec(-1.0f32..=1.0, 2048),
    ) {
        let mut reverb = Reverb::new(48000.0);
        reverb.apply_settings(ReverbSettings { room_size, damping, wet, dry, width });
        reverb.reset();

        for &x in &input {
            let (l, r) = reverb.process_stereo(x, -x * 0.5);
            prop_assert!(l.is_finite() && r.is_finite());
            prop_assert!(l.abs() < 20.0 && r.abs() < 20.0, "l={} r={}", l, r);
        }
    }

    /// Bypass returns every sample bit-for-bit.
    #[test]
    fn reverb_bypass_identity(
        left in prop::collection::vec(-1.0f32..=1.0, 256),
        right in prop::collection::vec(-1.0f32..=1.0, 256),
    ) {
        let mut reverb = Reverb::new(44100.0);
        reverb.set_bypass(true);
        let mut l = left.clone();
        let mut r = right.clone();
        reverb.process_block_stereo(&mut l, &mut r);
        for i in 0..256 {
            prop_assert_eq!(l[i].to_bits(), left[i].to_bits());
            prop_assert_eq!(r[i].to_bits(), right[i].to_bits());
        }
    }

    /// At amount 0 the enhancer outputs its input delayed by the FFT size.
    #[test]
    fn enhancer_transparent_at_zero(
        size_pow in 6u32..10,
        input in prop::collection::vec(-1.0f32..=1.0, 2048),
    ) {
        let n = 1usize << size_pow;
        let mut enhancer = SpectralEnhancer::new(n);
        enhancer.set_amount(0.0);
        let mut output = vec![0.0; input.len()];
        enhancer.process_block(&input, &mut output);

        for t in n..input.len() {
            prop_assert!((output[t] - input[t - n]).abs() < 1e-4, "t={} {} vs {}", t, output[t], input[t - n]);
        }
    }

    /// Any amount keeps the enhancer finite and bounded by the gain clamp.
    #[test]
    fn enhancer_bounded(
        amount in 0.0f32..=1.0,
        input in prop::collection::vec(-1.0f32..=1.0, 2048),
    ) {
        let mut enhancer = SpectralEnhancer::new(256);
        enhancer.set_amount(amount);
        for &x in &input {
            let y = enhancer.process(x);
            prop_assert!(y.is_finite() && y.abs() < 64.0, "output {}", y);
        }
    }
}
