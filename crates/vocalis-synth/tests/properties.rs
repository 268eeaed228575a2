//! Property-based tests for vocalis-synth.
//!
//! Allocator invariants over arbitrary note streams, diphone timing and
//! crossfade bounds, and manager output sanity under random control input.

use proptest::prelude::*;
use vocalis_synth::{
    ArticulationTarget, TransitionKind, VoiceAllocator, VoiceManager, method::diphone::crossfade,
};

#[derive(Debug, Clone)]
enum Op {
    On(u8, u8),
    Off(u8),
    Tick,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..=127, 0u8..=127).prop_map(|(n, v)| Op::On(n, v)),
        (0u8..=127).prop_map(Op::Off),
        Just(Op::Tick),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every MIDI note and velocity allocates, at equal temperament.
    #[test]
    fn allocation_frequency(note in 0u8..=127, velocity in 0u8..=127) {
        let mut allocator = VoiceAllocator::new(8);
        let a = allocator.allocate(note, velocity).expect("valid note");
        let slot = allocator.slot(a.slot_id).expect("slot");
        let expected = 440.0 * 2f32.powf((f32::from(note) - 69.0) / 12.0);
        prop_assert!((slot.frequency - expected).abs() <= expected * 1e-4);
        prop_assert!(slot.priority <= 100);
    }

    /// The pool never over-fills, and once full every allocation steals.
    #[test]
    fn active_count_bounded(max in 1usize..24, ops in prop::collection::vec(op(), 1..200)) {
        let mut allocator = VoiceAllocator::with_seed(max, 17);
        for op in ops {
            match op {
                Op::On(note, velocity) => {
                    let full = allocator.active_count() == max;
                    let a = allocator.allocate(note, velocity).expect("valid note");
                    prop_assert_eq!(a.stolen, full);
                }
                Op::Off(note) => {
                    let slot = allocator.slots().iter().find(|s| s.active && s.note == note).map(|s| s.id);
                    if let Some(id) = slot {
                        allocator.free(id);
                    }
                }
                Op::Tick => allocator.advance_time(0.1),
            }
            prop_assert!(allocator.active_count() <= max);
        }
    }

    /// Without the random term, louder notes never rank below quieter ones.
    #[test]
    fn priority_monotonic_in_velocity(a in 0u8..=127, b in 0u8..=127) {
        let mut allocator = VoiceAllocator::new(2);
        allocator.set_priority_jitter(0.0);
        let sa = allocator.allocate(60, a).expect("note").slot_id;
        let sb = allocator.allocate(61, b).expect("note").slot_id;
        let pa = allocator.slot(sa).expect("slot").priority;
        let pb = allocator.slot(sb).expect("slot").priority;
        if a >= b {
            prop_assert!(pa >= pb);
        } else {
            prop_assert!(pa <= pb);
        }
    }

    /// Crossfades stay between their endpoints for any curve.
    #[test]
    fn crossfade_between_endpoints(
        a in -5000.0f32..5000.0,
        b in -5000.0f32..5000.0,
        t in 0.0f32..=1.0,
        curve in 0.1f32..3.0,
    ) {
        let y = crossfade(a, b, t, curve);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        prop_assert!(y >= lo - 1e-2 && y <= hi + 1e-2, "{} outside [{}, {}]", y, lo, hi);
    }

    /// Transition timing maps [0, 1] onto [0, 1] monotonically.
    #[test]
    fn transition_ratio_monotonic(t in 0.0f32..0.99, c in 0.1f32..0.9) {
        let v = 1.0 - c;
        for kind in [
            TransitionKind::ConsonantVowel,
            TransitionKind::VowelConsonant,
            TransitionKind::VowelVowel,
            TransitionKind::ConsonantConsonant,
        ] {
            let r0 = kind.ratio(t, c, v);
            let r1 = kind.ratio(t + 0.01, c, v);
            prop_assert!((0.0..=1.0).contains(&r0), "{:?} {}", kind, r0);
            prop_assert!(r1 >= r0 - 1e-6, "{:?} not monotonic at {}", kind, t);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Random note streams with random vowels never produce NaN or runaway
    /// output.
    #[test]
    fn manager_output_bounded(
        notes in prop::collection::vec((24u8..=96, 1u8..=127, 0usize..11), 1..12),
        method in prop::sample::select(vec!["formant", "diphone", "subharmonic"]),
    ) {
        let mut manager = VoiceManager::with_seed(6, 23);
        manager.set_method(method).expect("method");
        manager.prepare(48000.0, 128).expect("prepare");

        let mut left = [0.0f32; 128];
        let mut right = [0.0f32; 128];
        for (note, velocity, vowel) in notes {
            let slot = manager.note_on(note, velocity).expect("note");
            manager.set_voice_target(slot, ArticulationTarget::vowel(vowel)).expect("slot");
            manager.process_audio(&mut left, &mut right).expect("render");
            prop_assert!(left.iter().chain(&right).all(|s| s.is_finite() && s.abs() < 20.0));
            if velocity % 3 == 0 {
                manager.note_off(note, 0);
            }
        }
        prop_assert!(manager.active_voice_count() <= 6);
    }
}
