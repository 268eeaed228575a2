//! Integration tests for vocalis-core DSP primitives.
//!
//! Cross-module checks measured at signal level: a glottal source through a
//! resonator bank, resonator frequency response, PLL lock against a shared
//! fundamental, smoother timing across sample rates, and the comb/allpass
//! reverb building blocks.

use vocalis_core::{
    AllpassFilter, CombFilter, DcBlocker, Effect, FormantResonator, GlottalModel,
    GlottalSource, Lfo, NoiseSource, SmoothedParam, SubharmonicGenerator, equal_power_pan,
    midi_to_freq,
};

const SAMPLE_RATE: f32 = 48000.0;
const TAU: f32 = core::f32::consts::TAU;

fn generate_sine(freq_hz: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|n| libm::sinf(TAU * freq_hz * n as f32 / SAMPLE_RATE))
        .collect()
}

fn rms(signal: &[f32]) -> f32 {
    let sum_sq: f32 = signal.iter().map(|&s| s * s).sum();
    libm::sqrtf(sum_sq / signal.len() as f32)
}

fn to_db(linear: f32) -> f32 {
    20.0 * libm::log10f(linear.max(1e-10))
}

// ============================================================================
// 1. Resonator frequency response
// ============================================================================

fn resonator_gain_db(center: f32, bandwidth: f32, probe_hz: f32) -> f32 {
    let mut res = FormantResonator::with_parameters(center, bandwidth, SAMPLE_RATE);
    let input = generate_sine(probe_hz, 24000);
    let mut output = input.clone();
    res.process_block(&mut output);
    to_db(rms(&output[12000..]) / rms(&input[12000..]))
}

#[test]
fn resonator_peaks_at_center_with_unity_gain() {
    let gain = resonator_gain_db(1000.0, 100.0, 1000.0);
    assert!(gain.abs() < 0.5, "constant-peak band-pass should be ~0 dB at center, got {gain:.2}");
}

#[test]
fn resonator_bandwidth_edges_near_minus_three_db() {
    let lower = resonator_gain_db(1000.0, 200.0, 905.0);
    let upper = resonator_gain_db(1000.0, 200.0, 1105.0);
    assert!((-4.5..=-1.5).contains(&lower), "lower edge gain {lower:.2} dB");
    assert!((-4.5..=-1.5).contains(&upper), "upper edge gain {upper:.2} dB");
}

#[test]
fn narrower_bandwidth_rejects_more() {
    let wide = resonator_gain_db(800.0, 300.0, 2400.0);
    let narrow = resonator_gain_db(800.0, 50.0, 2400.0);
    assert!(narrow < wide - 6.0, "narrow {narrow:.1} dB vs wide {wide:.1} dB");
}

#[test]
fn resonator_survives_nyquist_sweep() {
    let mut res = FormantResonator::new();
    let mut noise = NoiseSource::default();
    let mut accepted = 0;
    for step in 0..500 {
        let center = 100.0 + step as f32 * 60.0;
        if res.set_parameters(center, 120.0, SAMPLE_RATE) {
            accepted += 1;
        }
        for _ in 0..64 {
            let y = res.process(noise.next_sample());
            assert!(y.is_finite() && y.abs() < 50.0, "unbounded output at center {center}");
        }
    }
    assert!(accepted > 300 && accepted < 500, "centers above Nyquist must be rejected");
}

// ============================================================================
// 2. Source into formant bank
// ============================================================================

#[test]
fn vowel_bank_emphasizes_first_formant_region() {
    let mut source = GlottalSource::new(SAMPLE_RATE);
    source.set_frequency(110.0);
    let mut dc = DcBlocker::new(SAMPLE_RATE);
    let mut f1 = FormantResonator::with_parameters(730.0, 80.0, SAMPLE_RATE);

    let mut excitation = vec![0.0; 48000];
    for s in &mut excitation {
        *s = dc.process(source.process());
    }
    let mut voiced = excitation.clone();
    f1.process_block(&mut voiced);

    let out = rms(&voiced[24000..]);
    assert!(out > 1e-3, "resonated pulse train should be audible, rms {out}");
    assert!(out < rms(&excitation[24000..]), "a single band-pass should not add energy");
}

#[test]
fn block_cascade_matches_per_sample_cascade() {
    let mut resonator = FormantResonator::with_parameters(500.0, 60.0, SAMPLE_RATE);
    let mut dc = DcBlocker::new(SAMPLE_RATE);
    let mut a = FormantResonator::with_parameters(500.0, 60.0, SAMPLE_RATE);
    let mut b = DcBlocker::new(SAMPLE_RATE);

    let input = generate_sine(220.0, 512);
    let mut cascaded = vec![0.0; 512];
    Effect::process_block(&mut resonator, &input, &mut cascaded);
    dc.process_block_inplace(&mut cascaded);

    for (i, &x) in input.iter().enumerate() {
        let manual = b.process(a.process(x));
        assert_eq!(manual.to_bits(), cascaded[i].to_bits(), "sample {i}");
    }
}

#[test]
fn source_phase_returns_after_whole_periods() {
    for model in [GlottalModel::Rosenberg, GlottalModel::Lf, GlottalModel::Differentiated] {
        let mut source = GlottalSource::new(SAMPLE_RATE);
        source.set_model(model);
        source.set_frequency(200.0);
        for _ in 0..2400 {
            source.process();
        }
        let phase = source.phase();
        assert!(phase < 1e-3 || phase > 0.999, "{model:?}: phase after ten periods {phase}");
    }
}

// ============================================================================
// 3. PLL locked to a note
// ============================================================================

#[test]
fn pll_tracks_midi_note_for_ten_seconds() {
    let f0 = midi_to_freq(45.0);
    let mut pll = SubharmonicGenerator::new(SAMPLE_RATE);
    pll.set_ratio(2.0);

    let mut worst_late = 0.0f32;
    for n in 0..(SAMPLE_RATE as usize * 10) {
        pll.process(f0);
        if n > SAMPLE_RATE as usize * 9 {
            worst_late = worst_late.max(pll.phase_error().abs());
        }
    }
    assert!(worst_late < 1e-2, "phase error after 9 s: {worst_late}");
}

#[test]
fn pll_follows_vibrato() {
    let mut pll = SubharmonicGenerator::new(SAMPLE_RATE);
    pll.set_ratio(3.0);
    let mut vibrato = Lfo::new(SAMPLE_RATE, 5.5);

    let mut max_err = 0.0f32;
    for n in 0..(SAMPLE_RATE as usize * 4) {
        let f0 = 130.0 * (1.0 + 0.02 * vibrato.next());
        pll.process(f0);
        if n > SAMPLE_RATE as usize {
            max_err = max_err.max(pll.phase_error().abs());
        }
    }
    assert!(max_err < 0.1, "PLL should follow a 2% vibrato, max error {max_err}");
}

// ============================================================================
// 4. Smoothing timing
// ============================================================================

#[test]
fn smoother_timing_is_rate_independent() {
    let mut reached = Vec::new();
    for &sr in &[44100.0f32, 48000.0, 96000.0] {
        let mut p = SmoothedParam::with_config(500.0, sr, 50.0);
        p.set_target(700.0);
        let samples = (0.05 * sr) as usize;
        for _ in 0..samples {
            p.advance();
        }
        reached.push(p.get());
    }
    for value in &reached {
        assert!((value - reached[0]).abs() < 0.5, "one tau should land equally: {reached:?}");
    }
}

// ============================================================================
// 5. Reverb building blocks and panning
// ============================================================================

#[test]
fn comb_into_allpass_stays_bounded() {
    let mut comb = CombFilter::new(1116);
    comb.set_feedback(0.84);
    comb.set_damp(0.2);
    let mut ap = AllpassFilter::new(556);

    let mut peak = 0.0f32;
    for n in 0..96000 {
        let x = if n < 480 { 0.5 } else { 0.0 };
        peak = peak.max(ap.process(comb.process(x)).abs());
    }
    assert!(peak.is_finite() && peak < 10.0, "peak {peak}");
}

#[test]
fn equal_power_pan_preserves_power_across_range() {
    for i in 0..=20 {
        let pan = -1.0 + i as f32 * 0.1;
        let (l, r) = equal_power_pan(pan);
        assert!((l * l + r * r - 1.0).abs() < 1e-5, "pan {pan}: power {}", l * l + r * r);
    }
}
