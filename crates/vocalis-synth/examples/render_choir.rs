//! Render a short choir phrase to a stereo WAV file.
//!
//! Four voices sing a chord through a vowel sequence, then a Tuvan
//! kargyraa drone follows on the subharmonic method.
//!
//! Run with: cargo run -p vocalis-synth --example render_choir -- [out.wav]
//!
//! Set `RUST_LOG=debug` to see allocation and preset events.

use rtrb::{Producer, PushError};
use tracing_subscriber::EnvFilter;
use vocalis_synth::{
    ArticulationTarget, ControlMessage, EngineConfig, PresetRegistry, ReverbPreset, VoiceManager,
};

const SECONDS_PER_VOWEL: f32 = 0.8;

fn send(tx: &mut Producer<ControlMessage>, message: ControlMessage) -> Result<(), Box<dyn std::error::Error>> {
    tx.push(message).map_err(|PushError::Full(dropped)| format!("control queue full, dropped {dropped:?}").into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "choir.wav".to_string());
    let registry = PresetRegistry::with_factory_presets();
    let config = EngineConfig {
        max_voices: 8,
        attack: 0.08,
        release: 0.6,
        vibrato_depth: 0.15,
        ..EngineConfig::default()
    };

    let mut choir = VoiceManager::from_config(&config, &registry)?;
    choir.reverb_mut().set_preset(ReverbPreset::Cathedral);
    let mut tx = choir.control_producer(64);

    let block = config.max_block_size;
    let sample_rate = config.sample_rate;
    let blocks_per_vowel = (SECONDS_PER_VOWEL * sample_rate / block as f32) as usize;

    let mut left = vec![0.0f32; block];
    let mut right = vec![0.0f32; block];
    let mut out_l = Vec::new();
    let mut out_r = Vec::new();

    let mut render = |choir: &mut VoiceManager, blocks: usize| -> Result<(), Box<dyn std::error::Error>> {
        for _ in 0..blocks {
            choir.process_audio(&mut left, &mut right)?;
            out_l.extend_from_slice(&left);
            out_r.extend_from_slice(&right);
        }
        Ok(())
    };

    // Bass, tenor, alto, soprano
    let chord = [(45u8, -0.6f32), (57, -0.2), (64, 0.2), (69, 0.6)];
    send(&mut tx, ControlMessage::SetAllTargets(ArticulationTarget::A_AH))?;
    render(&mut choir, 1)?;
    for (note, pan) in chord {
        let slot = choir.note_on(note, 96)?;
        choir.set_voice_pan(slot, pan);
    }

    for vowel in [ArticulationTarget::A_AH, ArticulationTarget::E_EH, ArticulationTarget::O_OH, ArticulationTarget::U_OO] {
        send(&mut tx, ControlMessage::SetAllTargets(vowel))?;
        render(&mut choir, blocks_per_vowel)?;
    }
    for (note, _) in chord {
        send(&mut tx, ControlMessage::NoteOff { note, velocity: 0 })?;
    }
    render(&mut choir, blocks_per_vowel)?;

    choir.set_method("subharmonic")?;
    choir.set_subharmonic_preset(&registry, "tuva_kargyraa")?;
    choir.set_all_targets(ArticulationTarget::O_AW);
    choir.note_on(40, 110)?;
    render(&mut choir, blocks_per_vowel * 3)?;
    send(&mut tx, ControlMessage::AllNotesOff)?;
    render(&mut choir, blocks_per_vowel)?;

    let stats = choir.stats();
    tracing::info!(
        blocks = stats.blocks_processed,
        peak_cpu = stats.peak_cpu,
        stolen = stats.stolen_voices,
        "render finished"
    );

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for (l, r) in out_l.iter().zip(&out_r) {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize()?;

    println!("Wrote {} seconds to {path}", out_l.len() as f32 / sample_rate);
    Ok(())
}
