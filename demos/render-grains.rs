//! Renders a short granular texture from a synthesized source into a WAV file.
//!
//! Usage: `cargo run --example render-grains [OUTPUT_PATH]`

use std::f32::consts::PI;

use hound::{SampleFormat, WavSpec, WavWriter};

use graincloud::{
    parameter::Parameter, AudioSource, EngineOptions, GrainShape, GranularEngine,
    GranularParameters, LfoParameters, LfoTarget, LfoWaveform, LoopMode,
};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 48000;
const CHANNEL_COUNT: usize = 2;
const BLOCK_SIZE: usize = 256;
const DURATION_SECONDS: usize = 8;

/// Chord notes, started one after another.
const NOTES: [u8; 3] = [48, 55, 60];

// -------------------------------------------------------------------------------------------------

/// Two seconds of a decaying, slightly detuned saw chord.
fn synth_source() -> Result<AudioSource, graincloud::Error> {
    let frame_count = 2 * SAMPLE_RATE as usize;
    let saw = |frequency: f32, frame: usize| {
        let phase = frequency * frame as f32 / SAMPLE_RATE as f32;
        2.0 * (phase - phase.floor()) - 1.0
    };
    let channel = |detune: f32| {
        (0..frame_count)
            .map(|frame| {
                let decay = (-3.0 * frame as f32 / frame_count as f32).exp();
                let time = frame as f32 / SAMPLE_RATE as f32;
                let tremolo = 0.8 + 0.2 * (2.0 * PI * 3.0 * time).sin();
                (saw(220.0 * detune, frame) + saw(330.0 / detune, frame)) * 0.25 * decay * tremolo
            })
            .collect::<Vec<_>>()
    };
    AudioSource::from_planar(vec![channel(1.002), channel(0.998)], SAMPLE_RATE)
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init()?;

    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "render-grains.wav".to_string());

    let mut engine = GranularEngine::new(EngineOptions::default().seed(0x5eed))?;
    engine.prepare(SAMPLE_RATE, BLOCK_SIZE)?;
    engine.set_audio_source(synth_source()?);

    let mut parameters = GranularParameters {
        density: 0.6,
        texture: 0.3,
        spray: 0.2,
        position: 0.2,
        scan: 0.15,
        jitter: 0.3,
        pitch_jitter: 0.05,
        reverse: 0.2,
        grain_shape: GrainShape::Gaussian,
        loop_mode: LoopMode::PingPong,
        stereo_width: 0.7,
        filter_cutoff: 0.6,
        filter_resonance: 0.2,
        chorus_amount: 0.4,
        unison_voices: 3,
        attack_ms: 400.0,
        release_ms: 1500.0,
        lfo1: LfoParameters {
            rate: LfoParameters::rate_from_hz(0.3),
            amount: 0.3,
            target: LfoTarget::Position,
            shape: LfoWaveform::Triangle,
        },
        ..GranularParameters::default()
    };
    parameters.set_grain_size_ms(120.0);
    engine.set_parameters(parameters);

    // handles usually live in UI or MIDI threads: messages apply with the next rendered block
    let handle = engine.handle();
    let total_blocks = DURATION_SECONDS * SAMPLE_RATE as usize / BLOCK_SIZE;
    let blocks_per_second = SAMPLE_RATE as usize / BLOCK_SIZE;

    let spec = WavSpec {
        channels: CHANNEL_COUNT as u16,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&output_path, spec)?;
    let mut buffer = vec![0.0; BLOCK_SIZE * CHANNEL_COUNT];
    let mut peak = 0.0_f32;

    for block in 0..total_blocks {
        // schedule note and parameter changes at block boundaries
        if let Some(index) = (0..NOTES.len()).find(|i| block == i * blocks_per_second / 2) {
            handle.note_on(NOTES[index], 0.9)?;
        }
        if block == 3 * blocks_per_second {
            handle.set_parameter(GranularParameters::FREEZE.id(), 1.0_f32)?;
        }
        if block == 4 * blocks_per_second {
            handle.set_parameter(GranularParameters::POSITION.id(), 0.9_f32)?;
            handle.set_parameter_normalized(GranularParameters::GRAIN_PITCH.id(), 0.75)?;
        }
        if block == 5 * blocks_per_second {
            handle.all_notes_off(true)?;
        }

        buffer.fill(0.0);
        engine.render(&mut buffer, CHANNEL_COUNT);
        for sample in &buffer {
            peak = peak.max(sample.abs());
            writer.write_sample(*sample)?;
        }
        if block % blocks_per_second == 0 {
            log::info!(
                "{}s: {} voices, {} grains, playhead at {:.2}",
                block / blocks_per_second,
                engine.active_voice_count(),
                engine.active_grain_count(),
                engine.playhead_position()
            );
            handle.collect_garbage();
        }
    }
    writer.finalize()?;

    println!("Rendered {DURATION_SECONDS}s of grains into '{output_path}' (peak: {peak:.3})");
    Ok(())
}
