//! Example: Render a shader program to a WAV file.
//!
//! Registers a synthetic click loop and kick drum, then renders a short
//! program that plays them over a sine bass.
//!
//! Run with:
//!     cargo run --example render_offline -- [output.wav] [seconds]

use anyhow::Context;
use phobz_synth::audio::{click_loop, kick};
use phobz_synth::{render_shader_to_wav, SynthConfig};

const PROGRAM: &str = r#"fn main_sound(time: f32) -> vec2<f32> {
    let bar_t = time % synth.bar_seconds;
    let beat_t = time % synth.beat_seconds;
    let clicks = sample_frame(sample_clicks, sample_clicks_meta, bar_t) * 0.4;
    let hit = sample_frame(sample_kick, sample_kick_meta, beat_t) * 0.8;
    let bass = sin(TAU * 55.0 * time) * exp(-4.0 * beat_t) * 0.3;
    return clicks + hit + vec2<f32>(bass);
}
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "render_offline.wav".to_string());
    let seconds: f64 = match args.next() {
        Some(s) => s.parse().context("seconds must be a number")?,
        None => 8.0,
    };

    println!("Phobz Synth - Offline Render Example");
    println!("====================================\n");

    let config = SynthConfig {
        bpm: 128.0,
        ..SynthConfig::default()
    };
    println!("  Sample rate: {} Hz", config.sample_rate);
    println!("  BPM: {}", config.bpm);
    println!("  Duration: {} seconds\n", seconds);

    let samples = [
        ("clicks", click_loop(config.bpm as f32, config.sample_rate, 1000.0)),
        ("kick", kick(config.sample_rate)),
    ];

    let stats = render_shader_to_wav(PROGRAM, &samples, config, seconds, &output)
        .await
        .context("render failed")?;

    println!("Rendered {} frames in {} blocks", stats.frames, stats.blocks);
    println!("Output: {}", output);
    Ok(())
}
