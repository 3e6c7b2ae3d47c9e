//! Offline render pipeline: drive decks against a simulated host clock.

use std::path::Path;
use std::sync::Arc;

use crate::audio::AudioData;
use crate::config::SynthConfig;
use crate::engine::deck::{deck, BlockReport, Deck};
use crate::engine::kernel::SynthBackend;
use crate::error::SynthError;
use crate::gpu::WgpuBackend;
use crate::sink::{AudioSink, WavSink};

/// Totals of one offline render.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    pub blocks: usize,
    pub frames: usize,
    /// Program swaps across all decks.
    pub swaps: usize,
    /// Clock snaps on host decks.
    pub drift_corrections: u64,
}

/// Host timestamp reported for block `index`, offset by a deterministic
/// alternating error of `jitter` seconds.
pub fn simulated_host_time(start_time: f64, index: usize, block_seconds: f64, jitter: f64) -> f64 {
    let offset = if index % 2 == 0 { jitter } else { -jitter };
    start_time + index as f64 * block_seconds + offset
}

/// Render `seconds` of audio from t = 0 into `sink`.
///
/// See [`render_offline_from`].
pub fn render_offline<B: SynthBackend>(
    decks: &mut [Deck<B>],
    sink: &mut dyn AudioSink,
    seconds: f64,
    jitter: f64,
) -> Result<RenderStats, SynthError> {
    render_offline_from(decks, sink, 0.0, seconds, jitter)
}

/// Render `seconds` of audio starting at `start_time`, summing every deck.
///
/// Host decks are processed before guests in every cycle so guests read the
/// clock time their host just advanced. All decks must share the sink's sample
/// rate and one buffer size. The sink is finished afterwards.
pub fn render_offline_from<B: SynthBackend>(
    decks: &mut [Deck<B>],
    sink: &mut dyn AudioSink,
    start_time: f64,
    seconds: f64,
    jitter: f64,
) -> Result<RenderStats, SynthError> {
    let Some(first) = decks.first() else {
        return Err(SynthError::invalid("no decks to render"));
    };
    let buffer_size = first.config().buffer_size;
    let sample_rate = sink.sample_rate();
    if let Some(bad) = decks
        .iter()
        .find(|d| d.config().buffer_size != buffer_size || d.config().sample_rate != sample_rate)
    {
        return Err(SynthError::invalid(format!(
            "deck renders {} frames at {} Hz, expected {} frames at {} Hz",
            bad.config().buffer_size,
            bad.config().sample_rate,
            buffer_size,
            sample_rate
        )));
    }
    if !(seconds >= 0.0) {
        return Err(SynthError::invalid(format!("cannot render {} seconds", seconds)));
    }

    let block_seconds = buffer_size as f64 / sample_rate as f64;
    let blocks = (seconds / block_seconds).ceil() as usize;
    log::info!(
        "Rendering {} blocks ({:.2}s) from {} decks",
        blocks,
        seconds,
        decks.len()
    );

    let mut mix_left = vec![0.0f32; buffer_size];
    let mut mix_right = vec![0.0f32; buffer_size];
    let mut left = vec![0.0f32; buffer_size];
    let mut right = vec![0.0f32; buffer_size];
    let mut stats = RenderStats::default();

    for index in 0..blocks {
        let host_time = simulated_host_time(start_time, index, block_seconds, jitter);
        mix_left.fill(0.0);
        mix_right.fill(0.0);

        for host_pass in [true, false] {
            for deck in decks.iter_mut().filter(|d| d.is_host() == host_pass) {
                let report: BlockReport = deck.process_block(host_time, &mut left, &mut right);
                if report.swapped {
                    stats.swaps += 1;
                }
                for (mix, s) in mix_left.iter_mut().zip(&left) {
                    *mix += s;
                }
                for (mix, s) in mix_right.iter_mut().zip(&right) {
                    *mix += s;
                }
            }
        }

        sink.write_block(&mix_left, &mix_right)?;
        stats.blocks += 1;
        stats.frames += buffer_size;
    }

    stats.drift_corrections = decks
        .iter()
        .filter(|d| d.is_host())
        .map(|d| d.drift_corrections())
        .sum();
    sink.finish()?;
    Ok(stats)
}

/// Compile `source` on the default GPU and render `seconds` of it to a WAV file.
///
/// `samples` are registered under their names before compiling. The program is
/// committed on a one-block pre-roll before t = 0 so it is live from the first
/// written frame.
pub async fn render_shader_to_wav<P: AsRef<Path>>(
    source: &str,
    samples: &[(&str, AudioData)],
    config: SynthConfig,
    seconds: f64,
    output_path: P,
) -> Result<RenderStats, SynthError> {
    let backend = Arc::new(WgpuBackend::create().await?);
    let (mut handle, mut deck) = deck(backend, config.clone())?;

    for (name, audio) in samples {
        handle.register_sample(name, audio)?;
    }
    handle.compile(source).await?;
    handle.apply_cue()?;

    let block_seconds = config.buffer_size as f64 / config.sample_rate as f64;
    let mut left = vec![0.0f32; config.buffer_size];
    let mut right = vec![0.0f32; config.buffer_size];
    deck.process_block(-block_seconds, &mut left, &mut right);

    let mut sink = WavSink::create(output_path, config.sample_rate)?;
    let stats = render_offline(std::slice::from_mut(&mut deck), &mut sink, seconds, 0.0)?;

    handle.collect_retired();
    drop(deck);
    handle.dispose();
    Ok(stats)
}
