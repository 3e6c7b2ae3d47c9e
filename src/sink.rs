//! Audio sinks: consumers of fixed-size stereo blocks.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Errors that can occur while writing audio out.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Channel length mismatch: left {left}, right {right}")]
    ChannelMismatch { left: usize, right: usize },
}

/// Consumer of planar stereo blocks, called once per audio block.
pub trait AudioSink {
    fn sample_rate(&self) -> u32;

    fn write_block(&mut self, left: &[f32], right: &[f32]) -> Result<(), SinkError>;

    /// Flush anything buffered. Called once after the last block.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

fn check_channels(left: &[f32], right: &[f32]) -> Result<(), SinkError> {
    if left.len() != right.len() {
        return Err(SinkError::ChannelMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(())
}

/// Collects everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub blocks: usize,
}

impl MemorySink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(&self.right)
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

impl AudioSink for MemorySink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write_block(&mut self, left: &[f32], right: &[f32]) -> Result<(), SinkError> {
        check_channels(left, right)?;
        self.left.extend_from_slice(left);
        self.right.extend_from_slice(right);
        self.blocks += 1;
        Ok(())
    }
}

/// Writes a 32-bit float stereo WAV file.
pub struct WavSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    sample_rate: u32,
    frames: usize,
}

impl WavSink {
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self, SinkError> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(path.as_ref(), spec)?;
        log::info!("Writing {} Hz stereo WAV to {}", sample_rate, path.as_ref().display());
        Ok(Self {
            writer: Some(writer),
            sample_rate,
            frames: 0,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl AudioSink for WavSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write_block(&mut self, left: &[f32], right: &[f32]) -> Result<(), SinkError> {
        check_channels(left, right)?;
        let Some(writer) = self.writer.as_mut() else {
            return Err(SinkError::Wav(hound::Error::FormatError("sink already finished")));
        };
        for (l, r) in left.iter().zip(right) {
            writer.write_sample(*l)?;
            writer.write_sample(*r)?;
        }
        self.frames += left.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            log::info!("Finished WAV with {} frames", self.frames);
        }
        Ok(())
    }
}
