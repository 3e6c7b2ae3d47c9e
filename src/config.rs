//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SynthError;

/// Configuration shared by every deck driven from one audio stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per audio callback. Must be even: the kernel packs two frames per texel.
    pub buffer_size: usize,
    /// Audio callbacks rendered per GPU pass.
    pub chunk_size: usize,
    /// Drift, in seconds, beyond which the clock snaps to the host timestamp.
    pub time_error_threshold: f64,
    /// Initial tempo.
    pub bpm: f64,
    /// Capacity of the control → audio command queue.
    pub command_capacity: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 1024,
            chunk_size: 16,
            time_error_threshold: 0.1,
            bpm: 120.0,
            command_capacity: 64,
        }
    }
}

impl SynthConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SynthError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SynthError::invalid(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SynthError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SynthError::invalid(format!("config {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        if self.sample_rate == 0 {
            return Err(SynthError::invalid("sample_rate must be positive"));
        }
        if self.buffer_size == 0 || self.buffer_size % 2 != 0 {
            return Err(SynthError::invalid(format!(
                "buffer_size must be a positive even number, got {}",
                self.buffer_size
            )));
        }
        if self.chunk_size == 0 {
            return Err(SynthError::invalid("chunk_size must be positive"));
        }
        if !(self.time_error_threshold > 0.0) {
            return Err(SynthError::invalid(format!(
                "time_error_threshold must be positive, got {}",
                self.time_error_threshold
            )));
        }
        if !(self.bpm > 0.0) || !self.bpm.is_finite() {
            return Err(SynthError::invalid(format!(
                "bpm must be positive, got {}",
                self.bpm
            )));
        }
        if self.command_capacity == 0 {
            return Err(SynthError::invalid("command_capacity must be positive"));
        }
        Ok(())
    }

    pub fn layout(&self) -> BlockLayout {
        BlockLayout {
            sample_rate: self.sample_rate,
            buffer_size: self.buffer_size,
            chunk_size: self.chunk_size,
        }
    }
}

/// Geometry of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub chunk_size: usize,
}

impl BlockLayout {
    /// Stereo frames produced by one GPU pass.
    pub fn frames_per_render(&self) -> usize {
        self.buffer_size * self.chunk_size
    }

    /// Work-items per pass; each evaluates two frames.
    pub fn texels_per_render(&self) -> usize {
        self.frames_per_render() / 2
    }

    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    pub fn block_period(&self) -> f64 {
        self.buffer_size as f64 / self.sample_rate as f64
    }
}
