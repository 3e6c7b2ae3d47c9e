//! Uniform parameter structs for synth shaders.
//!
//! These structs must match the WGSL preamble exactly, including alignment.

use crate::engine::kernel::RenderParams;
use crate::engine::program::{MAX_PROGRAM_PARAMS, MAX_PROGRAM_SAMPLES};
use crate::engine::registry::SampleEntry;

/// WGSL: `struct SynthGlobals`, 128 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SynthGlobals {
    pub bpm: f32,
    pub sample_period: f32,
    pub block_period: f32,
    pub time: f32,
    pub beat_seconds: f32,
    pub bar_seconds: f32,
    pub sixteen_bar_seconds: f32,
    pub frame_count: u32,
    pub beat: f32,
    pub bar: f32,
    pub sixteen_bar: f32,
    pub param_count: u32,
    pub beat_time: f32,
    pub bar_time: f32,
    pub sixteen_bar_time: f32,
    /// `time` rounding error, so `time + time_lo` keeps f64 precision.
    pub time_lo: f32,
    /// `array<vec4<f32>, 4>`; slot `i` lives at `[i / 4][i % 4]`.
    pub params: [f32; MAX_PROGRAM_PARAMS],
}

impl SynthGlobals {
    pub fn new(render: &RenderParams<'_>) -> Self {
        let mut params = [0.0; MAX_PROGRAM_PARAMS];
        let count = render.params.len().min(MAX_PROGRAM_PARAMS);
        params[..count].copy_from_slice(&render.params[..count]);

        let time = render.time as f32;

        Self {
            bpm: render.tempo.bpm() as f32,
            sample_period: render.sample_period as f32,
            block_period: render.block_period as f32,
            time,
            beat_seconds: render.tempo.beat_seconds() as f32,
            bar_seconds: render.tempo.bar_seconds() as f32,
            sixteen_bar_seconds: render.tempo.sixteen_bar_seconds() as f32,
            frame_count: render.frames as u32,
            beat: render.phase.beat as f32,
            bar: render.phase.bar as f32,
            sixteen_bar: render.phase.sixteen_bar as f32,
            param_count: count as u32,
            beat_time: render.beat_time() as f32,
            bar_time: render.bar_time() as f32,
            sixteen_bar_time: render.sixteen_bar_time() as f32,
            time_lo: (render.time - time as f64) as f32,
            params,
        }
    }
}

/// WGSL: `synth_samples: array<vec4<f32>, 16>`. Unbound slots stay zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SampleMetas {
    pub slots: [[f32; 4]; MAX_PROGRAM_SAMPLES],
}

impl SampleMetas {
    pub fn new<T>(samples: &[Option<&SampleEntry<T>>]) -> Self {
        let mut slots = [[0.0; 4]; MAX_PROGRAM_SAMPLES];
        for (slot, entry) in slots.iter_mut().zip(samples) {
            if let Some(entry) = entry {
                *slot = entry.meta();
            }
        }
        Self { slots }
    }
}
