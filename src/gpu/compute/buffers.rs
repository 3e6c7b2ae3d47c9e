//! GPU buffer management for synth passes.

use wgpu::{Buffer, BufferUsages, Device};

use super::params::{SampleMetas, SynthGlobals};

/// Bytes per output texel: two stereo frames.
pub const TEXEL_BYTES: u64 = 4 * std::mem::size_of::<f32>() as u64;

/// Buffers owned by one kernel, sized for one render block.
pub struct SynthBuffers {
    pub globals: Buffer,
    pub metas: Buffer,
    pub output: Buffer,
    pub staging: Buffer,
    pub texels: usize,
}

impl SynthBuffers {
    pub fn new(device: &Device, texels: usize) -> Self {
        let globals = Self::create_uniform_buffer(
            device,
            "synth_globals",
            std::mem::size_of::<SynthGlobals>() as u64,
        );
        let metas = Self::create_uniform_buffer(
            device,
            "synth_sample_metas",
            std::mem::size_of::<SampleMetas>() as u64,
        );

        let size = texels as u64 * TEXEL_BYTES;
        let output = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("synth_output"),
            size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("synth_staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            globals,
            metas,
            output,
            staging,
            texels,
        }
    }

    fn create_uniform_buffer(device: &Device, label: &str, size: u64) -> Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}
