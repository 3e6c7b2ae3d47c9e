//! Bind group layouts of every synth pipeline.
//!
//! Group 0 is shared by all programs on a device and created once. Group 1
//! depends on how many samples a program binds and is created per program.

use std::num::NonZeroU64;

use wgpu::{BindGroupLayout, BindGroupLayoutEntry, Device, ShaderStages};

use super::compute::{SampleMetas, SynthGlobals, TEXEL_BYTES};

/// Builder for compute-only bind group layouts.
pub struct BindGroupLayoutBuilder {
    label: Option<&'static str>,
    visibility: ShaderStages,
    entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayoutBuilder {
    pub fn new(label: &'static str) -> Self {
        Self {
            label: Some(label),
            visibility: ShaderStages::COMPUTE,
            entries: Vec::new(),
        }
    }

    fn buffer(mut self, binding: u32, ty: wgpu::BufferBindingType, min_size: u64) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility: self.visibility,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(min_size),
            },
            count: None,
        });
        self
    }

    /// Uniform buffer holding one `T`.
    pub fn uniform<T: bytemuck::Pod>(self, binding: u32) -> Self {
        self.buffer(
            binding,
            wgpu::BufferBindingType::Uniform,
            std::mem::size_of::<T>() as u64,
        )
    }

    /// Read-write storage buffer of at least one `min_size`-byte element.
    pub fn storage(self, binding: u32, min_size: u64) -> Self {
        self.buffer(
            binding,
            wgpu::BufferBindingType::Storage { read_only: false },
            min_size,
        )
    }

    /// 2D float texture read with `textureLoad`.
    pub fn texture_2d_unfilterable(mut self, binding: u32) -> Self {
        self.entries.push(BindGroupLayoutEntry {
            binding,
            visibility: self.visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self, device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: self.label,
            entries: &self.entries,
        })
    }
}

fn globals_builder() -> BindGroupLayoutBuilder {
    BindGroupLayoutBuilder::new("synth_globals_layout")
        .uniform::<SynthGlobals>(0)
        .storage(1, TEXEL_BYTES)
        .uniform::<SampleMetas>(2)
}

fn samples_builder(samples: usize) -> BindGroupLayoutBuilder {
    (0..samples as u32).fold(
        BindGroupLayoutBuilder::new("synth_samples_layout"),
        BindGroupLayoutBuilder::texture_2d_unfilterable,
    )
}

/// Group 0: `synth` globals, `synth_out` frames, `synth_samples` metadata.
pub fn create_globals_layout(device: &Device) -> BindGroupLayout {
    globals_builder().build(device)
}

/// Group 1: one texture per sample the program binds, in slot order.
pub fn create_samples_layout(device: &Device, samples: usize) -> BindGroupLayout {
    samples_builder(samples).build(device)
}
