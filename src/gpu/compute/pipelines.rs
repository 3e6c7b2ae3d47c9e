//! Compute pipeline creation for compiled programs.

use wgpu::{BindGroupLayout, ComputePipeline, Device, ShaderModule};

use crate::gpu::layouts::create_samples_layout;
use crate::gpu::shader::ENTRY_POINT;

/// A compiled program: its pipeline and the layout of its sample textures.
#[derive(Debug)]
pub struct SynthPipeline {
    pub pipeline: ComputePipeline,
    pub samples_layout: BindGroupLayout,
    pub sample_count: usize,
}

impl SynthPipeline {
    pub fn new(
        device: &Device,
        shader: &ShaderModule,
        globals_layout: &BindGroupLayout,
        sample_count: usize,
    ) -> Self {
        let samples_layout = create_samples_layout(device, sample_count);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("synth_pipeline_layout"),
            bind_group_layouts: &[globals_layout, &samples_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("synth_pipeline"),
            layout: Some(&pipeline_layout),
            module: shader,
            entry_point: Some(ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            samples_layout,
            sample_count,
        }
    }
}
