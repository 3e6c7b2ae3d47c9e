//! One synth pass: upload globals, dispatch, read the block back.

use std::sync::Arc;
use wgpu::{BindGroup, BindGroupLayout, Device, Queue};

use super::buffers::{SynthBuffers, TEXEL_BYTES};
use super::params::{SampleMetas, SynthGlobals};
use super::pipelines::SynthPipeline;
use crate::engine::kernel::{ComputeKernel, RenderBlock, RenderParams};
use crate::engine::registry::SampleEntry;
use crate::error::KernelError;
use crate::gpu::shader::WORKGROUP_SIZE;
use crate::gpu::textures::SampleTexture;

/// Compute kernel owned by one deck's audio context.
pub struct WgpuKernel {
    device: Arc<Device>,
    queue: Arc<Queue>,
    buffers: SynthBuffers,
    globals_group: BindGroup,
    placeholder: Arc<SampleTexture>,
}

impl WgpuKernel {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        globals_layout: &BindGroupLayout,
        placeholder: Arc<SampleTexture>,
        texels: usize,
    ) -> Self {
        let buffers = SynthBuffers::new(&device, texels);
        let globals_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("synth_globals"),
            layout: globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.globals.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.output.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.metas.as_entire_binding(),
                },
            ],
        });

        Self {
            device,
            queue,
            buffers,
            globals_group,
            placeholder,
        }
    }

    fn create_samples_group(
        &self,
        program: &SynthPipeline,
        samples: &[Option<&SampleEntry<SampleTexture>>],
    ) -> BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = (0..program.sample_count)
            .map(|slot| {
                let texture = samples
                    .get(slot)
                    .copied()
                    .flatten()
                    .map(|entry| &entry.texture)
                    .unwrap_or(self.placeholder.as_ref());
                wgpu::BindGroupEntry {
                    binding: slot as u32,
                    resource: wgpu::BindingResource::TextureView(texture.view()),
                }
            })
            .collect();

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("synth_samples"),
            layout: &program.samples_layout,
            entries: &entries,
        })
    }

    fn read_staging(&self, texels: usize, out: &mut RenderBlock) -> Result<(), KernelError> {
        let size = texels as u64 * TEXEL_BYTES;
        let slice = self.buffers.staging.slice(..size);

        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| KernelError::DeviceLost(e.to_string()))?;

        rx.recv()
            .map_err(|e| KernelError::BufferMapFailed(e.to_string()))?
            .map_err(|e| KernelError::BufferMapFailed(format!("{:?}", e)))?;

        let data = slice.get_mapped_range();
        let values: &[f32] = bytemuck::cast_slice(&data);
        out.samples_mut()[..values.len()].copy_from_slice(values);
        drop(data);
        self.buffers.staging.unmap();
        Ok(())
    }
}

impl ComputeKernel for WgpuKernel {
    type Program = SynthPipeline;
    type Texture = SampleTexture;

    fn render(
        &mut self,
        program: &SynthPipeline,
        params: &RenderParams<'_>,
        samples: &[Option<&SampleEntry<SampleTexture>>],
        out: &mut RenderBlock,
    ) -> Result<(), KernelError> {
        let texels = params.frames / 2;
        if texels > self.buffers.texels || out.frames() < texels * 2 {
            return Err(KernelError::SizeMismatch {
                capacity: (self.buffers.texels * 2).min(out.frames()),
                produced: params.frames,
            });
        }

        self.queue.write_buffer(
            &self.buffers.globals,
            0,
            bytemuck::bytes_of(&SynthGlobals::new(params)),
        );
        self.queue.write_buffer(
            &self.buffers.metas,
            0,
            bytemuck::bytes_of(&SampleMetas::new(samples)),
        );
        let samples_group = self.create_samples_group(program, samples);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("synth_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("synth_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &self.globals_group, &[]);
            pass.set_bind_group(1, &samples_group, &[]);
            pass.dispatch_workgroups((texels as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(
            &self.buffers.output,
            0,
            &self.buffers.staging,
            0,
            texels as u64 * TEXEL_BYTES,
        );
        self.queue.submit(Some(encoder.finish()));

        self.read_staging(texels, out)
    }
}
