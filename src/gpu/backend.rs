//! wgpu implementation of [`SynthBackend`].

use std::future::Future;
use std::sync::Arc;

use wgpu::BindGroupLayout;

use super::compute::{SynthPipeline, WgpuKernel};
use super::context::{GpuContext, GpuOptions};
use super::layouts::create_globals_layout;
use super::shader::{self, PREAMBLE_LINES, WORKGROUP_SIZE};
use super::textures::SampleTexture;
use crate::audio::AudioData;
use crate::config::BlockLayout;
use crate::engine::kernel::SynthBackend;
use crate::engine::program::ProgramInterface;
use crate::engine::registry::EncodedSample;
use crate::error::SynthError;

/// Compiles WGSL programs, encodes sample textures and creates compute kernels
/// on one GPU device.
pub struct WgpuBackend {
    ctx: GpuContext,
    globals_layout: Arc<BindGroupLayout>,
    placeholder: Arc<SampleTexture>,
}

impl WgpuBackend {
    pub fn new(ctx: GpuContext) -> Self {
        let globals_layout = Arc::new(create_globals_layout(&ctx.device));
        let placeholder = Arc::new(SampleTexture::placeholder(&ctx.device, &ctx.queue));
        Self {
            ctx,
            globals_layout,
            placeholder,
        }
    }

    /// Create a backend on the default adapter.
    pub async fn create() -> Result<Self, SynthError> {
        Ok(Self::new(GpuContext::new().await?))
    }

    pub async fn create_with(options: &GpuOptions) -> Result<Self, SynthError> {
        Ok(Self::new(GpuContext::with_options(options).await?))
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// Assemble, validate and build a pipeline for `source`.
    pub fn compile_now(
        &self,
        source: &str,
        interface: &ProgramInterface,
    ) -> Result<SynthPipeline, SynthError> {
        shader::check_interface(interface)?;
        let assembled = shader::assemble(source, interface);
        shader::validate(&assembled)?;

        let module = self
            .ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("synth_program"),
                source: wgpu::ShaderSource::Wgsl(assembled.into()),
            });
        let pipeline = SynthPipeline::new(
            &self.ctx.device,
            &module,
            &self.globals_layout,
            interface.samples.len(),
        );
        log::debug!(
            "Built synth pipeline ({} samples, {} params)",
            interface.samples.len(),
            interface.params.len()
        );
        Ok(pipeline)
    }
}

impl SynthBackend for WgpuBackend {
    type Program = SynthPipeline;
    type Texture = SampleTexture;
    type Kernel = WgpuKernel;

    fn preamble_lines(&self) -> u32 {
        PREAMBLE_LINES
    }

    fn compile(
        &self,
        source: &str,
        interface: &ProgramInterface,
    ) -> impl Future<Output = Result<SynthPipeline, SynthError>> + Send {
        std::future::ready(self.compile_now(source, interface))
    }

    fn encode_sample(&self, audio: &AudioData) -> Result<EncodedSample<SampleTexture>, SynthError> {
        let texture = SampleTexture::encode(&self.ctx.device, &self.ctx.queue, audio)?;
        Ok(EncodedSample {
            width: texture.width(),
            height: texture.height(),
            texture,
        })
    }

    fn create_kernel(&self, layout: BlockLayout) -> Result<WgpuKernel, SynthError> {
        let texels = layout.texels_per_render();
        let workgroups = (texels as u32).div_ceil(WORKGROUP_SIZE);
        let max = self.ctx.device.limits().max_compute_workgroups_per_dimension;
        if workgroups > max {
            return Err(SynthError::exhausted(format!(
                "render block of {} frames needs {} workgroups, device allows {}",
                layout.frames_per_render(),
                workgroups,
                max
            )));
        }

        Ok(WgpuKernel::new(
            self.ctx.device.clone(),
            self.ctx.queue.clone(),
            &self.globals_layout,
            self.placeholder.clone(),
            texels,
        ))
    }
}
