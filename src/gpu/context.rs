//! Headless device setup for synth passes.

use std::sync::Arc;
use wgpu::{Adapter, Device, Instance, Queue};

use super::shader::{SAMPLE_RASTER_WIDTH, WORKGROUP_SIZE};

/// Errors that can occur during GPU setup.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Adapter {adapter} cannot run synth programs: {reason}")]
    Unsupported { adapter: String, reason: String },
    #[error("Failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Adapter selection.
#[derive(Debug, Clone)]
pub struct GpuOptions {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    /// Use the software adapter, for machines without a GPU.
    pub force_fallback_adapter: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::GL,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

/// Device and queue shared by the backend and every kernel it creates.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Arc<Adapter>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
}

impl GpuContext {
    /// Open the default adapter. Metal on macOS, Vulkan or GL elsewhere.
    pub async fn new() -> Result<Self, GpuError> {
        Self::with_options(&GpuOptions::default()).await
    }

    pub async fn with_options(options: &GpuOptions) -> Result<Self, GpuError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                force_fallback_adapter: options.force_fallback_adapter,
                compatible_surface: None,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;
        check_adapter(&adapter)?;

        // Long samples need tall textures; take whatever the adapter offers.
        let required_limits = wgpu::Limits {
            max_texture_dimension_2d: adapter.limits().max_texture_dimension_2d,
            ..wgpu::Limits::downlevel_defaults()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("phobz-synth"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        let info = adapter.get_info();
        log::info!(
            "Using GPU adapter {} ({:?}), longest sample {:.0}s at 44.1 kHz",
            info.name,
            info.backend,
            max_sample_frames(&device) as f64 / 44100.0
        );

        Ok(Self {
            instance,
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// [`GpuContext::new`] for callers outside an async runtime.
    pub fn blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Frames of the longest sample a texture on this device can hold.
    pub fn max_sample_frames(&self) -> u64 {
        max_sample_frames(&self.device)
    }
}

fn max_sample_frames(device: &Device) -> u64 {
    SAMPLE_RASTER_WIDTH as u64 * device.limits().max_texture_dimension_2d as u64
}

fn check_adapter(adapter: &Adapter) -> Result<(), GpuError> {
    let unsupported = |reason: String| GpuError::Unsupported {
        adapter: adapter.get_info().name,
        reason,
    };

    let downlevel = adapter.get_downlevel_capabilities();
    if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
        return Err(unsupported("no compute shader support".to_string()));
    }
    let limits = adapter.limits();
    if limits.max_compute_invocations_per_workgroup < WORKGROUP_SIZE {
        return Err(unsupported(format!(
            "{} invocations per workgroup, need {}",
            limits.max_compute_invocations_per_workgroup, WORKGROUP_SIZE
        )));
    }
    if limits.max_texture_dimension_2d < SAMPLE_RASTER_WIDTH {
        return Err(unsupported(format!(
            "textures limited to {} texels per row, need {}",
            limits.max_texture_dimension_2d, SAMPLE_RASTER_WIDTH
        )));
    }
    Ok(())
}
