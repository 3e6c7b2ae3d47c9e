//! GPU synthesis using wgpu compute shaders.
//!
//! Programs are WGSL compute shaders evaluated headless, two audio frames per
//! work-item, with the result read back into host memory once per render block.
//! Metal is used on macOS, Vulkan or GL elsewhere.

pub mod backend;
pub mod compute;
pub mod context;
pub mod layouts;
pub mod shader;
pub mod textures;

pub use backend::WgpuBackend;
pub use compute::{SynthPipeline, WgpuKernel};
pub use context::{GpuContext, GpuError, GpuOptions};
pub use shader::{PREAMBLE, PREAMBLE_LINES};
pub use textures::SampleTexture;
