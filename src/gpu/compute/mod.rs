//! GPU compute passes that evaluate synth programs.
//!
//! This module provides the wgpu side of the render loop: uniform layouts,
//! buffers, per-program pipelines, and the kernel that runs one pass.

mod buffers;
mod params;
mod pipelines;

pub mod kernel;

pub use buffers::TEXEL_BYTES;
pub use kernel::WgpuKernel;
pub use params::{SampleMetas, SynthGlobals};
pub use pipelines::SynthPipeline;
