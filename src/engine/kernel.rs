//! Seams between the engine and the GPU.
//!
//! The engine never talks to a graphics API directly. A [`SynthBackend`]
//! compiles program source and encodes samples on the control context, and
//! hands out [`ComputeKernel`]s that the audio context drives once per render
//! block.

use std::future::Future;

use super::clock::{BeatPhase, Tempo};
use super::program::ProgramInterface;
use super::registry::{EncodedSample, SampleEntry};
use crate::audio::AudioData;
use crate::config::BlockLayout;
use crate::error::{KernelError, SynthError};

/// Global inputs of one render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderParams<'a> {
    pub tempo: Tempo,
    /// Elapsed seconds at frame 0 of the pass.
    pub time: f64,
    /// Phase at frame 0 of the pass.
    pub phase: BeatPhase,
    pub sample_period: f64,
    pub block_period: f64,
    /// Frames to produce.
    pub frames: usize,
    /// Parameter values in the program's slot order.
    pub params: &'a [f32],
}

impl RenderParams<'_> {
    /// Seconds elapsed inside the current beat.
    pub fn beat_time(&self) -> f64 {
        self.phase.beat * self.tempo.beat_seconds()
    }

    pub fn bar_time(&self) -> f64 {
        self.phase.bar * self.tempo.bar_seconds()
    }

    pub fn sixteen_bar_time(&self) -> f64 {
        self.phase.sixteen_bar * self.tempo.sixteen_bar_seconds()
    }
}

/// Host-side buffer of interleaved stereo frames filled by one render pass.
#[derive(Debug, Clone)]
pub struct RenderBlock {
    samples: Vec<f32>,
}

impl RenderBlock {
    pub fn new(frames: usize) -> Self {
        Self {
            samples: vec![0.0; frames * 2],
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn frame(&self, index: usize) -> [f32; 2] {
        [self.samples[index * 2], self.samples[index * 2 + 1]]
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn silence(&mut self) {
        self.samples.fill(0.0);
    }

    /// Copy `left.len()` frames starting at `start` into planar outputs.
    pub fn copy_to(&self, start: usize, left: &mut [f32], right: &mut [f32]) {
        let src = &self.samples[start * 2..(start + left.len()) * 2];
        for ((frame, l), r) in src.chunks_exact(2).zip(left.iter_mut()).zip(right.iter_mut()) {
            *l = frame[0];
            *r = frame[1];
        }
    }
}

/// Evaluates a compiled program into a render block. Owned by the audio context.
pub trait ComputeKernel: Send {
    type Program: Send + Sync + 'static;
    type Texture: Send + Sync + 'static;

    /// Run one pass and read it back synchronously into `out`.
    ///
    /// `samples` is in the program's sample slot order. `None` marks a sample the
    /// program was compiled against but which is no longer registered; it must
    /// render as silence.
    fn render(
        &mut self,
        program: &Self::Program,
        params: &RenderParams<'_>,
        samples: &[Option<&SampleEntry<Self::Texture>>],
        out: &mut RenderBlock,
    ) -> Result<(), KernelError>;
}

/// Program compiler, sample encoder and kernel factory.
pub trait SynthBackend: Send + Sync + 'static {
    type Program: Send + Sync + 'static;
    type Texture: Send + Sync + 'static;
    type Kernel: ComputeKernel<Program = Self::Program, Texture = Self::Texture> + 'static;

    /// Lines injected ahead of the performer's source.
    fn preamble_lines(&self) -> u32;

    /// Compile performer source. Diagnostics carry lines of the assembled program.
    fn compile(
        &self,
        source: &str,
        interface: &ProgramInterface,
    ) -> impl Future<Output = Result<Self::Program, SynthError>> + Send;

    fn encode_sample(&self, audio: &AudioData) -> Result<EncodedSample<Self::Texture>, SynthError>;

    fn create_kernel(&self, layout: BlockLayout) -> Result<Self::Kernel, SynthError>;
}
