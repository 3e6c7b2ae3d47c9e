//! Chunked render/read-back/playback.
//!
//! One GPU pass renders `chunk_size` audio blocks at once; the audio callback
//! then drains that render block one callback at a time. The fixed cost of the
//! GPU round trip is paid once per chunk instead of once per callback.

use std::collections::HashMap;

use super::clock::Tempo;
use super::kernel::{ComputeKernel, RenderBlock, RenderParams};
use super::program::{Program, MAX_PROGRAM_PARAMS, MAX_PROGRAM_SAMPLES};
use super::registry::{SampleEntry, SampleMap};
use crate::config::BlockLayout;

/// State shared by every pass issued within one callback.
pub struct RenderInputs<'a, T> {
    pub tempo: Tempo,
    pub samples: &'a SampleMap<T>,
    pub parameters: &'a HashMap<String, f32>,
}

pub struct ChunkRenderer<K: ComputeKernel> {
    kernel: K,
    layout: BlockLayout,
    block: RenderBlock,
    /// Next frame of `block` to hand out.
    read_head: usize,
    /// Set when `read_head` is at 0 and `block` has not been rendered for this cycle.
    stale: bool,
    generation: u64,
    renders: u64,
}

impl<K: ComputeKernel> ChunkRenderer<K> {
    pub fn new(kernel: K, layout: BlockLayout, tempo_generation: u64) -> Self {
        Self {
            kernel,
            layout,
            block: RenderBlock::new(layout.frames_per_render()),
            read_head: 0,
            stale: true,
            generation: tempo_generation,
            renders: 0,
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Audio block within the render block that the next callback reads, `0..chunk_size`.
    pub fn chunk_head(&self) -> usize {
        self.read_head / self.layout.buffer_size
    }

    pub fn read_head(&self) -> usize {
        self.read_head
    }

    /// GPU passes issued so far.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Force the next consume to start a fresh pass at chunk 0.
    pub fn reset(&mut self) {
        self.read_head = 0;
        self.stale = true;
    }

    /// Reset if the tempo changed since the last pass. Returns true on reset.
    pub fn sync_tempo(&mut self, generation: u64) -> bool {
        if generation == self.generation {
            return false;
        }
        self.generation = generation;
        self.reset();
        true
    }

    /// Fill `left`/`right` with the next frames of `program`.
    ///
    /// `time` is the elapsed time of the first requested frame; it seeds any pass
    /// that has to be issued mid-request. Without a program the output is silence
    /// and the kernel is not touched.
    pub fn consume(
        &mut self,
        program: Option<&Program<K::Program>>,
        inputs: &RenderInputs<'_, K::Texture>,
        time: f64,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        debug_assert_eq!(left.len(), right.len());
        let Some(program) = program else {
            left.fill(0.0);
            right.fill(0.0);
            self.reset();
            return;
        };

        let total = left.len().min(right.len());
        let mut written = 0;
        while written < total {
            let at = time + written as f64 * self.layout.sample_period();
            self.render_block_if_cursor_at_zero(program, inputs, at);

            let count = (self.block.frames() - self.read_head).min(total - written);
            self.block.copy_to(
                self.read_head,
                &mut left[written..written + count],
                &mut right[written..written + count],
            );
            self.read_head += count;
            written += count;

            if self.read_head == self.block.frames() {
                self.reset();
            }
        }
    }

    fn render_block_if_cursor_at_zero(
        &mut self,
        program: &Program<K::Program>,
        inputs: &RenderInputs<'_, K::Texture>,
        time: f64,
    ) {
        if !self.stale {
            return;
        }

        let mut params = [0.0f32; MAX_PROGRAM_PARAMS];
        let param_count = program.param_names().len().min(MAX_PROGRAM_PARAMS);
        for (slot, name) in program.param_names().iter().take(param_count).enumerate() {
            params[slot] = inputs.parameters.get(name).copied().unwrap_or(0.0);
        }

        // Unregistered samples stay `None` and render as silence.
        let mut bound: [Option<&SampleEntry<K::Texture>>; MAX_PROGRAM_SAMPLES] =
            [None; MAX_PROGRAM_SAMPLES];
        let sample_count = program.required_sample_names().len().min(MAX_PROGRAM_SAMPLES);
        for (slot, name) in program
            .required_sample_names()
            .iter()
            .take(sample_count)
            .enumerate()
        {
            bound[slot] = inputs.samples.get(name).map(|entry| entry.as_ref());
        }

        let render_params = RenderParams {
            tempo: inputs.tempo,
            time,
            phase: inputs.tempo.phase_at(time),
            sample_period: self.layout.sample_period(),
            block_period: self.layout.block_period(),
            frames: self.block.frames(),
            params: &params[..param_count],
        };

        if let Err(e) = self.kernel.render(
            program.compiled(),
            &render_params,
            &bound[..sample_count],
            &mut self.block,
        ) {
            log::error!("Render pass failed, playing silence for this chunk: {}", e);
            self.block.silence();
        }

        log::trace!("Rendered chunk at t={:.4}s", time);
        self.stale = false;
        self.renders += 1;
    }
}
