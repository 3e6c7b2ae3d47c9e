//! CPU stand-in for the GPU backend.
//!
//! Programs are plain text. The first `// level <x>` comment sets the left
//! channel; the right channel carries the frame time so tests can check where
//! each frame was rendered. A line containing `oops` fails to compile with a
//! diagnostic on that line of the assembled program.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use phobz_synth::audio::AudioData;
use phobz_synth::config::BlockLayout;
use phobz_synth::engine::{
    ComputeKernel, EncodedSample, ProgramInterface, RenderBlock, RenderParams, SampleEntry,
    SynthBackend,
};
use phobz_synth::error::{CompileError, Diagnostic, KernelError, SynthError};
use phobz_synth::SynthConfig;

pub const PREAMBLE_LINES: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct TestProgram {
    pub level: f32,
    pub samples: usize,
    pub params: usize,
}

#[derive(Debug, Default)]
pub struct TestBackend {
    pub renders: Arc<AtomicU64>,
}

impl TestBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn renders(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    fn compile_now(
        &self,
        source: &str,
        interface: &ProgramInterface,
    ) -> Result<TestProgram, SynthError> {
        if let Some(index) = source.lines().position(|line| line.contains("oops")) {
            let line = PREAMBLE_LINES + index as u32 + 1;
            return Err(CompileError::new(vec![Diagnostic::new(
                Some(line),
                Some(5),
                "no definition in scope for identifier: `oops`",
            )])
            .into());
        }
        if !source.contains("fn main_sound") {
            return Err(CompileError::message("missing `fn main_sound`").into());
        }
        let level = source
            .lines()
            .find_map(|line| line.trim().strip_prefix("// level "))
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0.0);
        Ok(TestProgram {
            level,
            samples: interface.samples.len(),
            params: interface.params.len(),
        })
    }
}

impl SynthBackend for TestBackend {
    type Program = TestProgram;
    type Texture = ();
    type Kernel = TestKernel;

    fn preamble_lines(&self) -> u32 {
        PREAMBLE_LINES
    }

    fn compile(
        &self,
        source: &str,
        interface: &ProgramInterface,
    ) -> impl Future<Output = Result<TestProgram, SynthError>> + Send {
        std::future::ready(self.compile_now(source, interface))
    }

    fn encode_sample(&self, audio: &AudioData) -> Result<EncodedSample<()>, SynthError> {
        let frames = audio.num_frames() as u32;
        Ok(EncodedSample {
            texture: (),
            width: 2048,
            height: frames.div_ceil(2048),
        })
    }

    fn create_kernel(&self, _layout: BlockLayout) -> Result<TestKernel, SynthError> {
        Ok(TestKernel {
            renders: self.renders.clone(),
        })
    }
}

/// Left = program level, scaled by every bound parameter and silenced when a
/// bound sample is missing. Right = frame time.
pub struct TestKernel {
    renders: Arc<AtomicU64>,
}

impl ComputeKernel for TestKernel {
    type Program = TestProgram;
    type Texture = ();

    fn render(
        &mut self,
        program: &TestProgram,
        params: &RenderParams<'_>,
        samples: &[Option<&SampleEntry<()>>],
        out: &mut RenderBlock,
    ) -> Result<(), KernelError> {
        if out.frames() < params.frames {
            return Err(KernelError::SizeMismatch {
                capacity: out.frames(),
                produced: params.frames,
            });
        }
        self.renders.fetch_add(1, Ordering::Relaxed);

        let mut level = program.level;
        for value in params.params.iter().take(program.params) {
            level *= value;
        }
        if samples.iter().take(program.samples).any(|s| s.is_none()) {
            level = 0.0;
        }

        for (i, frame) in out.samples_mut().chunks_exact_mut(2).take(params.frames).enumerate() {
            frame[0] = level;
            frame[1] = (params.time + i as f64 * params.sample_period) as f32;
        }
        Ok(())
    }
}

/// Source of a program that plays `level` on the left channel.
pub fn program(level: f32) -> String {
    format!(
        "// level {}\nfn main_sound(time: f32) -> vec2<f32> {{\n    return vec2<f32>({}, time);\n}}\n",
        level, level
    )
}

/// 1 kHz, 2 s bars at 120 bpm, 10-frame blocks, 4 blocks per render.
pub fn config() -> SynthConfig {
    SynthConfig {
        sample_rate: 1000,
        buffer_size: 10,
        chunk_size: 4,
        time_error_threshold: 0.05,
        bpm: 120.0,
        command_capacity: 16,
    }
}

pub fn block_seconds(config: &SynthConfig) -> f64 {
    config.buffer_size as f64 / config.sample_rate as f64
}

/// Index of the first frame whose left channel equals `level`.
pub fn first_frame_at(left: &[f32], level: f32) -> Option<usize> {
    left.iter().position(|&s| s == level)
}

/// Audio-context driver used by the tests: feeds exact host timestamps and
/// keeps everything it played.
pub struct Player {
    pub block_seconds: f64,
    pub next_index: i64,
    /// Added to every host timestamp.
    pub offset: f64,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub reports: Vec<phobz_synth::BlockReport>,
}

impl Player {
    pub fn new(config: &SynthConfig) -> Self {
        Self {
            block_seconds: block_seconds(config),
            next_index: 0,
            offset: 0.0,
            left: Vec::new(),
            right: Vec::new(),
            reports: Vec::new(),
        }
    }

    pub fn host_time(&self) -> f64 {
        self.next_index as f64 * self.block_seconds + self.offset
    }

    /// Play one block on every deck in order, recording only the first deck.
    pub fn cycle(&mut self, decks: &mut [&mut phobz_synth::Deck<TestBackend>]) {
        let time = self.host_time();
        for (i, deck) in decks.iter_mut().enumerate() {
            let frames = deck.config().buffer_size;
            let mut left = vec![0.0; frames];
            let mut right = vec![0.0; frames];
            let report = deck.process_block(time, &mut left, &mut right);
            if i == 0 {
                self.left.extend_from_slice(&left);
                self.right.extend_from_slice(&right);
                self.reports.push(report);
            }
        }
        self.next_index += 1;
    }

    pub fn play(&mut self, deck: &mut phobz_synth::Deck<TestBackend>, blocks: usize) {
        for _ in 0..blocks {
            self.cycle(&mut [&mut *deck]);
        }
    }

    /// Index into `reports` of the first block that swapped programs.
    pub fn first_swap(&self) -> Option<usize> {
        self.reports.iter().position(|r| r.swapped)
    }
}

/// Compile `source`, commit it, and run a pre-roll block that straddles the
/// first bar boundary so the program is live from t = 0.
///
/// The pre-roll starts 0.95 blocks early, which keeps every later bar boundary
/// half a frame away from a frame edge.
pub async fn go_live(
    handle: &mut phobz_synth::DeckHandle<TestBackend>,
    deck: &mut phobz_synth::Deck<TestBackend>,
    source: &str,
) {
    handle.compile(source).await.unwrap();
    handle.apply_cue().unwrap();
    let config = deck.config().clone();
    let mut left = vec![0.0; config.buffer_size];
    let mut right = vec![0.0; config.buffer_size];
    deck.process_block(-0.95 * block_seconds(&config), &mut left, &mut right);
    assert_eq!(deck.live_source(), Some(source));
}
