//! Phobz Synth Core
//!
//! GPU shader audio synthesis with bar-synchronised program hot-swapping.
//!
//! # Features
//!
//! - WGSL programs evaluated per audio frame on the GPU via wgpu compute
//! - Chunked render/read-back so one GPU round trip feeds many audio callbacks
//! - A beat clock and a cue state machine that swap programs exactly on bar boundaries
//! - Named samples bound into programs as textures, shared between host and guest decks
//! - Sample decoding (WAV, MP3, FLAC, AAC) via Symphonia, WAV output via hound
//! - Python bindings via PyO3 (when `python` feature is enabled)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use phobz_synth::{deck, SynthConfig, WgpuBackend};
//!
//! # async fn run() -> Result<(), phobz_synth::SynthError> {
//! let backend = Arc::new(WgpuBackend::create().await?);
//! let (mut handle, mut deck) = deck(backend, SynthConfig::default())?;
//!
//! handle.compile("fn main_sound(time: f32) -> vec2<f32> { return vec2<f32>(sin(TAU * 220.0 * time)); }").await?;
//! handle.apply_cue()?;
//!
//! // Inside the audio callback:
//! let mut left = vec![0.0; 1024];
//! let mut right = vec![0.0; 1024];
//! deck.process_block(0.0, &mut left, &mut right);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod pipeline;
pub mod sink;

// Re-export commonly used types
pub use audio::{load_audio, AudioData, AudioError};
pub use config::{BlockLayout, SynthConfig};
pub use engine::{
    deck, guest_deck, BeatClock, BeatPhase, BlockReport, CueEvent, CueStatus, Deck, DeckEvent,
    DeckHandle, SampleRegistry, SynthBackend, Tempo,
};
pub use error::{CompileError, Diagnostic, KernelError, SynthError};
pub use gpu::{GpuContext, GpuError, GpuOptions, WgpuBackend};
pub use pipeline::{render_offline, render_shader_to_wav, RenderStats};
pub use sink::{AudioSink, MemorySink, SinkError, WavSink};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
#[allow(deprecated)] // PyO3 0.27 deprecations - APIs still functional
mod python_bindings {
    use crate::audio::load_audio;
    use crate::config::SynthConfig;
    use crate::engine::ProgramInterface;
    use crate::gpu::shader;
    use crate::pipeline;
    use pyo3::exceptions::PyRuntimeError;
    use pyo3::prelude::*;
    use std::collections::HashMap;
    use std::path::Path;

    /// Validate a program. Returns None if it compiles, the error message otherwise.
    #[pyfunction]
    #[pyo3(signature = (source, sample_names=Vec::new()))]
    fn check_shader(source: &str, sample_names: Vec<String>) -> PyResult<Option<String>> {
        let interface = ProgramInterface::scan(source, |name| sample_names.iter().any(|n| n == name))
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        let assembled = shader::assemble(source, &interface);
        Ok(shader::validate(&assembled).err().map(|e| {
            e.translate(shader::PREAMBLE_LINES, source.lines().count() as u32)
                .to_string()
        }))
    }

    /// Render a program to a stereo WAV file.
    #[pyfunction]
    #[pyo3(signature = (source, output_path, seconds=8.0, bpm=120.0, sample_rate=44100, samples=None))]
    fn render_wav(
        py: Python<'_>,
        source: &str,
        output_path: &str,
        seconds: f64,
        bpm: f64,
        sample_rate: u32,
        samples: Option<HashMap<String, String>>,
    ) -> PyResult<(usize, usize)> {
        let decoded = samples
            .unwrap_or_default()
            .into_iter()
            .map(|(name, path)| {
                load_audio(Path::new(&path))
                    .map(|audio| (name, audio))
                    .map_err(|e| PyRuntimeError::new_err(format!("{}: {}", path, e)))
            })
            .collect::<PyResult<Vec<_>>>()?;

        let config = SynthConfig {
            bpm,
            sample_rate,
            ..SynthConfig::default()
        };
        config
            .validate()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;

        let source = source.to_string();
        let output = output_path.to_string();
        let result = py.allow_threads(|| {
            let _ = env_logger::try_init();
            let named: Vec<(&str, crate::AudioData)> = decoded
                .iter()
                .map(|(name, audio)| (name.as_str(), audio.clone()))
                .collect();
            pollster::block_on(pipeline::render_shader_to_wav(
                &source, &named, config, seconds, &output,
            ))
        });

        let stats = result.map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok((stats.frames, stats.swaps))
    }

    /// Phobz Synth Python module
    #[pymodule]
    pub fn phobz_synth(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add("__version__", env!("CARGO_PKG_VERSION"))?;
        m.add("PREAMBLE_LINES", shader::PREAMBLE_LINES)?;
        m.add_function(wrap_pyfunction!(check_shader, m)?)?;
        m.add_function(wrap_pyfunction!(render_wav, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python_bindings::*;
