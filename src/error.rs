//! Error taxonomy shared by the engine, the GPU backend and the pipeline.

use std::fmt;

use crate::audio::AudioError;
use crate::gpu::GpuError;
use crate::sink::SinkError;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Compile error:\n{0}")]
    Compile(#[from] CompileError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("Command queue is full")]
    QueueFull,
}

impl SynthError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted(message.into())
    }
}

/// Errors raised while a compute pass runs on the audio context.
///
/// These never escape the real-time path; the affected block is rendered as silence.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("GPU buffer mapping failed: {0}")]
    BufferMapFailed(String),
    #[error("Render block holds {capacity} frames, kernel produced {produced}")]
    SizeMismatch { capacity: usize, produced: usize },
    #[error("Device lost: {0}")]
    DeviceLost(String),
}

/// A single compiler message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line, relative to whatever source the producer compiled.
    pub line: Option<u32>,
    /// 1-based column.
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: Option<u32>, column: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "line {}:{}: {}", line, column, self.message),
            (Some(line), None) => write!(f, "line {}: {}", line, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// The shader pipeline rejected a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(vec![Diagnostic::new(None, None, message)])
    }

    /// Map line numbers of the assembled shader back onto the performer's source.
    ///
    /// Lines inside the injected preamble or the generated postamble have no counterpart
    /// in the performer's text and lose their position.
    pub fn translate(mut self, preamble_lines: u32, source_lines: u32) -> Self {
        for diagnostic in &mut self.diagnostics {
            let translated = diagnostic
                .line
                .and_then(|line| line.checked_sub(preamble_lines))
                .filter(|&line| line >= 1 && line <= source_lines);
            if translated.is_none() {
                diagnostic.column = None;
            }
            diagnostic.line = translated;
        }
        self
    }

    /// Line of the first diagnostic that has one.
    pub fn first_line(&self) -> Option<u32> {
        self.diagnostics.iter().find_map(|d| d.line)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diagnostics.is_empty() {
            return f.write_str("unknown compile error");
        }
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
