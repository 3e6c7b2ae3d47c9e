//! Decoded audio for the sample registry.
//!
//! This module provides:
//! - Sample file decoding via Symphonia (WAV, MP3, FLAC, AAC)
//! - `AudioData`, the raw PCM handed to the sample encoder
//! - Synthetic one-shots and loops for tests and demos

pub mod loader;
pub mod synth;

pub use loader::{load_audio, load_audio_bytes, load_audio_head, AudioData, AudioError};
pub use synth::{click_loop, kick, sine, white_noise};
