//! Sample file decoding using Symphonia.
//!
//! Supports WAV, MP3, FLAC, and AAC formats.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use thiserror::Error;

/// Errors that can occur while decoding a sample file.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to open audio file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to probe audio format: {0}")]
    ProbeError(#[from] symphonia::core::errors::Error),

    #[error("No audio track found in file")]
    NoAudioTrack,

    #[error("Unknown sample rate")]
    UnknownSampleRate,

    #[error("Malformed audio: {0}")]
    Malformed(String),
}

/// Decoded PCM.
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples normalized to -1.0..1.0
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: usize,
}

impl AudioData {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Interleave two planar channel buffers.
    pub fn from_channels(left: &[f32], right: &[f32], sample_rate: u32) -> Self {
        let frames = left.len().min(right.len());
        let mut samples = Vec::with_capacity(frames * 2);
        for (l, r) in left.iter().zip(right).take(frames) {
            samples.push(*l);
            samples.push(*r);
        }
        Self {
            samples,
            sample_rate,
            channels: 2,
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }

    /// Left/right pair for a frame. Mono is duplicated, extra channels are ignored.
    pub fn stereo_frame(&self, frame: usize) -> [f32; 2] {
        let base = frame * self.channels;
        match self.channels {
            0 => [0.0, 0.0],
            1 => {
                let v = self.samples.get(base).copied().unwrap_or(0.0);
                [v, v]
            }
            _ => [
                self.samples.get(base).copied().unwrap_or(0.0),
                self.samples.get(base + 1).copied().unwrap_or(0.0),
            ],
        }
    }

    /// Reject buffers that cannot be encoded as a sample.
    pub fn check(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::Malformed("sample rate is zero".into()));
        }
        if self.channels == 0 {
            return Err(AudioError::Malformed("no channels".into()));
        }
        if self.num_frames() == 0 {
            return Err(AudioError::Malformed("no frames".into()));
        }
        if self.samples.len() % self.channels != 0 {
            return Err(AudioError::Malformed(format!(
                "{} samples do not divide into {} channels",
                self.samples.len(),
                self.channels
            )));
        }
        Ok(())
    }
}

/// Decode a sample file.
///
/// The audio is decoded to interleaved f32 samples normalized to -1.0..1.0.
///
/// # Example
///
/// ```no_run
/// use phobz_synth::audio::loader::load_audio;
/// use std::path::Path;
///
/// let audio = load_audio(Path::new("amen.wav")).unwrap();
/// println!("{} frames at {}Hz", audio.num_frames(), audio.sample_rate);
/// ```
pub fn load_audio(path: &Path) -> Result<AudioData, AudioError> {
    let file = File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let label = path.display().to_string();
    decode(Box::new(file), hint, &label, DecodeOptions::default())
}

/// Decode an encoded sample held in memory, e.g. fetched over the network.
///
/// `extension` helps the format probe; the content is sniffed either way.
pub fn load_audio_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioData, AudioError> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    decode(
        Box::new(Cursor::new(bytes)),
        hint,
        "<memory>",
        DecodeOptions::default(),
    )
}

/// Decode at most `max_frames` frames of a sample file.
///
/// Long recordings only need their head when they are used as one-shots.
pub fn load_audio_head(path: &Path, max_frames: usize) -> Result<AudioData, AudioError> {
    let file = File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let label = path.display().to_string();
    decode(
        Box::new(file),
        hint,
        &label,
        DecodeOptions {
            max_frames: Some(max_frames),
        },
    )
}

#[derive(Debug, Clone, Copy, Default)]
struct DecodeOptions {
    max_frames: Option<usize>,
}

fn decode(
    source: Box<dyn MediaSource>,
    hint: Hint,
    label: &str,
    options: DecodeOptions,
) -> Result<AudioData, AudioError> {
    let mss = MediaSourceStream::new(source, Default::default());
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(AudioError::UnknownSampleRate)?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
    let max_samples = options.max_frames.map(|frames| frames * channels);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    while max_samples.map_or(true, |max| samples.len() < max) {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(symphonia::core::errors::Error::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet in {}: {}", label, msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
        });
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if let Some(max) = max_samples {
        samples.truncate(max);
    }

    let audio = AudioData {
        samples,
        sample_rate,
        channels,
    };
    log::debug!(
        "Decoded {}: {} frames, {} channels, {}Hz",
        label,
        audio.num_frames(),
        channels,
        sample_rate
    );
    Ok(audio)
}
