//! Synthetic one-shots and loops.
//!
//! Deterministic material for registering samples in tests and demos without
//! touching the filesystem.

use std::f32::consts::PI;

use super::AudioData;

/// Mono sine tone.
pub fn sine(frequency: f32, sample_rate: u32, duration: f32, amplitude: f32) -> AudioData {
    let num_samples = (duration * sample_rate as f32) as usize;
    let samples = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * PI * frequency * t).sin()
        })
        .collect();
    AudioData::mono(samples, sample_rate)
}

/// Stereo white noise from a seeded LCG, so runs are reproducible.
pub fn white_noise(sample_rate: u32, duration: f32, amplitude: f32, seed: u64) -> AudioData {
    let frames = (duration * sample_rate as f32) as usize;
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        amplitude * ((state >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0)
    };
    let left: Vec<f32> = (0..frames).map(|_| next()).collect();
    let right: Vec<f32> = (0..frames).map(|_| next()).collect();
    AudioData::from_channels(&left, &right, sample_rate)
}

/// Bass drum hit: 150 Hz falling to 50 Hz over 150 ms.
pub fn kick(sample_rate: u32) -> AudioData {
    let num_samples = (0.15 * sample_rate as f32) as usize;
    let samples = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let freq = 50.0 + 100.0 * (-t * 30.0).exp();
            let amp = (-t * 15.0).exp();
            amp * (2.0 * PI * freq * t).sin()
        })
        .collect();
    AudioData::mono(samples, sample_rate)
}

/// One bar of 4/4 clicks at `bpm`, with an accented downbeat.
pub fn click_loop(bpm: f32, sample_rate: u32, click_freq: f32) -> AudioData {
    let samples_per_beat = (60.0 / bpm * sample_rate as f32) as usize;
    let click_samples = (sample_rate as f32 * 0.01) as usize;
    let mut samples = vec![0.0; samples_per_beat * 4];

    for beat in 0..4 {
        let accent = if beat == 0 { 1.0 } else { 0.5 };
        let start = beat * samples_per_beat;
        for i in 0..click_samples.min(samples_per_beat) {
            let t = i as f32 / sample_rate as f32;
            let envelope = (1.0 - i as f32 / click_samples as f32).powi(2);
            samples[start + i] = accent * envelope * (2.0 * PI * click_freq * t).sin();
        }
    }

    AudioData::mono(samples, sample_rate)
}
