//! Sample textures.
//!
//! A sample is packed into an `Rg32Float` raster `SAMPLE_RASTER_WIDTH` texels
//! wide, one stereo frame per texel in row-major order. Mono sources are
//! duplicated to both channels. Unused texels of the last row are zero.

use wgpu::{Device, Queue, Texture, TextureFormat, TextureUsages, TextureView};

use super::shader::SAMPLE_RASTER_WIDTH;
use crate::audio::AudioData;
use crate::error::SynthError;

const SAMPLE_FORMAT: TextureFormat = TextureFormat::Rg32Float;
const TEXEL_BYTES: u32 = 2 * std::mem::size_of::<f32>() as u32;

/// A sample texture that owns both texture and view.
/// The texture must outlive its view, so we keep them together.
#[derive(Debug)]
pub struct SampleTexture {
    texture: Texture,
    view: TextureView,
    width: u32,
    height: u32,
}

impl SampleTexture {
    /// Raster size for `frames` frames.
    pub fn raster_size(frames: usize) -> (u32, u32) {
        let height = frames.div_ceil(SAMPLE_RASTER_WIDTH as usize).max(1);
        (SAMPLE_RASTER_WIDTH, height as u32)
    }

    /// Interleaved `[l, r]` texel data for `audio`, padded to the full raster.
    pub fn pack(audio: &AudioData, width: u32, height: u32) -> Vec<f32> {
        let mut texels = vec![0.0f32; (width * height * 2) as usize];
        for (frame, texel) in texels.chunks_exact_mut(2).take(audio.num_frames()).enumerate() {
            texel.copy_from_slice(&audio.stereo_frame(frame));
        }
        texels
    }

    /// Upload `audio` as a new texture.
    pub fn encode(device: &Device, queue: &Queue, audio: &AudioData) -> Result<Self, SynthError> {
        let frames = audio.num_frames();
        if frames == 0 || audio.sample_rate == 0 {
            return Err(SynthError::invalid("sample has no frames or a zero sample rate"));
        }

        let (width, height) = Self::raster_size(frames);
        let max = device.limits().max_texture_dimension_2d;
        if height > max {
            return Err(SynthError::exhausted(format!(
                "sample of {} frames needs a {}x{} texture, device allows {}",
                frames, width, height, max
            )));
        }

        let sample = Self::create(device, "sample_texture", width, height);
        let texels = Self::pack(audio, width, height);
        sample.upload(queue, &texels);
        log::debug!("Encoded {} frames into {}x{} texture", frames, width, height);
        Ok(sample)
    }

    /// 1x1 zero texture bound in place of a sample that is no longer registered.
    pub fn placeholder(device: &Device, queue: &Queue) -> Self {
        let sample = Self::create(device, "sample_placeholder", 1, 1);
        sample.upload(queue, &[0.0, 0.0]);
        sample
    }

    fn create(device: &Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SAMPLE_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    fn upload(&self, queue: &Queue, texels: &[f32]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * TEXEL_BYTES),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn view(&self) -> &TextureView {
        &self.view
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
