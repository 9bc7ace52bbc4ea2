use std::marker::PhantomData;

use holo_core::{FrameBuffer, HoloError, HoloResult};

use crate::gpu::GraphicsContext;

/// Texel format of uploaded images: plain (non-sRGB) RGBA, 8 bits per channel.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Sampling used for both input textures: linear filtering, clamped to the
/// edge on both axes. The kernel samples right up to the image border, and
/// wraparound there would bleed the opposite edge into the frame.
pub fn sampler_descriptor(label: &str) -> wgpu::SamplerDescriptor<'_> {
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    }
}

/// GPU-resident copy of an RGBA8 image plus its sampler.
pub struct TextureResource<'ctx> {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    _ctx: PhantomData<&'ctx GraphicsContext>,
}

impl<'ctx> TextureResource<'ctx> {
    /// Upload `image` unchanged (no resizing) into a new texture.
    pub fn upload(ctx: &'ctx GraphicsContext, label: &str, image: &FrameBuffer) -> HoloResult<Self> {
        ctx.check_extent(label, image.width, image.height)?;

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let ((texture, sampler), error) = ctx.capture_errors("upload_texture", |device, queue| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &image.data,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(image.width * 4),
                    rows_per_image: Some(image.height),
                },
                size,
            );
            let sampler = device.create_sampler(&sampler_descriptor(label));
            (texture, sampler)
        })?;

        if let Some(e) = error {
            texture.destroy();
            return Err(HoloError::Gpu(format!("failed to upload texture '{label}': {e}")));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        tracing::info!("Uploaded texture '{}' ({}x{})", label, image.width, image.height);

        Ok(Self {
            texture,
            view,
            sampler,
            width: image.width,
            height: image.height,
            _ctx: PhantomData,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

impl Drop for TextureResource<'_> {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_clamps_and_filters_linearly() {
        let desc = sampler_descriptor("g_texture1");
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Linear);
        assert!(desc.compare.is_none());
    }
}
