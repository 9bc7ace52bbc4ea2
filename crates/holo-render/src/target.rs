use std::marker::PhantomData;

use holo_core::{HoloError, HoloResult};

use crate::gpu::GraphicsContext;

/// Color attachment format; readback assumes 4 bytes per pixel.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Opaque black.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

/// Offscreen color buffer sized exactly to the output resolution.
///
/// Rows are stored bottom-up: the full-screen quad maps the bottom of the
/// image to the first row, matching a GL framebuffer.
pub struct RenderTarget<'ctx> {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    _ctx: PhantomData<&'ctx GraphicsContext>,
}

impl<'ctx> RenderTarget<'ctx> {
    pub fn allocate(ctx: &'ctx GraphicsContext, width: u32, height: u32) -> HoloResult<Self> {
        ctx.check_extent("render target", width, height)?;

        let (texture, error) = ctx.capture_errors("allocate_render_target", |device, _| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("holo_render_target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        if let Some(e) = error {
            texture.destroy();
            return Err(HoloError::Gpu(format!(
                "failed to allocate {width}x{height} render target: {e}"
            )));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            width,
            height,
            _ctx: PhantomData,
        })
    }

    /// Begin a pass that clears the target to opaque black, with the viewport
    /// covering it exactly.
    pub fn begin_pass<'pass>(
        &'pass self,
        encoder: &'pass mut wgpu::CommandEncoder,
    ) -> wgpu::RenderPass<'pass> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("holo_composite_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(0.0, 0.0, self.width as f32, self.height as f32, 0.0, 1.0);
        pass
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for RenderTarget<'_> {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}
