//! Copy the render target back to host memory as a top-down RGBA8 frame.

use holo_core::{FrameBuffer, HoloError, HoloResult};

use crate::gpu::GraphicsContext;
use crate::target::RenderTarget;

/// Row pitch of a texture-to-buffer copy, padded to wgpu's 256-byte alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    wgpu::util::align_to(width * 4, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

/// Strip row padding and reverse row order.
///
/// `padded` holds `height` rows of `padded_bpr` bytes, first row at the
/// bottom of the image; the result is tightly packed with the top row first.
pub fn unpack_bottom_up(padded: &[u8], width: u32, height: u32, padded_bpr: u32) -> Vec<u8> {
    let row = width as usize * 4;
    let pitch = padded_bpr as usize;
    let mut out = Vec::with_capacity(row * height as usize);
    for src_row in (0..height as usize).rev() {
        let start = src_row * pitch;
        out.extend_from_slice(&padded[start..start + row]);
    }
    out
}

/// Mappable staging buffer, destroyed on every exit path.
struct StagingBuffer(wgpu::Buffer);

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

pub struct FrameReadback;

impl FrameReadback {
    /// Copy `target` into a staging buffer, wait for it, and return the
    /// pixels with the top image row first.
    pub fn capture(ctx: &GraphicsContext, target: &RenderTarget<'_>) -> HoloResult<FrameBuffer> {
        let (width, height) = (target.width(), target.height());
        let padded_bpr = padded_bytes_per_row(width);

        let (staging, error) = ctx.capture_errors("readback", |device, queue| {
            let staging = StagingBuffer(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("holo_readback"),
                size: padded_bpr as wgpu::BufferAddress * height as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("holo_readback_encoder"),
            });
            encoder.copy_texture_to_buffer(
                wgpu::ImageCopyTexture {
                    texture: target.texture(),
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::ImageCopyBuffer {
                    buffer: &staging.0,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_bpr),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
            queue.submit(Some(encoder.finish()));
            staging
        })?;
        if let Some(e) = error {
            return Err(HoloError::Gpu(format!("failed to copy render target: {e}")));
        }

        let device = ctx.device()?;
        let slice = staging.0.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = tx.send(v);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(HoloError::Gpu(format!("failed to map readback buffer: {e}"))),
            Err(_) => return Err(HoloError::Gpu("readback mapping never completed".into())),
        }

        let pixels = {
            let data = slice.get_mapped_range();
            unpack_bottom_up(&data, width, height, padded_bpr)
        };
        staging.0.unmap();

        FrameBuffer::from_rgba(width, height, pixels)
            .ok_or_else(|| HoloError::Gpu("readback size mismatch".into()))
    }
}
