use std::marker::PhantomData;

use holo_core::{HoloError, HoloResult};
use wgpu::util::DeviceExt;

use crate::gpu::GraphicsContext;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Full-screen quad as a triangle strip (bottom-left, bottom-right, top-left,
/// top-right). `uv = (xy + 1) / 2`, so texture row 0 lands on the bottom of
/// clip space and the target fills bottom-up.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 0.0] },
    Vertex { position: [1.0, -1.0, 0.0], uv: [1.0, 0.0] },
    Vertex { position: [-1.0, 1.0, 0.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, 1.0, 0.0], uv: [1.0, 1.0] },
];

pub const QUAD_TOPOLOGY: wgpu::PrimitiveTopology = wgpu::PrimitiveTopology::TriangleStrip;

const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

/// GPU vertex buffer holding [`QUAD_VERTICES`].
pub struct Geometry<'ctx> {
    buffer: wgpu::Buffer,
    _ctx: PhantomData<&'ctx GraphicsContext>,
}

impl<'ctx> Geometry<'ctx> {
    pub fn full_screen_quad(ctx: &'ctx GraphicsContext) -> HoloResult<Self> {
        let (buffer, error) = ctx.capture_errors("create_geometry", |device, _| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("holo_quad_vertices"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            })
        })?;
        if let Some(e) = error {
            buffer.destroy();
            return Err(HoloError::Gpu(format!("failed to create quad geometry: {e}")));
        }
        Ok(Self {
            buffer,
            _ctx: PhantomData,
        })
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    pub fn vertex_count() -> u32 {
        QUAD_VERTICES.len() as u32
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl Drop for Geometry<'_> {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_covers_clip_space() {
        let xs: Vec<f32> = QUAD_VERTICES.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = QUAD_VERTICES.iter().map(|v| v.position[1]).collect();
        for corner in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)] {
            assert!(QUAD_VERTICES
                .iter()
                .any(|v| v.position[0] == corner.0 && v.position[1] == corner.1));
        }
        assert!(xs.iter().chain(ys.iter()).all(|c| c.abs() == 1.0));
    }

    #[test]
    fn test_uv_tracks_position() {
        for v in QUAD_VERTICES {
            assert_eq!(v.uv[0], (v.position[0] + 1.0) / 2.0);
            assert_eq!(v.uv[1], (v.position[1] + 1.0) / 2.0);
        }
    }

    #[test]
    fn test_vertex_layout_matches_struct() {
        let layout = Geometry::layout();
        assert_eq!(layout.array_stride, 20);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(Geometry::vertex_count(), 4);
    }
}
