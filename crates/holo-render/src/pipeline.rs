//! Compositing pipeline: shader compilation, the kernel parameter block and
//! the fixed group-0 binding surface every kernel is written against.

use std::marker::PhantomData;
use std::path::Path;

use holo_core::{HoloError, HoloResult, KernelParams, ShaderSource};
use wgpu::util::DeviceExt;

use crate::geometry::{Geometry, QUAD_TOPOLOGY};
use crate::gpu::GraphicsContext;
use crate::target::TARGET_FORMAT;
use crate::texture::TextureResource;

pub const PARAMS_BINDING: u32 = 0;
/// Color image ("g_texture1") and its sampler.
pub const COLOR_TEXTURE_BINDING: u32 = 1;
pub const COLOR_SAMPLER_BINDING: u32 = 2;
/// Depth image ("g_texture2") and its sampler.
pub const DEPTH_TEXTURE_BINDING: u32 = 3;
pub const DEPTH_SAMPLER_BINDING: u32 = 4;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

pub const BUILTIN_VERTEX_SHADER: &str = include_str!("shaders/fullscreen.wgsl");
pub const BUILTIN_FRAGMENT_SHADER: &str = include_str!("shaders/hologram.wgsl");

/// The kernel's parameter block, laid out to match `KernelParams` in WGSL
/// (uniform address space: vec4 fields on 16-byte boundaries).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelUniforms {
    /// Output width, height, 1.0, unused.
    pub screen: [f32; 4],
    /// Color image width, height.
    pub texture1_resolution: [f32; 2],
    pub threshold: f32,
    pub protrude: f32,
    pub line_number: f32,
    pub obliquity: f32,
    pub deviation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur_size: f32,
    pub blur_depth: f32,
    pub depth_image_blur_size: f32,
    pub border_size_x: f32,
    pub border_size_y: f32,
    /// RGB border color, alpha unused.
    pub border_color: [f32; 4],
}

impl KernelUniforms {
    /// Every parameter is copied verbatim, defaults included.
    pub fn new(output: (u32, u32), source: (u32, u32), params: &KernelParams) -> Self {
        Self {
            screen: [output.0 as f32, output.1 as f32, 1.0, 0.0],
            texture1_resolution: [source.0 as f32, source.1 as f32],
            threshold: params.threshold,
            protrude: params.protrude,
            line_number: params.line_number,
            obliquity: params.obliquity,
            deviation: params.deviation,
            scale_x: params.scale_x,
            scale_y: params.scale_y,
            offset_x: params.offset_x,
            offset_y: params.offset_y,
            blur_size: params.blur_size,
            blur_depth: params.blur_depth,
            depth_image_blur_size: params.depth_image_blur_size,
            border_size_x: params.border_size_x,
            border_size_y: params.border_size_y,
            border_color: [
                params.border_color.r,
                params.border_color.g,
                params.border_color.b,
                1.0,
            ],
        }
    }

    /// Bound values keyed by their WGSL field name.
    pub fn named(&self) -> Vec<(&'static str, f32)> {
        vec![
            ("screen.x", self.screen[0]),
            ("screen.y", self.screen[1]),
            ("screen.z", self.screen[2]),
            ("texture1_resolution.x", self.texture1_resolution[0]),
            ("texture1_resolution.y", self.texture1_resolution[1]),
            ("threshold", self.threshold),
            ("protrude", self.protrude),
            ("line_number", self.line_number),
            ("obliquity", self.obliquity),
            ("deviation", self.deviation),
            ("scale_x", self.scale_x),
            ("scale_y", self.scale_y),
            ("offset_x", self.offset_x),
            ("offset_y", self.offset_y),
            ("blur_size", self.blur_size),
            ("blur_depth", self.blur_depth),
            ("depth_image_blur_size", self.depth_image_blur_size),
            ("border_size_x", self.border_size_x),
            ("border_size_y", self.border_size_y),
            ("border_color.r", self.border_color[0]),
            ("border_color.g", self.border_color[1]),
            ("border_color.b", self.border_color[2]),
        ]
    }
}

/// Resolved WGSL source text for both stages.
#[derive(Debug, Clone)]
pub struct KernelSources {
    pub vertex_label: String,
    pub vertex: String,
    pub fragment_label: String,
    pub fragment: String,
}

impl KernelSources {
    pub fn builtin() -> Self {
        Self {
            vertex_label: "builtin vertex".to_string(),
            vertex: BUILTIN_VERTEX_SHADER.to_string(),
            fragment_label: "builtin fragment".to_string(),
            fragment: BUILTIN_FRAGMENT_SHADER.to_string(),
        }
    }

    /// Read both stages. A missing shader file is an `InputNotFound`.
    pub fn load(vertex: &ShaderSource, fragment: &ShaderSource) -> HoloResult<Self> {
        let (vertex_label, vertex) = read_stage(vertex, BUILTIN_VERTEX_SHADER)?;
        let (fragment_label, fragment) = read_stage(fragment, BUILTIN_FRAGMENT_SHADER)?;
        Ok(Self {
            vertex_label,
            vertex,
            fragment_label,
            fragment,
        })
    }
}

fn read_stage(source: &ShaderSource, builtin: &str) -> HoloResult<(String, String)> {
    match source {
        ShaderSource::Builtin => Ok((source.label(), builtin.to_string())),
        ShaderSource::Inline { label, source } => Ok((label.clone(), source.clone())),
        ShaderSource::File(path) => read_shader_file(path).map(|text| (source.label(), text)),
    }
}

fn read_shader_file(path: &Path) -> HoloResult<String> {
    if !path.is_file() {
        return Err(HoloError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path).map_err(|_| HoloError::InputNotFound {
        path: path.to_path_buf(),
    })?;
    String::from_utf8(bytes).map_err(|e| {
        HoloError::shader(path.display().to_string(), format!("source is not UTF-8: {e}"))
    })
}

fn compile(
    ctx: &GraphicsContext,
    stage: &str,
    label: &str,
    source: &str,
) -> HoloResult<wgpu::ShaderModule> {
    let (module, error) = ctx.capture_errors("compile_shader", |device, _| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })?;
    match error {
        Some(e) => Err(HoloError::shader(format!("{stage} stage ({label})"), e.to_string())),
        None => Ok(module),
    }
}

fn bind_group_layout_entries() -> [wgpu::BindGroupLayoutEntry; 5] {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let sampler = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };
    [
        wgpu::BindGroupLayoutEntry {
            binding: PARAMS_BINDING,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(
                    std::mem::size_of::<KernelUniforms>() as u64
                ),
            },
            count: None,
        },
        texture(COLOR_TEXTURE_BINDING),
        sampler(COLOR_SAMPLER_BINDING),
        texture(DEPTH_TEXTURE_BINDING),
        sampler(DEPTH_SAMPLER_BINDING),
    ]
}

/// Linked vertex stage + compositing kernel.
pub struct CompositingPipeline<'ctx> {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    _ctx: PhantomData<&'ctx GraphicsContext>,
}

impl<'ctx> CompositingPipeline<'ctx> {
    /// Compile both stages and link them. Any compiler or link diagnostic
    /// (syntax error, binding mismatch, missing entry point) is a
    /// `ShaderCompile` error.
    pub fn build(ctx: &'ctx GraphicsContext, sources: &KernelSources) -> HoloResult<Self> {
        let vertex = compile(ctx, "vertex", &sources.vertex_label, &sources.vertex)?;
        let fragment = compile(ctx, "fragment", &sources.fragment_label, &sources.fragment)?;

        let ((bind_group_layout, pipeline), error) =
            ctx.capture_errors("link_pipeline", |device, _| {
                let bind_group_layout =
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("holo_kernel_bind_group_layout"),
                        entries: &bind_group_layout_entries(),
                    });
                let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("holo_kernel_pipeline_layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("holo_kernel_pipeline"),
                    layout: Some(&layout),
                    vertex: wgpu::VertexState {
                        module: &vertex,
                        entry_point: VERTEX_ENTRY,
                        buffers: &[Geometry::layout()],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &fragment,
                        entry_point: FRAGMENT_ENTRY,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: TARGET_FORMAT,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: QUAD_TOPOLOGY,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                });
                (bind_group_layout, pipeline)
            })?;

        if let Some(e) = error {
            return Err(HoloError::shader(
                format!("pipeline link ({} + {})", sources.vertex_label, sources.fragment_label),
                e.to_string(),
            ));
        }

        Ok(Self {
            pipeline,
            bind_group_layout,
            _ctx: PhantomData,
        })
    }

    /// Upload the parameter block and bind both textures to their fixed slots.
    pub fn bind(
        &self,
        ctx: &'ctx GraphicsContext,
        uniforms: &KernelUniforms,
        color: &TextureResource<'ctx>,
        depth: &TextureResource<'ctx>,
    ) -> HoloResult<KernelBindings<'ctx>> {
        for (name, value) in uniforms.named() {
            tracing::debug!("bind {} = {}", name, value);
        }

        let ((params, bind_group), error) = ctx.capture_errors("bind_kernel", |device, _| {
            let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("holo_kernel_params"),
                contents: bytemuck::bytes_of(uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("holo_kernel_bind_group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: PARAMS_BINDING,
                        resource: params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: COLOR_TEXTURE_BINDING,
                        resource: wgpu::BindingResource::TextureView(color.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: COLOR_SAMPLER_BINDING,
                        resource: wgpu::BindingResource::Sampler(color.sampler()),
                    },
                    wgpu::BindGroupEntry {
                        binding: DEPTH_TEXTURE_BINDING,
                        resource: wgpu::BindingResource::TextureView(depth.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: DEPTH_SAMPLER_BINDING,
                        resource: wgpu::BindingResource::Sampler(depth.sampler()),
                    },
                ],
            });
            (params, bind_group)
        })?;

        let bindings = KernelBindings {
            params,
            bind_group,
            _ctx: PhantomData,
        };
        match error {
            Some(e) => Err(HoloError::Gpu(format!("failed to bind kernel inputs: {e}"))),
            None => Ok(bindings),
        }
    }

    /// Record the single full-screen draw.
    pub fn draw<'pass>(
        &'pass self,
        pass: &mut wgpu::RenderPass<'pass>,
        bindings: &'pass KernelBindings<'_>,
        geometry: &'pass Geometry<'_>,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bindings.bind_group, &[]);
        pass.set_vertex_buffer(0, geometry.buffer().slice(..));
        pass.draw(0..Geometry::vertex_count(), 0..1);
    }
}

/// Parameter buffer and bind group for one draw.
pub struct KernelBindings<'ctx> {
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    _ctx: PhantomData<&'ctx GraphicsContext>,
}

impl Drop for KernelBindings<'_> {
    fn drop(&mut self) {
        self.params.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holo_core::Color;
    use std::collections::HashSet;

    #[test]
    fn test_uniform_block_layout() {
        assert_eq!(std::mem::size_of::<KernelUniforms>(), 96);
        assert_eq!(std::mem::offset_of!(KernelUniforms, texture1_resolution), 16);
        assert_eq!(std::mem::offset_of!(KernelUniforms, line_number), 32);
        assert_eq!(std::mem::offset_of!(KernelUniforms, border_color), 80);
    }

    #[test]
    fn test_params_pass_through_verbatim() {
        let params = KernelParams {
            protrude: -2.5,
            obliquity: 0.25,
            deviation: 7.0,
            border_color: Color::rgb(0.2, 0.4, 0.6),
            ..KernelParams::default()
        };
        let u = KernelUniforms::new((256, 128), (512, 300), &params);
        assert_eq!(u.screen, [256.0, 128.0, 1.0, 0.0]);
        assert_eq!(u.texture1_resolution, [512.0, 300.0]);
        assert_eq!(u.protrude, -2.5);
        assert_eq!(u.obliquity, 0.25);
        assert_eq!(u.deviation, 7.0);
        assert_eq!(u.line_number, params.line_number);
        assert_eq!(u.border_color, [0.2, 0.4, 0.6, 1.0]);
    }

    #[test]
    fn test_zero_blur_reaches_kernel_as_zero() {
        let params = KernelParams {
            blur_size: 0.0,
            depth_image_blur_size: 0.0,
            ..KernelParams::default()
        };
        let u = KernelUniforms::new((64, 64), (64, 64), &params);
        assert_eq!(u.blur_size.to_bits(), 0.0f32.to_bits());
        assert_eq!(u.depth_image_blur_size.to_bits(), 0.0f32.to_bits());
    }

    #[test]
    fn test_every_parameter_has_a_unique_binding_name() {
        let u = KernelUniforms::new((1, 1), (1, 1), &KernelParams::default());
        let names: Vec<_> = u.named().into_iter().map(|(n, _)| n).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        for (key, _) in KernelParams::default().scalars() {
            assert!(names.contains(&key), "{key} is not bound");
        }
    }

    #[test]
    fn test_builtin_kernel_declares_binding_surface() {
        for field in KernelParams::default().scalars().map(|(n, _)| n) {
            assert!(
                BUILTIN_FRAGMENT_SHADER.contains(&format!("{field}: f32")),
                "kernel is missing {field}"
            );
        }
        for binding in [
            COLOR_TEXTURE_BINDING,
            COLOR_SAMPLER_BINDING,
            DEPTH_TEXTURE_BINDING,
            DEPTH_SAMPLER_BINDING,
        ] {
            assert!(BUILTIN_FRAGMENT_SHADER.contains(&format!("@binding({binding})")));
        }
        assert!(BUILTIN_FRAGMENT_SHADER.contains(&format!("fn {FRAGMENT_ENTRY}")));
        assert!(BUILTIN_VERTEX_SHADER.contains(&format!("fn {VERTEX_ENTRY}")));
    }

    #[test]
    fn test_color_and_depth_use_distinct_slots() {
        let slots = [
            PARAMS_BINDING,
            COLOR_TEXTURE_BINDING,
            COLOR_SAMPLER_BINDING,
            DEPTH_TEXTURE_BINDING,
            DEPTH_SAMPLER_BINDING,
        ];
        let unique: HashSet<_> = slots.iter().collect();
        assert_eq!(unique.len(), slots.len());
    }

    #[test]
    fn test_missing_shader_file_is_input_not_found() {
        let path = std::env::temp_dir().join("holo_no_such_shader.wgsl");
        let _ = std::fs::remove_file(&path);
        let err = KernelSources::load(&ShaderSource::Builtin, &ShaderSource::File(path.clone()))
            .unwrap_err();
        assert!(matches!(err, HoloError::InputNotFound { path: p } if p == path));
    }

    #[test]
    fn test_inline_source_used_verbatim() {
        let sources = KernelSources::load(
            &ShaderSource::Inline {
                label: "test vs".into(),
                source: "// vs".into(),
            },
            &ShaderSource::Builtin,
        )
        .unwrap();
        assert_eq!(sources.vertex, "// vs");
        assert_eq!(sources.vertex_label, "test vs");
        assert_eq!(sources.fragment, BUILTIN_FRAGMENT_SHADER);
    }
}
