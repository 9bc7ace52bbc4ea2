//! Single-shot render orchestration: validated inputs in, one image file out.

use std::path::PathBuf;
use std::time::Instant;

use holo_core::hash::hash_frame;
use holo_core::{FrameBuffer, HoloError, HoloResult, KernelParams, OutputSpec, RenderConfig};
use serde::Serialize;

use crate::geometry::Geometry;
use crate::gpu::{ContextOptions, ContextProvider, GraphicsContext, HeadlessProvider};
use crate::image_loader::load_source;
use crate::pipeline::{CompositingPipeline, KernelSources, KernelUniforms};
use crate::readback::FrameReadback;
use crate::target::RenderTarget;
use crate::texture::TextureResource;

/// Decoded images and shader text for one render.
///
/// Loading happens entirely on the host, so every input problem surfaces
/// before a GPU context exists.
#[derive(Debug, Clone)]
pub struct RenderInputs {
    pub image: FrameBuffer,
    pub depth: FrameBuffer,
    pub shaders: KernelSources,
}

impl RenderInputs {
    pub fn load(config: &RenderConfig) -> HoloResult<Self> {
        let image = load_source(config.image())?;
        let depth = load_source(config.depth())?;
        let shaders = KernelSources::load(config.vertex_shader(), config.fragment_shader())?;
        Ok(Self {
            image,
            depth,
            shaders,
        })
    }
}

/// A composited frame plus the adapter that produced it.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub frame: FrameBuffer,
    pub adapter: wgpu::AdapterInfo,
}

/// Summary of a completed render, printed by `holo render --json`.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub adapter: String,
    pub backend: String,
    pub content_hash: String,
    pub elapsed_ms: u128,
}

/// Runs the compositing pipeline once per call.
///
/// Each call creates its own context through the provider and releases it
/// before returning, whether or not the render succeeded.
pub struct HologramRenderer<P: ContextProvider = HeadlessProvider> {
    provider: P,
}

impl HologramRenderer<HeadlessProvider> {
    pub fn new() -> Self {
        Self::with_provider(HeadlessProvider::from_env())
    }

    pub fn with_options(options: ContextOptions) -> Self {
        Self::with_provider(HeadlessProvider::new(options))
    }
}

impl Default for HologramRenderer<HeadlessProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ContextProvider> HologramRenderer<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Render `config` and write the result to its output path.
    ///
    /// All GPU resources are gone by the time the file is encoded, so an
    /// encode failure never holds device memory.
    pub fn render(&self, config: &RenderConfig) -> HoloResult<RenderReport> {
        let started = Instant::now();
        let rendered = self.render_frame(config)?;
        let output = config.output();
        holo_encode::write_image(&rendered.frame, &output.path)?;

        Ok(RenderReport {
            output: output.path.clone(),
            width: rendered.frame.width,
            height: rendered.frame.height,
            adapter: rendered.adapter.name.clone(),
            backend: format!("{:?}", rendered.adapter.backend),
            content_hash: hash_frame(&rendered.frame).to_hex(),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }

    /// Render `config` to memory without touching the output path.
    pub fn render_frame(&self, config: &RenderConfig) -> HoloResult<RenderedFrame> {
        let inputs = RenderInputs::load(config)?;
        self.render_with_inputs(&inputs, config.output(), config.params())
    }

    /// Composite already-loaded inputs.
    pub fn render_with_inputs(
        &self,
        inputs: &RenderInputs,
        output: &OutputSpec,
        params: &KernelParams,
    ) -> HoloResult<RenderedFrame> {
        let mut ctx = self.provider.create_context()?;
        let adapter = ctx.adapter_info().clone();
        let result = composite(&ctx, inputs, output, params);
        ctx.release();

        let frame = result?;
        tracing::info!(
            "Composited {}x{} frame on '{}'",
            frame.width,
            frame.height,
            adapter.name
        );
        Ok(RenderedFrame { frame, adapter })
    }
}

/// Upload, bind, draw once and read back. Every resource created here is
/// dropped (and destroyed) before this returns.
fn composite(
    ctx: &GraphicsContext,
    inputs: &RenderInputs,
    output: &OutputSpec,
    params: &KernelParams,
) -> HoloResult<FrameBuffer> {
    ctx.check_extent("output", output.width, output.height)?;

    let color = TextureResource::upload(ctx, "color", &inputs.image)?;
    let depth = TextureResource::upload(ctx, "depth", &inputs.depth)?;
    let target = RenderTarget::allocate(ctx, output.width, output.height)?;
    let pipeline = CompositingPipeline::build(ctx, &inputs.shaders)?;
    let geometry = Geometry::full_screen_quad(ctx)?;

    let uniforms = KernelUniforms::new((output.width, output.height), color.size(), params);
    let bindings = pipeline.bind(ctx, &uniforms, &color, &depth)?;

    let ((), error) = ctx.capture_errors("draw", |device, queue| {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("holo_composite_encoder"),
        });
        {
            let mut pass = target.begin_pass(&mut encoder);
            pipeline.draw(&mut pass, &bindings, &geometry);
        }
        queue.submit(Some(encoder.finish()));
    })?;
    if let Some(e) = error {
        return Err(HoloError::Gpu(format!("compositing draw failed: {e}")));
    }

    FrameReadback::capture(ctx, &target)
}
