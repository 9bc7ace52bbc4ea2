//! # holo-render
//!
//! Offscreen GPU compositing for the Holo lenticular renderer.
//!
//! A render is a single synchronous sequence: decode the color and depth
//! images, create a headless wgpu context, upload both as textures, bind
//! every kernel parameter, draw one full-screen quad into an RGBA8 target,
//! read the target back top-row-first and hand it to `holo-encode`.
//!
//! Every GPU object borrows the [`GraphicsContext`] that created it and
//! destroys itself on drop, so no resource can outlive the context and
//! early returns release everything they allocated.

pub mod geometry;
pub mod gpu;
pub mod image_loader;
pub mod pipeline;
pub mod readback;
pub mod renderer;
pub mod target;
pub mod texture;

pub use geometry::{Geometry, Vertex};
pub use gpu::{ContextOptions, ContextProvider, GraphicsContext, HeadlessProvider};
pub use image_loader::{load_image, load_image_from_bytes, load_source};
pub use pipeline::{CompositingPipeline, KernelBindings, KernelSources, KernelUniforms};
pub use readback::FrameReadback;
pub use renderer::{HologramRenderer, RenderInputs, RenderReport, RenderedFrame};
pub use target::RenderTarget;
pub use texture::TextureResource;
