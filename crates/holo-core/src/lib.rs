//! # holo-core
//!
//! Core types and primitives for the Holo lenticular renderer.
//! This crate contains the foundational types shared across all Holo crates:
//! the validated render configuration and its file/override layers, colors,
//! RGBA frame buffers, content hashing, and the error taxonomy.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;

pub use color::Color;
pub use config::{
    ImageSource, KernelParams, OutputSpec, RenderConfig, RenderConfigBuilder, RenderOverrides,
    ShaderSource,
};
pub use error::{HoloError, HoloResult};
pub use frame::FrameBuffer;
