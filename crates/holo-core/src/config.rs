//! Render configuration.
//!
//! A [`RenderConfig`] is the immutable, validated snapshot of every parameter the
//! renderer consumes. It is produced either directly through
//! [`RenderConfig::builder`] or by resolving a stack of [`RenderOverrides`]
//! layers (built-in defaults <- config file <- command-line flags).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{HoloError, HoloResult};

pub const DEFAULT_IMAGE_FILE: &str = "input.jpg";
pub const DEFAULT_DEPTH_FILE: &str = "depth.png";
pub const DEFAULT_OUTPUT_FILE: &str = "output_hologram.png";
pub const DEFAULT_OUTPUT_WIDTH: u32 = 1440;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 2560;
pub const DEFAULT_BORDER_COLOR: &str = "#FFFFFF";

/// Where an input image comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    File(PathBuf),
    /// Already-read, still-encoded image bytes (PNG, JPEG, ...).
    Bytes { label: String, data: Arc<[u8]> },
}

impl ImageSource {
    pub fn bytes(label: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        ImageSource::Bytes {
            label: label.into(),
            data: data.into(),
        }
    }

    /// Path used when reporting errors about this input.
    pub fn display_path(&self) -> PathBuf {
        match self {
            ImageSource::File(path) => path.clone(),
            ImageSource::Bytes { label, .. } => PathBuf::from(format!("<memory:{label}>")),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::File(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::File(path.to_path_buf())
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::File(PathBuf::from(path))
    }
}

/// Where a shader stage's source text comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShaderSource {
    /// The stage compiled into the renderer.
    #[default]
    Builtin,
    File(PathBuf),
    Inline { label: String, source: String },
}

impl ShaderSource {
    pub fn label(&self) -> String {
        match self {
            ShaderSource::Builtin => "builtin".to_string(),
            ShaderSource::File(path) => path.display().to_string(),
            ShaderSource::Inline { label, .. } => label.clone(),
        }
    }
}

/// Output file and resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Every scalar the compositing kernel receives, already in kernel units.
///
/// These values are passed through to the kernel verbatim; nothing here
/// clamps or rescales them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    /// Depth cutoff selecting which depth range participates in the effect.
    pub threshold: f32,
    /// Signed magnitude of the perceived depth displacement.
    pub protrude: f32,
    /// Interleaved view-lines per unit output height.
    pub line_number: f32,
    /// Skew of the interleave pattern (lens pitch angle).
    pub obliquity: f32,
    /// Parallax spread between synthesized views.
    pub deviation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Color smoothing footprint; 0 disables it.
    pub blur_size: f32,
    /// Normalized depth below which color smoothing applies.
    pub blur_depth: f32,
    /// Depth-map pre-smoothing footprint; 0 disables it.
    pub depth_image_blur_size: f32,
    pub border_color: Color,
    /// Border thickness as a fraction of output width.
    pub border_size_x: f32,
    /// Border thickness as a fraction of output height.
    pub border_size_y: f32,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            threshold: 15.0,
            protrude: 0.0,
            line_number: 19.61603,
            obliquity: 0.101593,
            deviation: 15.832_996,
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            blur_size: 5.0,
            blur_depth: 0.25,
            depth_image_blur_size: 50.0,
            border_color: Color::WHITE,
            border_size_x: 0.02,
            border_size_y: 0.01,
        }
    }
}

impl KernelParams {
    /// Scalars paired with their configuration key, in binding order.
    pub fn scalars(&self) -> [(&'static str, f32); 14] {
        [
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
        ]
    }

    pub fn validate(&self) -> HoloResult<()> {
        for (name, value) in self.scalars() {
            if !value.is_finite() {
                return Err(HoloError::config(format!("{name} must be finite, got {value}")));
            }
        }
        if !self.border_color.is_finite() {
            return Err(HoloError::config("border_color must be finite"));
        }

        let non_negative = [
            ("threshold", self.threshold),
            ("blur_size", self.blur_size),
            ("depth_image_blur_size", self.depth_image_blur_size),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(HoloError::config(format!("{name} must be >= 0, got {value}")));
            }
        }
        if self.line_number <= 0.0 {
            return Err(HoloError::config(format!(
                "line_number must be > 0, got {}",
                self.line_number
            )));
        }
        for (name, value) in [("scale_x", self.scale_x), ("scale_y", self.scale_y)] {
            if value == 0.0 {
                return Err(HoloError::config(format!("{name} must be non-zero")));
            }
        }
        if !(0.0..=1.0).contains(&self.blur_depth) {
            return Err(HoloError::config(format!(
                "blur_depth must be within [0, 1], got {}",
                self.blur_depth
            )));
        }
        for (name, value) in [
            ("border_size_x", self.border_size_x),
            ("border_size_y", self.border_size_y),
        ] {
            if !(0.0..=0.5).contains(&value) {
                return Err(HoloError::config(format!(
                    "{name} must be within [0, 0.5], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Immutable, validated render configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    image: ImageSource,
    depth: ImageSource,
    output: OutputSpec,
    params: KernelParams,
    vertex_shader: ShaderSource,
    fragment_shader: ShaderSource,
}

impl RenderConfig {
    /// Start a configuration with default output size, parameters and shaders.
    pub fn builder(
        image: impl Into<ImageSource>,
        depth: impl Into<ImageSource>,
        output: impl Into<PathBuf>,
    ) -> RenderConfigBuilder {
        RenderConfigBuilder {
            image: image.into(),
            depth: depth.into(),
            output: OutputSpec {
                path: output.into(),
                width: DEFAULT_OUTPUT_WIDTH,
                height: DEFAULT_OUTPUT_HEIGHT,
            },
            params: KernelParams::default(),
            vertex_shader: ShaderSource::Builtin,
            fragment_shader: ShaderSource::Builtin,
        }
    }

    pub fn image(&self) -> &ImageSource {
        &self.image
    }

    pub fn depth(&self) -> &ImageSource {
        &self.depth
    }

    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    pub fn vertex_shader(&self) -> &ShaderSource {
        &self.vertex_shader
    }

    pub fn fragment_shader(&self) -> &ShaderSource {
        &self.fragment_shader
    }
}

/// Builder for [`RenderConfig`]; `build()` performs all validation.
#[derive(Debug, Clone)]
pub struct RenderConfigBuilder {
    image: ImageSource,
    depth: ImageSource,
    output: OutputSpec,
    params: KernelParams,
    vertex_shader: ShaderSource,
    fragment_shader: ShaderSource,
}

impl RenderConfigBuilder {
    pub fn output_size(mut self, width: u32, height: u32) -> Self {
        self.output.width = width;
        self.output.height = height;
        self
    }

    pub fn params(mut self, params: KernelParams) -> Self {
        self.params = params;
        self
    }

    /// Adjust individual kernel parameters in place.
    pub fn tune(mut self, f: impl FnOnce(&mut KernelParams)) -> Self {
        f(&mut self.params);
        self
    }

    pub fn vertex_shader(mut self, source: ShaderSource) -> Self {
        self.vertex_shader = source;
        self
    }

    pub fn fragment_shader(mut self, source: ShaderSource) -> Self {
        self.fragment_shader = source;
        self
    }

    pub fn build(self) -> HoloResult<RenderConfig> {
        if self.output.width == 0 || self.output.height == 0 {
            return Err(HoloError::config(format!(
                "output resolution must be positive, got {}x{}",
                self.output.width, self.output.height
            )));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(HoloError::config("output path is empty"));
        }
        for (name, source) in [("image", &self.image), ("depth", &self.depth)] {
            if matches!(source, ImageSource::File(p) if p.as_os_str().is_empty()) {
                return Err(HoloError::config(format!("{name} path is empty")));
            }
        }
        for (name, source) in [
            ("vertex shader", &self.vertex_shader),
            ("fragment shader", &self.fragment_shader),
        ] {
            if matches!(source, ShaderSource::File(p) if p.as_os_str().is_empty()) {
                return Err(HoloError::config(format!("{name} path is empty")));
            }
        }
        self.params.validate()?;

        Ok(RenderConfig {
            image: self.image,
            depth: self.depth,
            output: self.output,
            params: self.params,
            vertex_shader: self.vertex_shader,
            fragment_shader: self.fragment_shader,
        })
    }
}

/// One layer of user-facing configuration. Every field is optional so layers
/// can be stacked; the keys match the hologram config file format.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderOverrides {
    pub image_file: Option<PathBuf>,
    pub depth_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
    pub threshold: Option<f32>,
    pub protrude: Option<f32>,
    pub line_number: Option<f32>,
    pub obliquity: Option<f32>,
    pub deviation: Option<f32>,
    pub scale_x: Option<f32>,
    pub scale_y: Option<f32>,
    pub offset_x: Option<f32>,
    pub offset_y: Option<f32>,
    pub blur_size: Option<f32>,
    pub blur_depth: Option<f32>,
    pub depth_image_blur_size: Option<f32>,
    pub border_color: Option<String>,
    pub border_size_x: Option<f32>,
    pub border_size_y: Option<f32>,
    pub vertex_shader_path: Option<PathBuf>,
    pub fragment_shader_path: Option<PathBuf>,
}

impl RenderOverrides {
    /// The built-in defaults as a fully populated layer.
    pub fn defaults() -> Self {
        let p = KernelParams::default();
        Self {
            image_file: Some(PathBuf::from(DEFAULT_IMAGE_FILE)),
            depth_file: Some(PathBuf::from(DEFAULT_DEPTH_FILE)),
            output_file: Some(PathBuf::from(DEFAULT_OUTPUT_FILE)),
            output_width: Some(DEFAULT_OUTPUT_WIDTH),
            output_height: Some(DEFAULT_OUTPUT_HEIGHT),
            threshold: Some(p.threshold),
            protrude: Some(p.protrude),
            line_number: Some(p.line_number),
            obliquity: Some(p.obliquity),
            deviation: Some(p.deviation),
            scale_x: Some(p.scale_x),
            scale_y: Some(p.scale_y),
            offset_x: Some(p.offset_x),
            offset_y: Some(p.offset_y),
            blur_size: Some(p.blur_size),
            blur_depth: Some(p.blur_depth),
            depth_image_blur_size: Some(p.depth_image_blur_size),
            border_color: Some(DEFAULT_BORDER_COLOR.to_string()),
            border_size_x: Some(p.border_size_x),
            border_size_y: Some(p.border_size_y),
            vertex_shader_path: None,
            fragment_shader_path: None,
        }
    }

    /// Parse a TOML config file.
    pub fn load_from_file(path: &Path) -> HoloResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| HoloError::ConfigLoad {
            message: e.to_string(),
            path: path.to_path_buf(),
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            HoloError::ConfigLoad { message, .. } => HoloError::ConfigLoad {
                message,
                path: path.to_path_buf(),
            },
            other => other,
        })
    }

    /// Load a config layer that may legitimately be absent: a missing file
    /// yields an empty layer unless `required` is set.
    pub fn load_layer(path: &Path, required: bool) -> HoloResult<Self> {
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn from_toml_str(contents: &str) -> HoloResult<Self> {
        toml::from_str(contents).map_err(|e| HoloError::ConfigLoad {
            message: e.to_string(),
            path: PathBuf::from("<string>"),
        })
    }

    pub fn to_toml_string(&self) -> HoloResult<String> {
        toml::to_string_pretty(self).map_err(|e| HoloError::config(e.to_string()))
    }

    /// Layer `higher` on top of `self`; fields set in `higher` win.
    pub fn merge(self, higher: RenderOverrides) -> RenderOverrides {
        RenderOverrides {
            image_file: higher.image_file.or(self.image_file),
            depth_file: higher.depth_file.or(self.depth_file),
            output_file: higher.output_file.or(self.output_file),
            output_width: higher.output_width.or(self.output_width),
            output_height: higher.output_height.or(self.output_height),
            threshold: higher.threshold.or(self.threshold),
            protrude: higher.protrude.or(self.protrude),
            line_number: higher.line_number.or(self.line_number),
            obliquity: higher.obliquity.or(self.obliquity),
            deviation: higher.deviation.or(self.deviation),
            scale_x: higher.scale_x.or(self.scale_x),
            scale_y: higher.scale_y.or(self.scale_y),
            offset_x: higher.offset_x.or(self.offset_x),
            offset_y: higher.offset_y.or(self.offset_y),
            blur_size: higher.blur_size.or(self.blur_size),
            blur_depth: higher.blur_depth.or(self.blur_depth),
            depth_image_blur_size: higher.depth_image_blur_size.or(self.depth_image_blur_size),
            border_color: higher.border_color.or(self.border_color),
            border_size_x: higher.border_size_x.or(self.border_size_x),
            border_size_y: higher.border_size_y.or(self.border_size_y),
            vertex_shader_path: higher.vertex_shader_path.or(self.vertex_shader_path),
            fragment_shader_path: higher.fragment_shader_path.or(self.fragment_shader_path),
        }
    }

    /// Apply built-in defaults under this layer and validate the result.
    pub fn resolve(&self) -> HoloResult<RenderConfig> {
        let o = RenderOverrides::defaults().merge(self.clone());
        let d = KernelParams::default();

        let border_color = match o.border_color.as_deref() {
            Some(hex) => Color::from_hex(hex).map_err(|e| HoloError::config(e.to_string()))?,
            None => d.border_color,
        };
        let params = KernelParams {
            threshold: o.threshold.unwrap_or(d.threshold),
            protrude: o.protrude.unwrap_or(d.protrude),
            line_number: o.line_number.unwrap_or(d.line_number),
            obliquity: o.obliquity.unwrap_or(d.obliquity),
            deviation: o.deviation.unwrap_or(d.deviation),
            scale_x: o.scale_x.unwrap_or(d.scale_x),
            scale_y: o.scale_y.unwrap_or(d.scale_y),
            offset_x: o.offset_x.unwrap_or(d.offset_x),
            offset_y: o.offset_y.unwrap_or(d.offset_y),
            blur_size: o.blur_size.unwrap_or(d.blur_size),
            blur_depth: o.blur_depth.unwrap_or(d.blur_depth),
            depth_image_blur_size: o.depth_image_blur_size.unwrap_or(d.depth_image_blur_size),
            border_color,
            border_size_x: o.border_size_x.unwrap_or(d.border_size_x),
            border_size_y: o.border_size_y.unwrap_or(d.border_size_y),
        };

        let shader = |path: Option<PathBuf>| path.map(ShaderSource::File).unwrap_or_default();

        RenderConfig::builder(
            o.image_file.unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_FILE)),
            o.depth_file.unwrap_or_else(|| PathBuf::from(DEFAULT_DEPTH_FILE)),
            o.output_file.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE)),
        )
        .output_size(
            o.output_width.unwrap_or(DEFAULT_OUTPUT_WIDTH),
            o.output_height.unwrap_or(DEFAULT_OUTPUT_HEIGHT),
        )
        .params(params)
        .vertex_shader(shader(o.vertex_shader_path))
        .fragment_shader(shader(o.fragment_shader_path))
        .build()
    }
}
