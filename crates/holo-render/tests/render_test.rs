use std::cell::Cell;
use std::io::Cursor;
use std::path::PathBuf;

use holo_core::hash::hash_frame;
use holo_core::{Color, HoloError, HoloResult, ImageSource, RenderConfig, ShaderSource};
use holo_render::{
    ContextProvider, GraphicsContext, HeadlessProvider, HologramRenderer, RenderedFrame,
};

/// Provider that counts how many contexts were requested.
#[derive(Default)]
struct CountingProvider {
    created: Cell<usize>,
    inner: HeadlessProvider,
}

impl ContextProvider for CountingProvider {
    fn create_context(&self) -> HoloResult<GraphicsContext> {
        self.created.set(self.created.get() + 1);
        self.inner.create_context()
    }
}

fn png_source(label: &str, img: image::RgbaImage) -> ImageSource {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    ImageSource::bytes(label, bytes)
}

fn solid(label: &str, width: u32, height: u32, rgba: [u8; 4]) -> ImageSource {
    png_source(label, image::RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("holo_render_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Render to memory, or return `None` when this machine has no usable GPU.
fn render_or_skip(config: &RenderConfig) -> Option<RenderedFrame> {
    match HologramRenderer::new().render_frame(config) {
        Ok(rendered) => Some(rendered),
        Err(HoloError::ContextCreation(msg)) => {
            eprintln!("skipping: {msg}");
            None
        }
        Err(e) => panic!("render failed: {e}"),
    }
}

fn assert_near(actual: [u8; 4], expected: [u8; 4], tolerance: u8) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(a.abs_diff(e) <= tolerance, "expected {expected:?}, got {actual:?}");
    }
}

#[test]
fn test_missing_depth_fails_before_context_creation() {
    let config = RenderConfig::builder(
        solid("color", 8, 8, [10, 20, 30, 255]),
        "/nonexistent/depth.png",
        "/tmp/never_written.png",
    )
    .build()
    .unwrap();

    let renderer = HologramRenderer::with_provider(CountingProvider::default());
    let result = renderer.render(&config);

    assert!(matches!(result, Err(HoloError::InputNotFound { .. })));
    assert_eq!(renderer.provider().created.get(), 0);
}

#[test]
fn test_corrupt_image_fails_before_context_creation() {
    let config = RenderConfig::builder(
        ImageSource::bytes("color", b"not a png".to_vec()),
        solid("depth", 8, 8, [128, 128, 128, 255]),
        "/tmp/never_written.png",
    )
    .build()
    .unwrap();

    let renderer = HologramRenderer::with_provider(CountingProvider::default());
    let result = renderer.render_frame(&config);

    assert!(matches!(result, Err(HoloError::ImageDecode { .. })));
    assert_eq!(renderer.provider().created.get(), 0);
}

#[test]
fn test_missing_shader_fails_before_context_creation() {
    let config = RenderConfig::builder(
        solid("color", 8, 8, [10, 20, 30, 255]),
        solid("depth", 8, 8, [128, 128, 128, 255]),
        "/tmp/never_written.png",
    )
    .fragment_shader(ShaderSource::File(PathBuf::from("/nonexistent/kernel.wgsl")))
    .build()
    .unwrap();

    let renderer = HologramRenderer::with_provider(CountingProvider::default());
    assert!(matches!(
        renderer.render_frame(&config),
        Err(HoloError::InputNotFound { .. })
    ));
    assert_eq!(renderer.provider().created.get(), 0);
}

#[test]
fn test_output_size_ignores_input_sizes() {
    for (color, depth, output) in [
        ((64, 32), (16, 48), (40, 24)),
        ((17, 91), (17, 91), (128, 64)),
        ((300, 300), (10, 10), (33, 77)),
    ] {
        let config = RenderConfig::builder(
            solid("color", color.0, color.1, [200, 100, 50, 255]),
            solid("depth", depth.0, depth.1, [90, 90, 90, 255]),
            "unused.png",
        )
        .output_size(output.0, output.1)
        .build()
        .unwrap();

        let Some(rendered) = render_or_skip(&config) else {
            return;
        };
        assert_eq!((rendered.frame.width, rendered.frame.height), output);
        assert_eq!(
            rendered.frame.data.len(),
            (output.0 * output.1 * 4) as usize
        );
    }
}

#[test]
fn test_render_is_idempotent() {
    let mut gradient = image::RgbaImage::new(48, 48);
    for (x, y, px) in gradient.enumerate_pixels_mut() {
        *px = image::Rgba([(x * 5) as u8, (y * 5) as u8, 128, 255]);
    }
    let config = RenderConfig::builder(
        png_source("color", gradient),
        solid("depth", 48, 48, [180, 180, 180, 255]),
        "unused.png",
    )
    .output_size(96, 64)
    .build()
    .unwrap();

    let Some(first) = render_or_skip(&config) else {
        return;
    };
    let Some(second) = render_or_skip(&config) else {
        return;
    };
    assert_eq!(first.frame.data, second.frame.data);
    assert_eq!(hash_frame(&first.frame), hash_frame(&second.frame));
}

#[test]
fn test_border_overlay_matches_configured_color() {
    let config = RenderConfig::builder(
        solid("color", 64, 64, [128, 128, 128, 255]),
        solid("depth", 64, 64, [128, 128, 128, 255]),
        "unused.png",
    )
    .output_size(200, 200)
    .tune(|p| {
        p.border_size_x = 0.1;
        p.border_size_y = 0.1;
        p.border_color = Color::RED;
    })
    .build()
    .unwrap();

    let Some(rendered) = render_or_skip(&config) else {
        return;
    };
    let frame = &rendered.frame;
    let red = [255, 0, 0, 255];
    for i in [0, 5, 10, 19] {
        for along in [60, 100, 140] {
            assert_eq!(frame.get_pixel(i, along), Some(red), "left column {i}");
            assert_eq!(frame.get_pixel(199 - i, along), Some(red), "right column {i}");
            assert_eq!(frame.get_pixel(along, i), Some(red), "top row {i}");
            assert_eq!(frame.get_pixel(along, 199 - i), Some(red), "bottom row {i}");
        }
    }
    assert_ne!(frame.get_pixel(100, 100), Some(red));
}

#[test]
fn test_top_of_source_is_top_of_output() {
    let mut split = image::RgbaImage::new(64, 64);
    for (_, y, px) in split.enumerate_pixels_mut() {
        *px = if y < 32 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 255, 255])
        };
    }
    let config = RenderConfig::builder(
        png_source("color", split),
        solid("depth", 64, 64, [0, 0, 0, 255]),
        "unused.png",
    )
    .output_size(64, 64)
    .tune(|p| {
        p.blur_size = 0.0;
        p.depth_image_blur_size = 0.0;
        p.border_size_x = 0.0;
        p.border_size_y = 0.0;
    })
    .build()
    .unwrap();

    let Some(rendered) = render_or_skip(&config) else {
        return;
    };
    assert_near(rendered.frame.get_pixel(32, 4).unwrap(), [255, 0, 0, 255], 1);
    assert_near(rendered.frame.get_pixel(32, 60).unwrap(), [0, 0, 255, 255], 1);
}

#[test]
fn test_end_to_end_gray_to_file() {
    let dir = scratch_dir("e2e");
    let output = dir.join("hologram.png");
    let config = RenderConfig::builder(
        solid("color", 512, 512, [128, 128, 128, 255]),
        solid("depth", 512, 512, [127, 127, 127, 255]),
        &output,
    )
    .output_size(256, 256)
    .build()
    .unwrap();

    let report = match HologramRenderer::new().render(&config) {
        Ok(report) => report,
        Err(HoloError::ContextCreation(msg)) => {
            eprintln!("skipping: {msg}");
            return;
        }
        Err(e) => panic!("render failed: {e}"),
    };
    assert_eq!((report.width, report.height), (256, 256));
    assert_eq!(report.content_hash.len(), 64);

    let saved = image::open(&output).unwrap();
    assert_eq!(saved.color(), image::ColorType::Rgba8);
    let saved = saved.to_rgba8();
    assert_eq!(saved.dimensions(), (256, 256));
    assert_near(saved.get_pixel(128, 128).0, [128, 128, 128, 255], 2);

    // Default border: white, 2% of the width and 1% of the height.
    assert_eq!(saved.get_pixel(1, 128).0, [255, 255, 255, 255]);
    assert_eq!(saved.get_pixel(128, 0).0, [255, 255, 255, 255]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_invalid_kernel_is_shader_compile_error() {
    let config = RenderConfig::builder(
        solid("color", 8, 8, [10, 20, 30, 255]),
        solid("depth", 8, 8, [128, 128, 128, 255]),
        "unused.png",
    )
    .output_size(16, 16)
    .fragment_shader(ShaderSource::Inline {
        label: "broken".to_string(),
        source: "@fragment fn fs_main( -> vec4<f32> { return 1.0; }".to_string(),
    })
    .build()
    .unwrap();

    match HologramRenderer::new().render_frame(&config) {
        Err(HoloError::ShaderCompile { stage, .. }) => assert!(stage.contains("broken")),
        Err(HoloError::ContextCreation(msg)) => eprintln!("skipping: {msg}"),
        other => panic!("expected ShaderCompile, got {:?}", other.map(|r| r.frame.width)),
    }
}
