use std::io::Write;
use std::path::Path;

use holo_core::{FrameBuffer, HoloError, HoloResult};

/// Single-image PNG encoder (RGBA, 8 bits per channel) on top of the `png` crate.
pub struct PngWriter {
    compression: png::Compression,
}

impl PngWriter {
    /// Fastest compression level; render output is usually re-processed downstream.
    pub fn fast() -> Self {
        Self {
            compression: png::Compression::Fast,
        }
    }

    pub fn with_compression(compression: png::Compression) -> Self {
        Self { compression }
    }

    /// Encode `frame` into `writer`. `path` is only used for error reporting.
    pub fn write<W: Write>(&self, frame: &FrameBuffer, writer: W, path: &Path) -> HoloResult<()> {
        if frame.width == 0 || frame.height == 0 {
            return Err(HoloError::encode("cannot encode an empty frame", path));
        }

        let mut encoder = png::Encoder::new(writer, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(self.compression);

        let mut writer = encoder
            .write_header()
            .map_err(|e| HoloError::encode(format!("failed to write PNG header: {e}"), path))?;
        writer
            .write_image_data(&frame.data)
            .map_err(|e| HoloError::encode(format!("failed to write PNG data: {e}"), path))?;
        writer
            .finish()
            .map_err(|e| HoloError::encode(format!("failed to finalize PNG: {e}"), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holo_core::Color;

    #[test]
    fn test_png_encode_to_memory() {
        let frame = FrameBuffer::solid(4, 3, &Color::RED);
        let mut bytes = Vec::new();
        PngWriter::fast()
            .write(&frame, &mut bytes, Path::new("<memory>"))
            .unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.into_raw(), frame.data);
    }

    #[test]
    fn test_png_encode_empty_frame() {
        let frame = FrameBuffer::new(0, 0);
        let result = PngWriter::fast().write(&frame, Vec::new(), Path::new("<memory>"));
        assert!(result.is_err());
    }
}
