//! Image loading module.
//! Decodes PNG, JPEG, WebP, and other formats into RGBA8 FrameBuffers.

use std::path::Path;

use holo_core::{FrameBuffer, HoloError, HoloResult, ImageSource};

/// Load an image file and convert it to RGBA8. The source resolution is kept.
pub fn load_image(path: &Path) -> HoloResult<FrameBuffer> {
    if !path.is_file() {
        return Err(HoloError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path).map_err(|_| HoloError::InputNotFound {
        path: path.to_path_buf(),
    })?;
    decode(&bytes, path)
}

/// Load an image from raw encoded bytes (e.g., handed over by another service).
pub fn load_image_from_bytes(data: &[u8], label: &str) -> HoloResult<FrameBuffer> {
    decode(data, Path::new(label))
}

pub fn load_source(source: &ImageSource) -> HoloResult<FrameBuffer> {
    match source {
        ImageSource::File(path) => load_image(path),
        ImageSource::Bytes { data, .. } => decode(data, &source.display_path()),
    }
}

fn decode(bytes: &[u8], path: &Path) -> HoloResult<FrameBuffer> {
    let img = image::load_from_memory(bytes).map_err(|e| HoloError::decode(e.to_string(), path))?;

    // Grayscale depth maps and RGB photos alike become 4-channel RGBA.
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(HoloError::decode("image has no pixels", path));
    }

    FrameBuffer::from_rgba(width, height, rgba.into_raw())
        .ok_or_else(|| HoloError::decode("decoded buffer has unexpected length", path))
}
