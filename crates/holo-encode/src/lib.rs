//! # holo-encode
//!
//! Encoding module: writes a rendered RGBA8 [`FrameBuffer`] to an image file.
//! PNG goes through the `png` crate with fast compression; every other format
//! `image` knows how to write is delegated to it. Output is written to a
//! sibling temporary file and renamed into place, so a failed encode never
//! leaves a partial file at the target path.

pub mod png_writer;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use holo_core::{FrameBuffer, HoloError, HoloResult};
use image::{ExtendedColorType, ImageFormat};

pub use png_writer::PngWriter;

/// Encode `frame` to `path`, choosing the format from the file extension.
pub fn write_image(frame: &FrameBuffer, path: &Path) -> HoloResult<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| HoloError::encode(format!("unsupported output format: {e}"), path))?;
    if !format.writing_enabled() {
        return Err(HoloError::encode(
            format!("{format:?} encoding is not available"),
            path,
        ));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            HoloError::encode(format!("cannot create output directory: {e}"), path)
        })?;
    }

    let partial = partial_path(path);
    let result = encode_to(frame, format, &partial).and_then(|()| {
        std::fs::rename(&partial, path)
            .map_err(|e| HoloError::encode(format!("failed to move output into place: {e}"), path))
    });

    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    } else {
        tracing::info!(
            "Encoded {}x{} {:?} image to {}",
            frame.width,
            frame.height,
            format,
            path.display()
        );
    }
    result
}

fn encode_to(frame: &FrameBuffer, format: ImageFormat, path: &Path) -> HoloResult<()> {
    let file = File::create(path)
        .map_err(|e| HoloError::encode(format!("failed to create output file: {e}"), path))?;
    let mut writer = BufWriter::new(file);

    match format {
        ImageFormat::Png => PngWriter::fast().write(frame, &mut writer, path)?,
        other => image::write_buffer_with_format(
            &mut writer,
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgba8,
            other,
        )
        .map_err(|e| HoloError::encode(e.to_string(), path))?,
    }

    writer
        .flush()
        .map_err(|e| HoloError::encode(format!("failed to flush output: {e}"), path))
}

/// `dir/name.png` -> `dir/.name.png.partial`
fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}
