//! Portable pixmap input and graymap output.
//!
//! Input is an RGB portable pixmap, either binary (`P6`) or ASCII (`P3`),
//! converted to intensity on load. Output is always a binary graymap with
//! the header `P5\n{width} {height}\n255\n` followed by one byte per pixel.

use crate::core::buffer::ImageBuffer;
use crate::core::error::{SobelError, SobelResult};
use crate::io::luminance::rgb_to_gray;
use crate::io::{ImageSink, ImageSource};
use image::ImageFormat;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const ACCEPTED_MAGIC: [&[u8]; 2] = [b"P6", b"P3"];

/// Decode a `P6` or `P3` pixmap into an intensity buffer.
pub fn decode_portable(bytes: &[u8]) -> SobelResult<ImageBuffer> {
    let magic = &bytes[..bytes.len().min(2)];
    if !ACCEPTED_MAGIC.contains(&magic) {
        return Err(SobelError::UnsupportedFormat {
            magic: String::from_utf8_lossy(magic).into_owned(),
        });
    }

    let rgb = image::load_from_memory_with_format(bytes, ImageFormat::Pnm)?.to_rgb8();
    debug!(
        "Decoded {} pixmap, {}x{}",
        String::from_utf8_lossy(magic),
        rgb.width(),
        rgb.height()
    );
    rgb_to_gray(rgb.width(), rgb.height(), rgb.as_raw())
}

/// Write `image` as a binary graymap.
pub fn encode_graymap<W: Write>(writer: W, image: &ImageBuffer) -> SobelResult<()> {
    let mut writer = BufWriter::new(writer);
    write!(writer, "P5\n{} {}\n255\n", image.width(), image.height())?;
    writer.write_all(image.as_raw())?;
    writer.flush()?;
    Ok(())
}

/// A pixmap file on disk, read when loaded.
#[derive(Debug, Clone)]
pub struct PortableImageFile {
    path: PathBuf,
}

impl PortableImageFile {
    /// Refer to the pixmap at `path`. Nothing is read until [`ImageSource::load`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSource for PortableImageFile {
    fn load(&self) -> SobelResult<ImageBuffer> {
        let bytes = std::fs::read(&self.path)?;
        decode_portable(&bytes)
    }

    fn file_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// A graymap file on disk, created or truncated when persisted.
#[derive(Debug, Clone)]
pub struct GraymapFile {
    path: PathBuf,
}

impl GraymapFile {
    /// Write to `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSink for GraymapFile {
    fn persist(&mut self, image: &ImageBuffer) -> SobelResult<()> {
        let file = File::create(&self.path)?;
        encode_graymap(file, image)
    }

    fn file_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
