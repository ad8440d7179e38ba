//! Image endpoints.
//!
//! The orchestrator reads its input through an [`ImageSource`] and writes
//! its output through an [`ImageSink`], so runs can target files or memory.

pub mod luminance;
pub mod memory;
pub mod netpbm;

use crate::core::buffer::ImageBuffer;
use crate::core::error::SobelResult;
use std::path::Path;

pub use luminance::{luminance, rgb_to_gray};
pub use memory::{MemorySink, MemorySource};
pub use netpbm::{decode_portable, encode_graymap, GraymapFile, PortableImageFile};

/// Where the input intensity buffer comes from.
pub trait ImageSource: Send + Sync {
    /// Decode the whole image as single-channel intensity samples.
    fn load(&self) -> SobelResult<ImageBuffer>;

    /// Get the file path if this is a file-based source.
    fn file_path(&self) -> Option<&Path>;

    /// Human-readable name for logs.
    fn describe(&self) -> String {
        self.file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// Where the output edge map goes.
pub trait ImageSink: Send + Sync {
    /// Write the complete edge map.
    fn persist(&mut self, image: &ImageBuffer) -> SobelResult<()>;

    /// Get the file path if this is a file-based sink.
    fn file_path(&self) -> Option<&Path>;

    /// Human-readable name for logs.
    fn describe(&self) -> String {
        self.file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}
