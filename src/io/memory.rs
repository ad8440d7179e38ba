//! In-memory endpoints.

use crate::core::buffer::ImageBuffer;
use crate::core::error::SobelResult;
use crate::io::{ImageSink, ImageSource};
use std::io;
use std::path::Path;
use std::sync::Arc;

/// In-memory image source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    image: Option<Arc<ImageBuffer>>,
}

impl MemorySource {
    /// Create from an existing buffer.
    pub fn new(image: ImageBuffer) -> Self {
        Self {
            image: Some(Arc::new(image)),
        }
    }

    /// A source with no image; loading from it fails.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl ImageSource for MemorySource {
    fn load(&self) -> SobelResult<ImageBuffer> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "memory source holds no image"))?;
        Ok(ImageBuffer::clone(image))
    }

    fn file_path(&self) -> Option<&Path> {
        None
    }
}

/// In-memory image sink that keeps the last persisted image.
#[derive(Debug, Default)]
pub struct MemorySink {
    output: Option<ImageBuffer>,
}

impl MemorySink {
    /// Create a new memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the persisted image, if any.
    pub fn image(&self) -> Option<&ImageBuffer> {
        self.output.as_ref()
    }

    /// Take the persisted image.
    pub fn take_image(&mut self) -> Option<ImageBuffer> {
        self.output.take()
    }
}

impl ImageSink for MemorySink {
    fn persist(&mut self, image: &ImageBuffer) -> SobelResult<()> {
        self.output = Some(image.clone());
        Ok(())
    }

    fn file_path(&self) -> Option<&Path> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SobelError;

    #[test]
    fn test_memory_round_trip() {
        let image = ImageBuffer::from_fn(3, 2, |x, y| (x + y) as u8).unwrap();
        let source = MemorySource::new(image.clone());
        let mut sink = MemorySink::new();

        let loaded = source.load().unwrap();
        sink.persist(&loaded).unwrap();
        assert_eq!(sink.image(), Some(&image));
        assert_eq!(sink.take_image(), Some(image));
        assert!(sink.image().is_none());
    }

    #[test]
    fn test_empty_source() {
        let source = MemorySource::empty();
        assert!(matches!(source.load(), Err(SobelError::Io(_))));
        assert_eq!(source.describe(), "<memory>");
    }
}
