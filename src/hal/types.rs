use crate::core::{PixelData, PixelFormat};
use serde::{Deserialize, Serialize};

/// Raw image delivered by a frame source, before sequencing and timestamping
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: PixelData,
}

impl Image {
    pub fn new(width: usize, height: usize, pixels: PixelData) -> Self {
        Self { width, height, pixels }
    }

    /// Constant-valued float image, handy for marker patterns
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self::new(width, height, PixelData::Float(vec![value; width * height]))
    }

    pub fn format(&self) -> PixelFormat {
        self.pixels.format()
    }
}

/// Static description of a source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    pub id: String,
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
}
