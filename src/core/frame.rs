use serde::{Deserialize, Serialize};

/// Pixel encoding of a frame as delivered by the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Mono8,
    Mono16,
    Float,
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Mono8
    }
}

/// Pixel samples in native format, row-major
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    Mono8(Vec<u8>),
    Mono16(Vec<u16>),
    Float(Vec<f64>),
}

impl PixelData {
    pub fn format(&self) -> PixelFormat {
        match self {
            PixelData::Mono8(_) => PixelFormat::Mono8,
            PixelData::Mono16(_) => PixelFormat::Mono16,
            PixelData::Float(_) => PixelFormat::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PixelData::Mono8(v) => v.len(),
            PixelData::Mono16(v) => v.len(),
            PixelData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw intensity of pixel `index` as f64 (no normalization)
    pub fn value(&self, index: usize) -> f64 {
        match self {
            PixelData::Mono8(v) => v[index] as f64,
            PixelData::Mono16(v) => v[index] as f64,
            PixelData::Float(v) => v[index],
        }
    }

    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            PixelData::Mono8(v) => v.iter().map(|&p| p as f64).collect(),
            PixelData::Mono16(v) => v.iter().map(|&p| p as f64).collect(),
            PixelData::Float(v) => v.clone(),
        }
    }
}

/// One acquired image.
///
/// Frames are immutable once built; the store and its readers share them
/// behind `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Sequential frame number assigned by the acquisition loop
    pub sequence: u64,

    /// Microseconds since the acquisition session started
    pub timestamp_us: u64,

    pub width: usize,
    pub height: usize,
    pub pixels: PixelData,
}

impl Frame {
    pub fn new(sequence: u64, timestamp_us: u64, width: usize, height: usize, pixels: PixelData) -> Self {
        Self {
            sequence,
            timestamp_us,
            width,
            height,
            pixels,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Intensity at column `x`, row `y`
    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.pixels.value(y * self.width + x)
    }
}
