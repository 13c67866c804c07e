use super::container::{check_payload, create_mapped, open_mapped, read8};
use crate::core::{Frame, PixelData, PixelFormat};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::path::Path;

const MAGIC: &[u8; 8] = b"FRMRAW!!";
const DTYPE: &str = "float64le";

/// JSON header of a raw frame recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingHeader {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub pixel_format: PixelFormat,
    pub sequences: Vec<u64>,
    pub timestamps_us: Vec<u64>,
    pub dtype: String,
}

impl RecordingHeader {
    fn values(&self) -> usize {
        self.frames * self.height * self.width
    }
}

/// Write `frames` to `path` as a raw recording, replacing any existing file.
///
/// All frames must share the shape and pixel format of the first one.
/// Pixels are stored as f64 so a recording can be fed straight back into
/// offline analysis.
pub fn write_frames<F: Borrow<Frame>>(path: impl AsRef<Path>, frames: &[F]) -> Result<()> {
    let path = path.as_ref();
    let frames: Vec<&Frame> = frames.iter().map(|f| f.borrow()).collect();
    let (height, width, pixel_format) = match frames.first() {
        Some(first) => (first.height, first.width, first.pixels.format()),
        None => (0, 0, PixelFormat::default()),
    };

    for frame in &frames {
        if frame.shape() != (height, width) || frame.pixels.format() != pixel_format {
            bail!(
                "Frame {} is {}x{} {:?}, recording is {}x{} {:?}",
                frame.sequence,
                frame.height,
                frame.width,
                frame.pixels.format(),
                height,
                width,
                pixel_format
            );
        }
    }

    let header = RecordingHeader {
        frames: frames.len(),
        height,
        width,
        pixel_format,
        sequences: frames.iter().map(|f| f.sequence).collect(),
        timestamps_us: frames.iter().map(|f| f.timestamp_us).collect(),
        dtype: DTYPE.to_string(),
    };
    let header_json = serde_json::to_vec(&header)?;
    let (mut mmap, data_offset) = create_mapped(path, MAGIC, &header_json, header.values() * 8)?;

    let mut offset = data_offset;
    for frame in &frames {
        for index in 0..frame.pixel_count() {
            mmap[offset..offset + 8].copy_from_slice(&frame.pixels.value(index).to_le_bytes());
            offset += 8;
        }
    }

    mmap.flush().context("Failed to flush frame recording")?;
    Ok(())
}

/// Read a recording written by `write_frames`, restoring each frame's
/// sequence, timestamp and pixel format
pub fn read_frames(path: impl AsRef<Path>) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    let (mmap, header_range, data_offset) = open_mapped(path, MAGIC)?;
    let header: RecordingHeader = serde_json::from_slice(&mmap[header_range])
        .context("Failed to parse recording header")?;
    if header.dtype != DTYPE {
        bail!("Unsupported element type {}", header.dtype);
    }
    if header.sequences.len() != header.frames || header.timestamps_us.len() != header.frames {
        bail!("Recording metadata does not cover {} frames", header.frames);
    }
    check_payload(mmap.len(), data_offset + header.values() * 8)?;

    let pixels = header.height * header.width;
    let mut offset = data_offset;
    let mut frames = Vec::with_capacity(header.frames);
    for i in 0..header.frames {
        let mut values = Vec::with_capacity(pixels);
        for _ in 0..pixels {
            values.push(f64::from_le_bytes(read8(&mmap, offset)));
            offset += 8;
        }
        let data = match header.pixel_format {
            PixelFormat::Mono8 => PixelData::Mono8(values.iter().map(|&v| v as u8).collect()),
            PixelFormat::Mono16 => PixelData::Mono16(values.iter().map(|&v| v as u16).collect()),
            PixelFormat::Float => PixelData::Float(values),
        };
        frames.push(Frame::new(
            header.sequences[i],
            header.timestamps_us[i],
            header.width,
            header.height,
            data,
        ));
    }

    Ok(frames)
}
