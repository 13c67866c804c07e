use super::stack::ResultStack;
use crate::core::ComplexImage;
use anyhow::{bail, Context, Result};
use memmap2::{Mmap, MmapMut};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::Path;

const MAGIC: &[u8; 8] = b"FRMLOCK!";
const VERSION: u64 = 1;
const PREAMBLE: usize = 24;
const DTYPE: &str = "complex128le";

/// Self-describing part of the container, stored as JSON after the preamble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerHeader {
    pub windows: usize,
    pub height: usize,
    pub width: usize,
    pub freq_axis: Vec<f64>,
    pub target_bin: usize,
    pub frame_rate: f64,
    pub dtype: String,
}

impl ContainerHeader {
    fn values(&self) -> usize {
        self.windows * self.height * self.width
    }
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Create `path` sized for the preamble, the JSON header and `payload_bytes`,
/// with the preamble and header already written.
///
/// Returns the writable map and the offset of the first payload byte.
pub(super) fn create_mapped(
    path: &Path,
    magic: &[u8; 8],
    header_json: &[u8],
    payload_bytes: usize,
) -> Result<(MmapMut, usize)> {
    let data_offset = align8(PREAMBLE + header_json.len());
    let total_size = data_offset + payload_bytes;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .context(format!("Failed to open {:?} for writing", path))?;
    file.set_len(total_size as u64)?;

    let mut mmap = unsafe { MmapMut::map_mut(&file)? };

    mmap[0..8].copy_from_slice(magic);
    mmap[8..16].copy_from_slice(&VERSION.to_le_bytes());
    mmap[16..24].copy_from_slice(&(header_json.len() as u64).to_le_bytes());
    mmap[PREAMBLE..PREAMBLE + header_json.len()].copy_from_slice(header_json);
    // set_len zero-fills the alignment padding

    Ok((mmap, data_offset))
}

/// Map `path` and check its preamble against `magic`.
///
/// Returns the map, the byte range of the JSON header and the payload offset.
pub(super) fn open_mapped(path: &Path, magic: &[u8; 8]) -> Result<(Mmap, Range<usize>, usize)> {
    let file = File::open(path).context(format!("Failed to open {:?}", path))?;
    let mmap = unsafe { Mmap::map(&file)? };

    if mmap.len() < PREAMBLE || &mmap[0..8] != magic {
        bail!(
            "{:?} is not a {} file",
            path,
            String::from_utf8_lossy(magic).trim_end_matches('!')
        );
    }
    let version = u64::from_le_bytes(read8(&mmap, 8));
    if version != VERSION {
        bail!("Unsupported container version {}", version);
    }
    let header_len = u64::from_le_bytes(read8(&mmap, 16)) as usize;
    let header_end = PREAMBLE
        .checked_add(header_len)
        .filter(|end| *end <= mmap.len())
        .context("Truncated container header")?;

    Ok((mmap, PREAMBLE..header_end, align8(header_end)))
}

/// Fail unless `available` bytes cover `expected`
pub(super) fn check_payload(available: usize, expected: usize) -> Result<()> {
    if available < expected {
        bail!(
            "Container holds {} bytes, header describes {}",
            available,
            expected
        );
    }
    Ok(())
}

pub(super) fn read8(bytes: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[offset..offset + 8]);
    out
}

/// Write `stack` to `path`, replacing any existing file
pub fn write_container(path: impl AsRef<Path>, stack: &ResultStack) -> Result<()> {
    let path = path.as_ref();
    let header = ContainerHeader {
        windows: stack.windows.len(),
        height: stack.height,
        width: stack.width,
        freq_axis: stack.freq_axis.clone(),
        target_bin: stack.target_bin,
        frame_rate: stack.frame_rate,
        dtype: DTYPE.to_string(),
    };
    let header_json = serde_json::to_vec(&header)?;
    let (mut mmap, data_offset) = create_mapped(path, MAGIC, &header_json, header.values() * 16)?;

    let mut offset = data_offset;
    for window in &stack.windows {
        for value in &window.data {
            mmap[offset..offset + 8].copy_from_slice(&value.re.to_le_bytes());
            mmap[offset + 8..offset + 16].copy_from_slice(&value.im.to_le_bytes());
            offset += 16;
        }
    }

    mmap.flush().context("Failed to flush result container")?;
    Ok(())
}

/// Read a container written by `write_container`
pub fn read_container(path: impl AsRef<Path>) -> Result<ResultStack> {
    let path = path.as_ref();
    let (mmap, header_range, data_offset) = open_mapped(path, MAGIC)?;
    let header: ContainerHeader = serde_json::from_slice(&mmap[header_range])
        .context("Failed to parse container header")?;
    if header.dtype != DTYPE {
        bail!("Unsupported element type {}", header.dtype);
    }
    check_payload(mmap.len(), data_offset + header.values() * 16)?;

    let pixels = header.height * header.width;
    let mut offset = data_offset;
    let mut windows = Vec::with_capacity(header.windows);
    for _ in 0..header.windows {
        let mut data = Vec::with_capacity(pixels);
        for _ in 0..pixels {
            let re = f64::from_le_bytes(read8(&mmap, offset));
            let im = f64::from_le_bytes(read8(&mmap, offset + 8));
            data.push(Complex::new(re, im));
            offset += 16;
        }
        windows.push(ComplexImage::new(header.width, header.height, data));
    }

    Ok(ResultStack {
        width: header.width,
        height: header.height,
        windows,
        freq_axis: header.freq_axis,
        target_bin: header.target_bin,
        frame_rate: header.frame_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_header_is_aligned() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.flk");
        write_container(&path, &ResultStack::empty()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..8], b"FRMLOCK!");
        assert_eq!(bytes.len() % 8, 0);
        assert_eq!(read_container(&path).unwrap(), ResultStack::empty());
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.bin");
        std::fs::write(&path, b"AUDITAB!\x01\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0").unwrap();
        assert!(read_container(&path).is_err());
    }
}
