use crate::analysis::HarmonicResult;
use crate::core::{AcquisitionError, ComplexImage, Result};

/// Ordered per-window results plus the axis they were read from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultStack {
    pub width: usize,
    pub height: usize,
    pub windows: Vec<ComplexImage>,
    pub freq_axis: Vec<f64>,
    pub target_bin: usize,
    pub frame_rate: f64,
}

impl ResultStack {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_capacity(windows: usize) -> Self {
        Self {
            windows: Vec::with_capacity(windows),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// (windows, height, width)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.windows.len(), self.height, self.width)
    }

    /// Append every window of `result`. The first non-empty result fixes the
    /// spatial shape; axis, bin and rate follow the latest result.
    pub fn append(&mut self, result: HarmonicResult) -> Result<usize> {
        if result.is_empty() {
            return Ok(0);
        }
        if self.windows.is_empty() {
            self.width = result.width;
            self.height = result.height;
        } else if (result.height, result.width) != (self.height, self.width) {
            return Err(AcquisitionError::ShapeMismatch {
                expected: (self.height, self.width),
                actual: (result.height, result.width),
            });
        }

        if !self.freq_axis.is_empty() && self.freq_axis != result.freq_axis {
            log::info!(
                "Frequency axis changed ({} -> {} bins); stack keeps the latest",
                self.freq_axis.len(),
                result.freq_axis.len()
            );
        }
        self.freq_axis = result.freq_axis;
        self.target_bin = result.target_bin;
        self.frame_rate = result.frame_rate;

        let added = result.windows.len();
        self.windows.extend(result.windows);
        Ok(added)
    }
}
