use crate::core::{AcquisitionError, Frame, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::ops::Range;

/// Rectangular region of interest in pixel coordinates, half-open ranges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: Range<usize>,
    pub y: Range<usize>,
}

impl Roi {
    pub fn new(x: Range<usize>, y: Range<usize>) -> Self {
        Self { x, y }
    }

    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0..width, 0..height)
    }

    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.x.start < self.x.end
            && self.y.start < self.y.end
            && self.x.end <= width
            && self.y.end <= height
    }
}

/// Integrated intensity inside `roi`, one value per frame
pub fn integrate_roi<F: Borrow<Frame>>(frames: &[F], roi: &Roi) -> Result<Vec<f64>> {
    frames
        .iter()
        .map(|frame| {
            let frame = frame.borrow();
            if !roi.fits(frame.width, frame.height) {
                return Err(AcquisitionError::InvalidParameter(format!(
                    "ROI {:?} does not fit a {}x{} frame",
                    roi, frame.width, frame.height
                )));
            }
            let mut sum = 0.0;
            for y in roi.y.clone() {
                for x in roi.x.clone() {
                    sum += frame.at(x, y);
                }
            }
            Ok(sum)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PixelData;

    #[test]
    fn test_integrate_sub_region() {
        let frame = Frame::new(0, 0, 3, 2, PixelData::Mono8(vec![1, 2, 3, 4, 5, 6]));
        let roi = Roi::new(1..3, 0..2);
        assert_eq!(integrate_roi(&[frame], &roi).unwrap(), vec![2.0 + 3.0 + 5.0 + 6.0]);
    }

    #[test]
    fn test_roi_out_of_bounds() {
        let frame = Frame::new(0, 0, 2, 2, PixelData::Mono8(vec![0; 4]));
        assert!(integrate_roi(&[frame], &Roi::new(0..3, 0..1)).is_err());
    }
}
