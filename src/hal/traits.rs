use super::types::{Image, SourceInfo};
use crate::core::FetchError;
use std::time::Duration;

/// Capability consumed by the acquisition loop.
///
/// Device configuration (exposure, gain, ROI, trigger mode) happens outside
/// this trait; the loop only pulls frames and reads the rate hint.
pub trait FrameSource: Send {
    fn info(&self) -> SourceInfo;

    /// Block for at most `timeout` waiting for the next frame
    fn try_get_frame(&mut self, timeout: Duration) -> Result<Image, FetchError>;

    /// Frames per second currently reported by the device; 0.0 when unknown
    fn current_rate(&self) -> f64;
}
