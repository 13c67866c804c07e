pub mod metrics;
pub mod monitor;
pub mod rate;

pub use metrics::AcquisitionMetrics;
pub use monitor::AcquisitionMonitor;
pub use rate::{RateStats, RateTracker};
