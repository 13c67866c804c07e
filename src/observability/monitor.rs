use super::{AcquisitionMetrics, RateTracker};
use crate::buffers::FrameStore;
use std::sync::Arc;

/// Renders a text report of the acquisition counters
pub struct AcquisitionMonitor {
    metrics: Arc<AcquisitionMetrics>,
    store: Arc<FrameStore>,
    rates: Arc<RateTracker>,
}

impl AcquisitionMonitor {
    pub fn new(metrics: Arc<AcquisitionMetrics>, store: Arc<FrameStore>, rates: Arc<RateTracker>) -> Self {
        Self { metrics, store, rates }
    }

    pub fn generate_report(&self) -> String {
        let mut report = String::from("=== Acquisition Metrics ===\n");

        report.push_str(&format!(
            "  Frames: {} fetched, {} stored, {} discarded while paused\n",
            self.metrics.frames_fetched(),
            self.metrics.frames_stored(),
            self.metrics.frames_discarded(),
        ));
        report.push_str(&format!(
            "  Store: {}/{} resident, {} overwritten\n",
            self.store.len(),
            self.store.capacity(),
            self.store.overwritten(),
        ));
        report.push_str(&format!(
            "  Source: {} timeouts, {}\n  Avg Fetch: {}μs\n",
            self.metrics.timeouts(),
            match self.metrics.transient_errors() {
                0 => "0 errors".to_string(),
                1 => "1 error".to_string(),
                n => format!("{} errors", n),
            },
            self.metrics.avg_fetch_us(),
        ));

        match self.rates.stats() {
            Some(stats) => report.push_str(&format!(
                "  Rate: {:.2} ± {:.2} fps ({} samples)\n",
                stats.mean, stats.stddev, stats.samples
            )),
            None => report.push_str("  Rate: no samples\n"),
        }

        report
    }

    pub fn metrics(&self) -> &AcquisitionMetrics {
        &self.metrics
    }
}
