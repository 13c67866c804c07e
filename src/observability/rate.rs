use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Mean and population standard deviation of the recorded frame rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateStats {
    pub mean: f64,
    pub stddev: f64,
    pub samples: usize,
}

/// Log of frames-per-second samples, one per stored frame.
///
/// Aggregates over everything recorded since the last `reset`.
#[derive(Debug, Default)]
pub struct RateTracker {
    samples: Mutex<Vec<f64>>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<f64>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Non-finite and non-positive readings are ignored
    pub fn record(&self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.lock().push(rate);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mean(&self) -> Option<f64> {
        self.stats().map(|s| s.mean)
    }

    pub fn stddev(&self) -> Option<f64> {
        self.stats().map(|s| s.stddev)
    }

    /// `None` until at least one sample has been recorded
    pub fn stats(&self) -> Option<RateStats> {
        compute_stats(&self.lock())
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Stats over the current log, then clear it, under one lock
    pub fn take_stats(&self) -> Option<RateStats> {
        let mut samples = self.lock();
        let stats = compute_stats(&samples);
        samples.clear();
        stats
    }
}

fn compute_stats(samples: &[f64]) -> Option<RateStats> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Some(RateStats {
        mean,
        stddev: variance.sqrt(),
        samples: samples.len(),
    })
}
