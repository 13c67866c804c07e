use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters updated by the acquisition loop
pub struct AcquisitionMetrics {
    frames_fetched: AtomicU64,
    frames_stored: AtomicU64,
    frames_discarded: AtomicU64,
    timeouts: AtomicU64,
    transient_errors: AtomicU64,
    total_fetch_us: AtomicU64,
    fetch_samples: AtomicU64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self {
            frames_fetched: AtomicU64::new(0),
            frames_stored: AtomicU64::new(0),
            frames_discarded: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            transient_errors: AtomicU64::new(0),
            total_fetch_us: AtomicU64::new(0),
            fetch_samples: AtomicU64::new(0),
        }
    }

    pub fn frames_fetched(&self) -> u64 {
        self.frames_fetched.load(Ordering::Relaxed)
    }

    pub fn frames_stored(&self) -> u64 {
        self.frames_stored.load(Ordering::Relaxed)
    }

    /// Frames read from the source while storage was paused
    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn transient_errors(&self) -> u64 {
        self.transient_errors.load(Ordering::Relaxed)
    }

    pub fn start_fetch(&self) -> Instant {
        Instant::now()
    }

    /// Called once per image the source returns, malformed or not
    pub fn finish_fetch(&self, start: Instant) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.total_fetch_us.fetch_add(latency_us, Ordering::Relaxed);
        self.fetch_samples.fetch_add(1, Ordering::Relaxed);
        self.frames_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stored(&self) {
        self.frames_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.frames_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_fetch_us(&self) -> u64 {
        let samples = self.fetch_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_fetch_us.load(Ordering::Relaxed) / samples
    }
}

impl Default for AcquisitionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
