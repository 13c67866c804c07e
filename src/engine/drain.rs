use crate::buffers::FrameStore;
use crate::core::{AcquisitionError, Frame, Result};
use crate::observability::{RateStats, RateTracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Frames and rate statistics handed to the analysis stage
#[derive(Debug, Clone)]
pub struct DrainedBatch {
    /// Oldest first
    pub frames: Vec<Arc<Frame>>,

    /// Stats over the rate samples recorded alongside `frames`; `None` if empty
    pub rate: Option<RateStats>,
}

impl DrainedBatch {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Coordinates "pause storage / drain / resume" between the acquisition loop
/// and the analysis stage.
///
/// While storage is paused the loop keeps reading frames from the source but
/// discards them. The pause flag and the store push share one gate lock, so
/// no push can land between `begin_pause` and the drain.
pub struct DrainController {
    store: Arc<FrameStore>,
    rates: Arc<RateTracker>,
    paused: Mutex<bool>,
    cycle_in_flight: AtomicBool,
}

impl DrainController {
    pub fn new(store: Arc<FrameStore>, rates: Arc<RateTracker>) -> Self {
        Self {
            store,
            rates,
            paused: Mutex::new(false),
            cycle_in_flight: AtomicBool::new(false),
        }
    }

    fn gate(&self) -> MutexGuard<'_, bool> {
        self.paused
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    pub fn rates(&self) -> &Arc<RateTracker> {
        &self.rates
    }

    pub fn is_paused(&self) -> bool {
        *self.gate()
    }

    pub fn is_cycle_in_flight(&self) -> bool {
        self.cycle_in_flight.load(Ordering::Acquire)
    }

    /// Producer path: store the frame and its rate sample unless paused.
    /// Returns false when the frame was discarded.
    pub fn offer(&self, frame: Arc<Frame>, rate: f64) -> bool {
        let paused = self.gate();
        if *paused {
            return false;
        }
        self.store.push_shared(frame);
        self.rates.record(rate);
        true
    }

    /// Pause storage and open a drain cycle.
    ///
    /// Fails with `AnalysisInFlight` while a previous cycle's guard is alive.
    pub fn begin_pause(self: &Arc<Self>) -> Result<DrainCycle> {
        self.cycle_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AcquisitionError::AnalysisInFlight)?;

        *self.gate() = true;
        log::debug!("Storage paused ({} frames resident)", self.store.len());

        Ok(DrainCycle {
            controller: self.clone(),
            drained: false,
        })
    }

    fn drain_and_resume(&self) -> DrainedBatch {
        let mut paused = self.gate();
        let frames = self.store.drain();
        let rate = self.rates.take_stats();
        *paused = false;
        drop(paused);

        log::debug!("Drained {} frames, storage resumed", frames.len());
        DrainedBatch { frames, rate }
    }

    fn resume(&self) {
        *self.gate() = false;
    }
}

/// One drain cycle. Holding it keeps further cycles out; dropping it
/// resumes storage if it was never drained and ends the cycle.
pub struct DrainCycle {
    controller: Arc<DrainController>,
    drained: bool,
}

impl DrainCycle {
    /// Frames that a drain would return right now
    pub fn pending_frames(&self) -> usize {
        if self.drained {
            return 0;
        }
        self.controller.store.len()
    }

    /// Rate stats a drain would return, without resetting the log.
    /// Stable while the cycle holds storage paused.
    pub fn pending_rate(&self) -> Option<RateStats> {
        if self.drained {
            return None;
        }
        self.controller.rates.stats()
    }

    /// Drain the store, resume storage and reset the rate log.
    ///
    /// A second call within the same cycle returns an empty batch.
    pub fn drain_and_resume(&mut self) -> DrainedBatch {
        if self.drained {
            log::warn!("Drain cycle already drained");
            return DrainedBatch {
                frames: Vec::new(),
                rate: None,
            };
        }
        self.drained = true;
        self.controller.drain_and_resume()
    }
}

impl Drop for DrainCycle {
    fn drop(&mut self) {
        if !self.drained {
            self.controller.resume();
        }
        self.controller.cycle_in_flight.store(false, Ordering::Release);
    }
}
