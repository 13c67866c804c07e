use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::analysis::{HarmonicAnalyzer, WindowPlan};
use crate::buffers::FrameStore;
use crate::config::SessionConfig;
use crate::core::{AcquisitionError, Frame, Result};
use crate::engine::acquisition::{AcquisitionLoop, LatestFrame};
use crate::engine::drain::DrainController;
use crate::engine::state::LoopState;
use crate::hal::FrameSource;
use crate::observability::{AcquisitionMetrics, AcquisitionMonitor, RateStats, RateTracker};
use crate::sink::{write_frames, ResultSink};

/// Snapshot of the kernel for status displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelStatus {
    pub state: String,
    pub frames_resident: usize,
    pub windows: usize,
    pub paused: bool,
    pub analysis_in_flight: bool,
}

/// Wires one frame source to its store, drain controller, analysis and sink,
/// and exposes the control surface used by automation or a UI.
pub struct AcquisitionKernel {
    config: SessionConfig,
    store: Arc<FrameStore>,
    rates: Arc<RateTracker>,
    controller: Arc<DrainController>,
    metrics: Arc<AcquisitionMetrics>,
    acquisition: Mutex<AcquisitionLoop>,
    latest: LatestFrame,
    sink: Arc<ResultSink>,

    /// Cancel flag of the analysis cycle in flight. `stop_acquisition`
    /// sets it so that cycle starts no further windows.
    active_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl AcquisitionKernel {
    pub fn new(config: SessionConfig, source: Box<dyn FrameSource>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AcquisitionError::InvalidParameter(e.to_string()))?;

        let store = Arc::new(FrameStore::new(config.buffer_capacity)?);
        let rates = Arc::new(RateTracker::new());
        let controller = Arc::new(DrainController::new(store.clone(), rates.clone()));
        let metrics = Arc::new(AcquisitionMetrics::new());
        let acquisition = AcquisitionLoop::new(
            source,
            controller.clone(),
            metrics.clone(),
            config.loop_timing(),
        );

        let latest = acquisition.latest_handle();

        Ok(Self {
            config,
            store,
            rates,
            controller,
            metrics,
            acquisition: Mutex::new(acquisition),
            latest,
            sink: Arc::new(ResultSink::new()),
            active_cancel: Mutex::new(None),
        })
    }

    fn acquisition(&self) -> MutexGuard<'_, AcquisitionLoop> {
        self.acquisition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn active_cancel(&self) -> MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.active_cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.acquisition().state()
    }

    pub fn controller(&self) -> &Arc<DrainController> {
        &self.controller
    }

    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    pub fn sink(&self) -> &Arc<ResultSink> {
        &self.sink
    }

    pub fn monitor(&self) -> AcquisitionMonitor {
        AcquisitionMonitor::new(self.metrics.clone(), self.store.clone(), self.rates.clone())
    }

    pub fn status(&self) -> KernelStatus {
        KernelStatus {
            state: self.state().name().to_string(),
            frames_resident: self.store.len(),
            windows: self.sink.len(),
            paused: self.controller.is_paused(),
            analysis_in_flight: self.controller.is_cycle_in_flight(),
        }
    }

    pub fn start_acquisition(&self) -> Result<()> {
        self.acquisition().start()
    }

    /// Stop the loop. An analysis cycle in flight finishes its current
    /// window and starts no more; later cycles are unaffected.
    pub fn stop_acquisition(&self) -> Result<()> {
        if let Some(cancel) = self.active_cancel().as_ref() {
            cancel.store(true, Ordering::Release);
            log::info!("Stopping the analysis cycle in flight after its current window");
        }
        self.acquisition().stop()
    }

    /// Fatal error from a loop that exited on its own
    pub fn take_error(&self) -> Option<AcquisitionError> {
        self.acquisition().take_error()
    }

    pub fn get_latest_frame(&self) -> Option<Arc<Frame>> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Mean and standard deviation of the rate since the last drain
    pub fn get_rate_stats(&self) -> Option<RateStats> {
        self.rates.stats()
    }

    /// Pause storage, drain, resume, and analyze the drained frames at the
    /// mean rate they were recorded at. Returns the number of windows added
    /// to the sink; too few frames is `Ok(0)`.
    ///
    /// Parameters are checked against the recorded rate while storage is
    /// paused. A rejected request resumes storage with the store untouched.
    pub async fn pause_and_drain(&self, frequency: f64, min_cycles: usize) -> Result<usize> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(AcquisitionError::InvalidParameter(format!(
                "frequency must be positive, got {}",
                frequency
            )));
        }
        if min_cycles == 0 {
            return Err(AcquisitionError::InvalidParameter(
                "min_cycles must be at least 1".to_string(),
            ));
        }

        let mut cycle = self.controller.begin_pause()?;
        let pending = cycle.pending_frames();
        let Some(rate) = cycle.pending_rate() else {
            if pending == 0 {
                log::info!("0 windows produced: nothing stored since the last drain");
            } else {
                log::info!("0 windows produced: {} frames stored without a frame rate", pending);
            }
            return Ok(0);
        };
        let plan = WindowPlan::new(frequency, min_cycles, rate.mean)?;

        let cancel = Arc::new(AtomicBool::new(false));
        *self.active_cancel() = Some(cancel.clone());
        let sink = self.sink.clone();

        let outcome = tokio::task::spawn_blocking(move || -> Result<usize> {
            let batch = cycle.drain_and_resume();
            log::debug!(
                "Analyzing {} frames at {:.2} ± {:.2} fps",
                batch.frames.len(),
                rate.mean,
                rate.stddev
            );
            let analyzer = HarmonicAnalyzer::from_plan(plan);
            let result = analyzer.analyze_cancellable(&batch.frames, &cancel)?;
            let added = sink.append(result)?;
            drop(cycle);

            log::info!("{} windows produced from {} frames", added, batch.frames.len());
            Ok(added)
        })
        .await
        .map_err(|e| AcquisitionError::AnalysisFailed(e.to_string()));

        self.active_cancel().take();
        outcome?
    }

    /// Persist the sink to the configured output path
    pub fn flush(&self) -> Result<usize> {
        self.flush_to(&self.config.output_path)
    }

    pub fn flush_to(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.sink.flush(path)
    }

    /// Write the frames currently in the store as a raw recording.
    ///
    /// The store is only copied, so acquisition and the next drain cycle
    /// see the same frames as before.
    pub fn save_frames(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let frames = self.store.snapshot();
        write_frames(path, &frames).map_err(|e| AcquisitionError::Persistence(format!("{:#}", e)))?;
        log::info!("Saved {} raw frames to {:?}", frames.len(), path);
        Ok(frames.len())
    }
}
