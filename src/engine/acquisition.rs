use crate::buffers::ProducerLease;
use crate::core::{AcquisitionError, FetchError, Frame, Result};
use crate::engine::drain::DrainController;
use crate::engine::state::LoopState;
use crate::hal::FrameSource;
use crate::observability::AcquisitionMetrics;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Timing bounds of the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTiming {
    /// Upper bound for a single fetch from the source
    pub fetch_timeout: Duration,

    /// Upper bound for `stop()` to see the loop exit
    pub stop_timeout: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(110),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

/// Sent by the loop thread when it exits; hands the source back
struct LoopExit {
    source: Box<dyn FrameSource>,
    outcome: Result<()>,
}

/// Shared latest-frame slot, updated even while storage is paused
pub type LatestFrame = Arc<Mutex<Option<Arc<Frame>>>>;

/// Producer that pulls frames from a source on a dedicated thread and feeds
/// them through the drain controller into the frame store.
pub struct AcquisitionLoop {
    controller: Arc<DrainController>,
    metrics: Arc<AcquisitionMetrics>,
    latest: LatestFrame,
    state: Arc<Mutex<LoopState>>,
    stop_flag: Arc<AtomicBool>,
    timing: LoopTiming,
    source: Option<Box<dyn FrameSource>>,
    exit_rx: Option<Receiver<LoopExit>>,
    handle: Option<JoinHandle<()>>,
    pending_error: Option<AcquisitionError>,
}

impl AcquisitionLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        controller: Arc<DrainController>,
        metrics: Arc<AcquisitionMetrics>,
        timing: LoopTiming,
    ) -> Self {
        Self {
            controller,
            metrics,
            latest: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(LoopState::Idle)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            timing,
            source: Some(source),
            exit_rx: None,
            handle: None,
            pending_error: None,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        lock_state(&self.state)
    }

    pub fn state(&self) -> LoopState {
        *self.lock_state()
    }

    pub fn timing(&self) -> LoopTiming {
        self.timing
    }

    /// Shared handle to the latest-frame slot; readable without the loop
    pub fn latest_handle(&self) -> LatestFrame {
        self.latest.clone()
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Fatal error from a loop that exited on its own, if not yet reported
    pub fn take_error(&mut self) -> Option<AcquisitionError> {
        self.reap();
        self.pending_error.take()
    }

    /// Collect an exited loop thread without blocking
    fn reap(&mut self) {
        let exit = match &self.exit_rx {
            Some(rx) => rx.try_recv().ok(),
            None => None,
        };
        if let Some(exit) = exit {
            self.collect(exit);
        }
    }

    fn collect(&mut self, exit: LoopExit) {
        self.source = Some(exit.source);
        self.exit_rx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Acquisition thread panicked");
            }
        }
        if let Err(e) = exit.outcome {
            self.pending_error = Some(e);
        }
    }

    /// Spawn the loop. A second start while running is a no-op.
    pub fn start(&mut self) -> Result<()> {
        self.reap();

        match self.state() {
            LoopState::Running => {
                log::warn!("Trying to start the acquisition loop again");
                return Ok(());
            }
            LoopState::Stopping => return Err(AcquisitionError::LoopWedged),
            LoopState::Idle => {}
        }

        let source = self.source.take().ok_or(AcquisitionError::LoopWedged)?;
        let lease = match self.controller.store().attach_producer() {
            Ok(lease) => lease,
            Err(e) => {
                self.source = Some(source);
                return Err(e);
            }
        };

        let (exit_tx, exit_rx) = bounded(1);
        let ctx = LoopContext {
            controller: self.controller.clone(),
            metrics: self.metrics.clone(),
            latest: self.latest.clone(),
            state: self.state.clone(),
            stop_flag: self.stop_flag.clone(),
            fetch_timeout: self.timing.fetch_timeout,
        };

        self.pending_error = None;
        self.stop_flag.store(false, Ordering::Release);
        let transition = self.lock_state().transition_to(LoopState::Running);
        if let Err(e) = transition {
            self.source = Some(source);
            return Err(e);
        }

        let source_id = source.info().id;
        let spawned = std::thread::Builder::new()
            .name(format!("acquire-{}", source_id))
            .spawn(move || ctx.run(source, lease, exit_tx));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.exit_rx = Some(exit_rx);
                log::info!("Acquisition started from {}", source_id);
                Ok(())
            }
            Err(e) => {
                // source and lease were moved into the failed closure and dropped
                if let Err(state_err) = self.lock_state().transition_to(LoopState::Idle) {
                    log::error!("Acquisition thread failed to spawn: {}", state_err);
                }
                Err(AcquisitionError::SourceFatal(format!(
                    "failed to spawn acquisition thread: {}",
                    e
                )))
            }
        }
    }

    /// Request cancellation and wait for the loop to exit, bounded by
    /// `stop_timeout`. Exceeding the bound returns `StopTimeout` and leaves
    /// the loop in `Stopping`; calling `stop()` again waits once more.
    pub fn stop(&mut self) -> Result<()> {
        self.reap();

        {
            let mut state = self.lock_state();
            let current = *state;
            match current {
                LoopState::Idle => {
                    drop(state);
                    if let Some(e) = self.pending_error.take() {
                        return Err(e);
                    }
                    log::warn!("Trying to stop the acquisition loop, but it is not running");
                    return Ok(());
                }
                LoopState::Running => state.transition_to(LoopState::Stopping)?,
                LoopState::Stopping => {}
            }
        }

        self.stop_flag.store(true, Ordering::Release);

        let rx = match &self.exit_rx {
            Some(rx) => rx.clone(),
            None => return Err(AcquisitionError::LoopWedged),
        };

        match rx.recv_timeout(self.timing.stop_timeout) {
            Ok(exit) => {
                self.collect(exit);
                log::info!("Acquisition stopped");
                match self.pending_error.take() {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "Acquisition loop failed to stop within {:?}; source appears wedged",
                    self.timing.stop_timeout
                );
                Err(AcquisitionError::StopTimeout(self.timing.stop_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.exit_rx = None;
                self.handle = None;
                if let Err(e) = self.lock_state().transition_to(LoopState::Idle) {
                    log::error!("Acquisition thread vanished: {}", e);
                }
                Err(AcquisitionError::SourceFatal(
                    "acquisition thread exited without returning the source".to_string(),
                ))
            }
        }
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        // Can't wait here; the thread exits within one fetch timeout.
        self.stop_flag.store(true, Ordering::Release);
    }
}

fn lock_state(state: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct LoopContext {
    controller: Arc<DrainController>,
    metrics: Arc<AcquisitionMetrics>,
    latest: LatestFrame,
    state: Arc<Mutex<LoopState>>,
    stop_flag: Arc<AtomicBool>,
    fetch_timeout: Duration,
}

impl LoopContext {
    fn run(self, mut source: Box<dyn FrameSource>, lease: ProducerLease, exit_tx: Sender<LoopExit>) {
        let outcome = self.acquire(source.as_mut());
        drop(lease);

        let mut state = lock_state(&self.state);
        let _ = exit_tx.send(LoopExit { source, outcome });
        if let Err(e) = state.transition_to(LoopState::Idle) {
            log::error!("Acquisition thread exiting: {}", e);
        }
    }

    fn acquire(&self, source: &mut dyn FrameSource) -> Result<()> {
        let session_start = Instant::now();
        let mut sequence = 0u64;
        let mut last_timestamp: Option<u64> = None;

        while !self.stop_flag.load(Ordering::Acquire) {
            let fetch_start = self.metrics.start_fetch();

            match source.try_get_frame(self.fetch_timeout) {
                Ok(image) => {
                    self.metrics.finish_fetch(fetch_start);
                    if image.pixels.len() != image.width * image.height {
                        self.metrics.record_transient_error();
                        log::warn!(
                            "Dropping malformed frame: {} pixels for {}x{}",
                            image.pixels.len(),
                            image.width,
                            image.height
                        );
                        continue;
                    }

                    let timestamp = session_start.elapsed().as_micros() as u64;
                    let rate = observed_rate(source.current_rate(), last_timestamp, timestamp);
                    last_timestamp = Some(timestamp);

                    let frame = Arc::new(Frame::new(
                        sequence,
                        timestamp,
                        image.width,
                        image.height,
                        image.pixels,
                    ));
                    sequence += 1;

                    *self
                        .latest
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(frame.clone());

                    if self.controller.offer(frame, rate) {
                        self.metrics.record_stored();
                    } else {
                        self.metrics.record_discarded();
                    }
                }
                Err(e @ FetchError::Timeout) => {
                    self.metrics.record_timeout();
                    log::debug!("{} after {:?}", AcquisitionError::from(e), self.fetch_timeout);
                }
                Err(FetchError::Transient(msg)) => {
                    self.metrics.record_transient_error();
                    log::warn!("Grabbing failed: {}", msg);
                }
                Err(e @ FetchError::Fatal(_)) => {
                    log::error!("Frame source failed, stopping acquisition: {}", e);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }
}

/// Prefer the device's rate hint; fall back to the interval since the
/// previous frame. Returns 0.0 when neither is usable.
fn observed_rate(hint: f64, previous_us: Option<u64>, now_us: u64) -> f64 {
    if hint.is_finite() && hint > 0.0 {
        return hint;
    }
    match previous_us {
        Some(prev) if now_us > prev => 1_000_000.0 / (now_us - prev) as f64,
        _ => 0.0,
    }
}
