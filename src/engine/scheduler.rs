use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::AcquisitionError;
use crate::engine::AcquisitionKernel;

/// Outcome counters of a scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerReport {
    /// Cycles that completed, including those producing 0 windows
    pub cycles: u64,
    pub windows: u64,

    /// Ticks dropped because the previous cycle was still analyzing
    pub skipped: u64,
    pub errors: u64,
}

/// Runs `pause_and_drain` on a fixed period for live analysis
pub struct AnalysisScheduler {
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<SchedulerReport>>,
}

impl AnalysisScheduler {
    /// Must be called from within a tokio runtime
    pub fn spawn(
        kernel: Arc<AcquisitionKernel>,
        interval: Duration,
        frequency: f64,
        min_cycles: usize,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let mut report = SchedulerReport::default();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        match kernel.pause_and_drain(frequency, min_cycles).await {
                            Ok(windows) => {
                                report.cycles += 1;
                                report.windows += windows as u64;
                            }
                            Err(AcquisitionError::AnalysisInFlight) => {
                                report.skipped += 1;
                                log::warn!("Analysis cycle still running, skipping tick");
                            }
                            Err(e) => {
                                report.errors += 1;
                                log::error!("Analysis cycle failed: {}", e);
                            }
                        }
                    }
                }
            }

            log::debug!("Analysis scheduler exiting: {:?}", report);
            report
        });

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Signal shutdown and wait for the current cycle to finish
    pub async fn shutdown(mut self) -> SchedulerReport {
        let _ = self.shutdown_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                log::error!("Analysis scheduler task failed: {}", e);
                SchedulerReport::default()
            }),
            None => SchedulerReport::default(),
        }
    }
}

impl Drop for AnalysisScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
