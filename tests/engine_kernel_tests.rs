use framelock::config::SessionConfig;
use framelock::core::AcquisitionError;
use framelock::engine::{AcquisitionKernel, AnalysisScheduler, LoopState};
use framelock::hal::mock::{ScriptedSource, SimulatedCamera};
use framelock::sink::{read_container, read_frames};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn config() -> SessionConfig {
    SessionConfig {
        buffer_capacity: 200,
        exposure_ms: 5,
        fetch_margin_ms: 20,
        stop_timeout_ms: 2_000,
        ..SessionConfig::default()
    }
}

async fn wait_for_frames(kernel: &AcquisitionKernel, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while kernel.store().len() < count && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(kernel.store().len(), count);
}

#[tokio::test]
async fn test_kernel_starts_idle() {
    let kernel = AcquisitionKernel::new(config(), Box::new(SimulatedCamera::new())).unwrap();
    assert_eq!(kernel.state(), LoopState::Idle);
    assert!(kernel.get_latest_frame().is_none());
    assert!(kernel.get_rate_stats().is_none());

    let status = kernel.status();
    assert_eq!(status.state, "Idle");
    assert_eq!(status.windows, 0);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let bad = SessionConfig {
        buffer_capacity: 0,
        ..config()
    };
    assert!(matches!(
        AcquisitionKernel::new(bad, Box::new(SimulatedCamera::new())),
        Err(AcquisitionError::InvalidParameter(_))
    ));
}

#[tokio::test]
async fn test_pause_and_drain_counts_windows() {
    let source = ScriptedSource::marker_frames(45, 3, 2, 100.0);
    let kernel = AcquisitionKernel::new(config(), Box::new(source)).unwrap();

    kernel.start_acquisition().unwrap();
    wait_for_frames(&kernel, 45).await;

    let rate = kernel.get_rate_stats().unwrap();
    assert_eq!(rate.mean, 100.0);
    assert_eq!(rate.stddev, 0.0);
    assert_eq!(rate.samples, 45);

    assert_eq!(kernel.pause_and_drain(10.0, 2).await.unwrap(), 3);
    assert!(kernel.store().is_empty());
    assert!(kernel.get_rate_stats().is_none());
    assert_eq!(kernel.sink().len(), 3);
    assert_eq!(kernel.get_latest_frame().unwrap().sequence, 44);

    kernel.stop_acquisition().unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("kernel.flk");
    assert_eq!(kernel.flush_to(&path).unwrap(), 3);
    let stack = read_container(&path).unwrap();
    assert_eq!(stack.shape(), (3, 2, 3));
    assert_eq!(stack.target_bin, 2);
}

#[tokio::test]
async fn test_insufficient_frames_is_zero_windows() {
    let source = ScriptedSource::marker_frames(12, 2, 2, 100.0);
    let kernel = AcquisitionKernel::new(config(), Box::new(source)).unwrap();

    // nothing stored yet
    assert_eq!(kernel.pause_and_drain(10.0, 2).await.unwrap(), 0);

    kernel.start_acquisition().unwrap();
    wait_for_frames(&kernel, 12).await;
    assert_eq!(kernel.pause_and_drain(10.0, 2).await.unwrap(), 0);
    assert!(kernel.store().is_empty());
    kernel.stop_acquisition().unwrap();
}

#[tokio::test]
async fn test_invalid_analysis_parameters_leave_store_untouched() {
    let source = ScriptedSource::marker_frames(5, 1, 1, 100.0);
    let kernel = AcquisitionKernel::new(config(), Box::new(source)).unwrap();
    kernel.start_acquisition().unwrap();
    wait_for_frames(&kernel, 5).await;

    for (f, c) in [(0.0, 2), (-3.0, 2), (10.0, 0)] {
        assert!(matches!(
            kernel.pause_and_drain(f, c).await,
            Err(AcquisitionError::InvalidParameter(_))
        ));
    }
    assert_eq!(kernel.store().len(), 5);
    assert!(!kernel.status().paused);
    kernel.stop_acquisition().unwrap();
}

#[tokio::test]
async fn test_unresolvable_frequency_keeps_frames_for_next_cycle() {
    let source = ScriptedSource::marker_frames(45, 3, 2, 100.0);
    let kernel = AcquisitionKernel::new(config(), Box::new(source)).unwrap();
    kernel.start_acquisition().unwrap();
    wait_for_frames(&kernel, 45).await;

    // 500 Hz needs more than one sample per period at 100 fps
    assert!(matches!(
        kernel.pause_and_drain(500.0, 2).await,
        Err(AcquisitionError::InvalidParameter(_))
    ));
    assert_eq!(kernel.store().len(), 45);
    assert_eq!(kernel.get_rate_stats().unwrap().samples, 45);
    assert!(!kernel.status().paused);
    assert!(kernel.sink().is_empty());

    assert_eq!(kernel.pause_and_drain(10.0, 2).await.unwrap(), 3);
    assert!(kernel.store().is_empty());
    kernel.stop_acquisition().unwrap();
}

#[tokio::test]
async fn test_drain_after_stop_analyzes_remaining_frames() {
    let source = ScriptedSource::marker_frames(45, 3, 2, 100.0);
    let kernel = AcquisitionKernel::new(config(), Box::new(source)).unwrap();
    kernel.start_acquisition().unwrap();
    wait_for_frames(&kernel, 45).await;
    kernel.stop_acquisition().unwrap();
    assert_eq!(kernel.state(), LoopState::Idle);

    assert_eq!(kernel.pause_and_drain(10.0, 2).await.unwrap(), 3);
    assert_eq!(kernel.sink().len(), 3);
    assert!(kernel.store().is_empty());

    // a second stop while idle must not poison later cycles either
    kernel.stop_acquisition().unwrap();
    assert_eq!(kernel.pause_and_drain(10.0, 2).await.unwrap(), 0);
    assert_eq!(kernel.sink().len(), 3);
}

#[tokio::test]
async fn test_overlapping_drain_is_rejected() {
    let source = ScriptedSource::marker_frames(45, 3, 2, 100.0);
    let kernel = AcquisitionKernel::new(config(), Box::new(source)).unwrap();
    kernel.start_acquisition().unwrap();
    wait_for_frames(&kernel, 45).await;

    let held = kernel.controller().begin_pause().unwrap();
    assert!(matches!(
        kernel.pause_and_drain(10.0, 2).await,
        Err(AcquisitionError::AnalysisInFlight)
    ));
    assert_eq!(kernel.store().len(), 45);
    assert!(kernel.sink().is_empty());

    // an undrained cycle resumes storage when dropped
    drop(held);
    assert!(!kernel.status().paused);
    assert_eq!(kernel.pause_and_drain(10.0, 2).await.unwrap(), 3);
    kernel.stop_acquisition().unwrap();
}

#[tokio::test]
async fn test_save_frames_keeps_store() {
    let source = ScriptedSource::marker_frames(12, 3, 2, 100.0);
    let kernel = AcquisitionKernel::new(config(), Box::new(source)).unwrap();
    kernel.start_acquisition().unwrap();
    wait_for_frames(&kernel, 12).await;
    kernel.stop_acquisition().unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("store.raw");
    assert_eq!(kernel.save_frames(&path).unwrap(), 12);
    assert_eq!(kernel.store().len(), 12);

    let frames = read_frames(&path).unwrap();
    assert_eq!(frames.len(), 12);
    assert_eq!(frames[7].sequence, 7);
    assert_eq!(frames[7].pixels.value(5), 7.0);
    assert_eq!(frames[7].shape(), (2, 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduler_runs_live_cycles() {
    let mut camera = SimulatedCamera::new();
    camera
        .configure(json!({"width": 4, "height": 4, "frame_rate": 200.0, "modulation_hz": 10.0}))
        .unwrap();
    let kernel = Arc::new(AcquisitionKernel::new(config(), Box::new(camera)).unwrap());
    kernel.start_acquisition().unwrap();

    let scheduler = AnalysisScheduler::spawn(kernel.clone(), Duration::from_millis(300), 10.0, 2);
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let report = scheduler.shutdown().await;
    kernel.stop_acquisition().unwrap();

    assert!(report.cycles >= 2, "{:?}", report);
    assert_eq!(report.errors, 0);
    assert_eq!(report.windows as usize, kernel.sink().len());
    assert!(kernel.sink().len() >= 2);

    let text = kernel.monitor().generate_report();
    assert!(text.contains("Acquisition Metrics"));
}
