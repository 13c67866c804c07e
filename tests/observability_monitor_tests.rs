use framelock::buffers::FrameStore;
use framelock::core::{Frame, PixelData};
use framelock::observability::{AcquisitionMetrics, AcquisitionMonitor, RateTracker};
use std::sync::Arc;

#[test]
fn test_monitor_report() {
    let metrics = Arc::new(AcquisitionMetrics::new());
    let store = Arc::new(FrameStore::new(2).unwrap());
    let rates = Arc::new(RateTracker::new());

    for seq in 0..3 {
        let start = metrics.start_fetch();
        metrics.finish_fetch(start);
        store.push(Frame::new(seq, 0, 1, 1, PixelData::Mono8(vec![0])));
        metrics.record_stored();
        rates.record(100.0);
    }
    metrics.record_discarded();
    metrics.record_transient_error();

    let monitor = AcquisitionMonitor::new(metrics, store, rates);
    let report = monitor.generate_report();

    assert!(report.contains("3 fetched"));
    assert!(report.contains("3 stored"));
    assert!(report.contains("1 discarded"));
    assert!(report.contains("2/2 resident, 1 overwritten"));
    assert!(report.contains("1 error"));
    assert!(report.contains("100.00 ± 0.00 fps (3 samples)"));
}

#[tokio::test]
async fn test_fetch_latency_tracking() {
    let metrics = AcquisitionMetrics::new();

    let start = metrics.start_fetch();
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    metrics.finish_fetch(start);

    assert_eq!(metrics.frames_fetched(), 1);
    assert!(metrics.avg_fetch_us() >= 10_000);
}
