use framelock::analysis::HarmonicResult;
use framelock::core::{AcquisitionError, ComplexImage};
use framelock::sink::{read_container, write_container, ResultSink, ResultStack};
use rustfft::num_complex::Complex;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn result(windows: usize, seed: f64) -> HarmonicResult {
    let (width, height) = (3, 2);
    HarmonicResult {
        windows: (0..windows)
            .map(|w| {
                let data = (0..width * height)
                    .map(|p| Complex::new(seed + w as f64, -(p as f64) * 0.25))
                    .collect();
                ComplexImage::new(width, height, data)
            })
            .collect(),
        width,
        height,
        freq_axis: vec![0.0, 2.5, 5.0, -5.0, -2.5],
        target_bin: 2,
        frame_rate: 12.5,
    }
}

#[test]
fn test_container_preserves_all_fields() {
    let mut stack = ResultStack::empty();
    stack.append(result(2, 1.0)).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("results.flk");
    write_container(&path, &stack).unwrap();

    let restored = read_container(&path).unwrap();
    assert_eq!(restored.shape(), (2, 2, 3));
    assert_eq!(restored.freq_axis, vec![0.0, 2.5, 5.0, -5.0, -2.5]);
    assert_eq!(restored.target_bin, 2);
    assert_eq!(restored.frame_rate, 12.5);
    assert_eq!(restored.windows[1].at(2, 1), Complex::new(2.0, -1.25));
}

#[test]
fn test_truncated_container_rejected() {
    let mut stack = ResultStack::empty();
    stack.append(result(1, 0.0)).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("results.flk");
    write_container(&path, &stack).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 16]).unwrap();
    assert!(read_container(&path).is_err());
}

#[test]
fn test_flush_while_appending() {
    let sink = Arc::new(ResultSink::new());
    let dir = tempdir().unwrap();
    let path = dir.path().join("live.flk");

    let writer = {
        let sink = sink.clone();
        thread::spawn(move || {
            for i in 0..50 {
                sink.append(result(1, i as f64)).unwrap();
            }
        })
    };

    for _ in 0..10 {
        let flushed = sink.flush(&path).unwrap();
        let restored = read_container(&path).unwrap();
        assert_eq!(restored.len(), flushed);
    }
    writer.join().unwrap();

    assert_eq!(sink.flush(&path).unwrap(), 50);
    assert_eq!(read_container(&path).unwrap(), sink.snapshot());
}

#[test]
fn test_flush_to_missing_directory_fails() {
    let sink = ResultSink::new();
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("results.flk");
    assert!(matches!(sink.flush(&path), Err(AcquisitionError::Persistence(_))));
}
