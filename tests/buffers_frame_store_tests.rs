use framelock::buffers::FrameStore;
use framelock::core::{AcquisitionError, Frame, PixelData};
use std::sync::Arc;
use std::thread;

fn marker(seq: u64, width: usize, height: usize) -> Frame {
    Frame::new(seq, seq * 10, width, height, PixelData::Float(vec![seq as f64; width * height]))
}

fn sequences(frames: &[Arc<Frame>]) -> Vec<u64> {
    frames.iter().map(|f| f.sequence).collect()
}

#[test]
fn test_len_is_min_of_pushes_and_capacity() {
    for capacity in [1usize, 3, 8] {
        for pushes in 0..20u64 {
            let store = FrameStore::new(capacity).unwrap();
            for seq in 0..pushes {
                store.push(marker(seq, 1, 1));
            }
            let expected = (pushes as usize).min(capacity);
            assert_eq!(store.len(), expected);

            let first = pushes - expected as u64;
            assert_eq!(sequences(&store.snapshot()), (first..pushes).collect::<Vec<_>>());
        }
    }
}

#[test]
fn test_snapshot_is_idempotent() {
    let store = FrameStore::new(4).unwrap();
    for seq in 0..6 {
        store.push(marker(seq, 2, 2));
    }
    let a = store.snapshot();
    let b = store.snapshot();
    assert_eq!(sequences(&a), sequences(&b));
    assert_eq!(store.len(), 4);
}

#[test]
fn test_drain_empties_store() {
    let store = FrameStore::new(4).unwrap();
    for seq in 0..3 {
        store.push(marker(seq, 1, 1));
    }
    assert_eq!(sequences(&store.drain()), vec![0, 1, 2]);
    assert_eq!(store.len(), 0);
    assert!(store.drain().is_empty());

    store.push(marker(99, 1, 1));
    assert_eq!(sequences(&store.snapshot()), vec![99]);
}

#[test]
fn test_overwrite_evicts_oldest() {
    let capacity = 5;
    let store = FrameStore::new(capacity).unwrap();
    for seq in 1..=(capacity as u64 + 1) {
        store.push(marker(seq, 1, 1));
    }
    assert_eq!(sequences(&store.snapshot()), vec![2, 3, 4, 5, 6]);
    assert_eq!(store.overwritten(), 1);
    assert_eq!(store.latest().unwrap().sequence, 6);
}

#[test]
fn test_absolute_addressing() {
    let store = FrameStore::new(4).unwrap();
    for seq in 0..10 {
        store.push(marker(seq, 1, 1));
    }
    assert_eq!(store.oldest_index(), 6);
    assert_eq!(sequences(&store.range(7, 9).unwrap()), vec![7, 8]);
    assert_eq!(sequences(&store.last_n(2).unwrap()), vec![8, 9]);

    match store.range(2, 8) {
        Err(AcquisitionError::DataUnavailable { oldest, next, .. }) => {
            assert_eq!(oldest, 6);
            assert_eq!(next, 10);
        }
        other => panic!("expected DataUnavailable, got {:?}", other),
    }
    assert!(store.last_n(5).is_err());
}

#[test]
fn test_zero_capacity_rejected() {
    assert!(matches!(
        FrameStore::new(0),
        Err(AcquisitionError::InvalidParameter(_))
    ));
}

#[test]
fn test_single_producer_lease() {
    let store = FrameStore::new(2).unwrap();
    let lease = store.attach_producer().unwrap();
    assert!(matches!(store.attach_producer(), Err(AcquisitionError::ProducerActive)));
    drop(lease);
    assert!(!store.has_producer());
    assert!(store.attach_producer().is_ok());
}

#[test]
fn test_concurrent_push_and_snapshot() {
    let capacity = 16;
    let (width, height) = (8, 8);
    let store = Arc::new(FrameStore::new(capacity).unwrap());

    let producer = {
        let store = store.clone();
        thread::spawn(move || {
            for seq in 0..20_000u64 {
                store.push(marker(seq, width, height));
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let snapshot = store.snapshot();
                    assert!(snapshot.len() <= capacity);

                    for pair in snapshot.windows(2) {
                        assert_eq!(pair[1].sequence, pair[0].sequence + 1);
                    }
                    for frame in &snapshot {
                        let expected = frame.sequence as f64;
                        assert!(frame.pixels.to_f64().iter().all(|v| *v == expected));
                    }
                }
            })
        })
        .collect();

    producer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.total_written(), 20_000);
    assert_eq!(store.len(), capacity);
}
