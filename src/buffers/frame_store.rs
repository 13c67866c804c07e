use crate::core::{AcquisitionError, Frame, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct StoreInner {
    slots: Vec<Option<Arc<Frame>>>,
    /// Next write position; always `total_written % capacity`
    cursor: usize,
    len: usize,
    total_written: u64,
    overwritten: u64,
}

impl StoreInner {
    fn oldest_slot(&self) -> usize {
        let capacity = self.slots.len();
        (self.cursor + capacity - self.len) % capacity
    }

    fn resident(&self) -> Vec<Arc<Frame>> {
        let capacity = self.slots.len();
        let start = self.oldest_slot();
        (0..self.len)
            .filter_map(|i| self.slots[(start + i) % capacity].clone())
            .collect()
    }
}

/// Fixed-capacity circular frame store.
///
/// When full, `push` overwrites the oldest frame; the producer never blocks on
/// a full store. Cursor, slots and counters are guarded by one lock so no
/// reader observes a half-applied push.
pub struct FrameStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
    producer_attached: Arc<AtomicBool>,
}

impl FrameStore {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(AcquisitionError::InvalidParameter(
                "frame store capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            inner: Mutex::new(StoreInner {
                slots: vec![None; capacity],
                cursor: 0,
                len: 0,
                total_written: 0,
                overwritten: 0,
            }),
            capacity,
            producer_attached: Arc::new(AtomicBool::new(false)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, frame: Frame) {
        self.push_shared(Arc::new(frame));
    }

    /// O(1) insert; evicts the oldest frame when full
    pub fn push_shared(&self, frame: Arc<Frame>) {
        let mut inner = self.lock();
        if inner.len == self.capacity {
            inner.overwritten += 1;
        } else {
            inner.len += 1;
        }
        let cursor = inner.cursor;
        inner.slots[cursor] = Some(frame);
        inner.cursor = (cursor + 1) % self.capacity;
        inner.total_written += 1;
    }

    /// Resident frames, oldest first, without mutating the store
    pub fn snapshot(&self) -> Vec<Arc<Frame>> {
        self.lock().resident()
    }

    /// Resident frames, oldest first; the store is left empty.
    /// `total_written` is preserved.
    pub fn drain(&self) -> Vec<Arc<Frame>> {
        let mut inner = self.lock();
        let frames = inner.resident();
        for slot in inner.slots.iter_mut() {
            *slot = None;
        }
        inner.len = 0;
        frames
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_written(&self) -> u64 {
        self.lock().total_written
    }

    /// Number of frames evicted by overwrite since construction
    pub fn overwritten(&self) -> u64 {
        self.lock().overwritten
    }

    /// Absolute write index of the oldest resident frame
    pub fn oldest_index(&self) -> u64 {
        let inner = self.lock();
        inner.total_written - inner.len as u64
    }

    /// Most recently pushed frame, if still resident
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let inner = self.lock();
        if inner.len == 0 {
            return None;
        }
        let slot = (inner.cursor + self.capacity - 1) % self.capacity;
        inner.slots[slot].clone()
    }

    /// The newest `n` resident frames, oldest first
    pub fn last_n(&self, n: usize) -> Result<Vec<Arc<Frame>>> {
        let inner = self.lock();
        if n > inner.len {
            return Err(AcquisitionError::DataUnavailable {
                start: inner.total_written.saturating_sub(n as u64),
                end: inner.total_written,
                oldest: inner.total_written - inner.len as u64,
                next: inner.total_written,
            });
        }
        let frames = inner.resident();
        Ok(frames[frames.len() - n..].to_vec())
    }

    /// Frames with absolute write indices in `start..end`, oldest first
    pub fn range(&self, start: u64, end: u64) -> Result<Vec<Arc<Frame>>> {
        let inner = self.lock();
        let oldest = inner.total_written - inner.len as u64;
        if start > end || start < oldest || end > inner.total_written {
            return Err(AcquisitionError::DataUnavailable {
                start,
                end,
                oldest,
                next: inner.total_written,
            });
        }
        Ok((start..end)
            .filter_map(|index| inner.slots[(index % self.capacity as u64) as usize].clone())
            .collect())
    }

    /// Claim the single producer slot of this store
    pub fn attach_producer(&self) -> Result<ProducerLease> {
        self.producer_attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AcquisitionError::ProducerActive)?;
        Ok(ProducerLease {
            flag: self.producer_attached.clone(),
        })
    }

    pub fn has_producer(&self) -> bool {
        self.producer_attached.load(Ordering::Acquire)
    }
}

/// Held by the acquisition loop while it feeds a store; released on drop
#[derive(Debug)]
pub struct ProducerLease {
    flag: Arc<AtomicBool>,
}

impl Drop for ProducerLease {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
