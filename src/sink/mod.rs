pub mod container;
pub mod recording;
pub mod stack;

pub use container::{read_container, write_container, ContainerHeader};
pub use recording::{read_frames, write_frames, RecordingHeader};
pub use stack::ResultStack;

use crate::analysis::HarmonicResult;
use crate::core::{AcquisitionError, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Owns the result stack of a run and persists it.
///
/// `flush` copies the stack under the lock and writes the copy, so appends
/// from a live analysis cycle may continue while a flush is in progress.
#[derive(Debug, Default)]
pub struct ResultSink {
    stack: Mutex<ResultStack>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sized for a known window count
    pub fn with_capacity(windows: usize) -> Self {
        Self {
            stack: Mutex::new(ResultStack::with_capacity(windows)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResultStack> {
        self.stack
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, result: HarmonicResult) -> Result<usize> {
        self.lock().append(result)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> ResultStack {
        self.lock().clone()
    }

    pub fn flush(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let stack = self.snapshot();
        write_container(path, &stack)
            .map_err(|e| AcquisitionError::Persistence(format!("{:#}", e)))?;
        log::info!("Flushed {} windows to {:?}", stack.len(), path);
        Ok(stack.len())
    }
}
