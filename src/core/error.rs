use std::time::Duration;
use thiserror::Error;

/// Failure reported by a frame source for a single fetch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// No frame arrived within the fetch timeout
    #[error("frame fetch timed out")]
    Timeout,

    /// Recoverable failure, e.g. a corrupted grab
    #[error("transient source failure: {0}")]
    Transient(String),

    /// Source disconnected or otherwise unrecoverable
    #[error("fatal source failure: {0}")]
    Fatal(String),
}

/// Errors surfaced by acquisition, drain and analysis operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    #[error("source timed out")]
    SourceTimeout,

    #[error("source failed: {0}")]
    SourceFatal(String),

    #[error("acquisition loop did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("another acquisition loop is already feeding this frame store")]
    ProducerActive,

    #[error("acquisition loop is wedged in Stopping and cannot be restarted")]
    LoopWedged,

    #[error("an analysis cycle is already in flight")]
    AnalysisInFlight,

    #[error("frame shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("frames {start}..{end} are not resident (oldest {oldest}, next {next})")]
    DataUnavailable {
        start: u64,
        end: u64,
        oldest: u64,
        next: u64,
    },

    #[error("analysis task failed: {0}")]
    AnalysisFailed(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl From<FetchError> for AcquisitionError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout => AcquisitionError::SourceTimeout,
            FetchError::Transient(msg) | FetchError::Fatal(msg) => AcquisitionError::SourceFatal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
