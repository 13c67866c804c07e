pub mod acquisition;
pub mod drain;
pub mod kernel;
pub mod scheduler;
pub mod state;

pub use acquisition::{AcquisitionLoop, LatestFrame, LoopTiming};
pub use drain::{DrainController, DrainCycle, DrainedBatch};
pub use kernel::{AcquisitionKernel, KernelStatus};
pub use scheduler::{AnalysisScheduler, SchedulerReport};
pub use state::LoopState;
