pub mod mock;
pub mod traits;
pub mod types;

pub use traits::FrameSource;
pub use types::{Image, SourceInfo};
