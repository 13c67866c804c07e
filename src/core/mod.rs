pub mod error;
pub mod frame;
pub mod image;

pub use error::{AcquisitionError, FetchError, Result};
pub use frame::{Frame, PixelData, PixelFormat};
pub use image::{phase_of, ComplexImage};
