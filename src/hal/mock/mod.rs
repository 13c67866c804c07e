pub mod camera;
pub mod scripted;

pub use camera::SimulatedCamera;
pub use scripted::{ScriptStep, ScriptedSource};
