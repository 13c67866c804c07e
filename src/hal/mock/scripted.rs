use crate::core::{FetchError, PixelFormat};
use crate::hal::{FrameSource, Image, SourceInfo};
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted fetch outcome
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Frame(Image),
    Timeout,
    Transient(String),
    Fatal(String),
    /// Block for the given time regardless of the fetch timeout, then time out
    Stall(Duration),
}

/// Source that replays a fixed script, then idles with timeouts
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    rate: f64,
    width: usize,
    height: usize,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>, rate: f64) -> Self {
        let (width, height) = steps
            .iter()
            .find_map(|s| match s {
                ScriptStep::Frame(img) => Some((img.width, img.height)),
                _ => None,
            })
            .unwrap_or((0, 0));
        Self {
            steps: steps.into(),
            rate,
            width,
            height,
        }
    }

    /// `count` constant frames of size `width`×`height`; frame i is filled with i
    pub fn marker_frames(count: usize, width: usize, height: usize, rate: f64) -> Self {
        let steps = (0..count)
            .map(|i| ScriptStep::Frame(Image::filled(width, height, i as f64)))
            .collect();
        Self::new(steps, rate)
    }
}

impl FrameSource for ScriptedSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            id: "scripted".to_string(),
            width: self.width,
            height: self.height,
            format: PixelFormat::Float,
        }
    }

    fn try_get_frame(&mut self, timeout: Duration) -> Result<Image, FetchError> {
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(image)) => Ok(image),
            Some(ScriptStep::Timeout) => Err(FetchError::Timeout),
            Some(ScriptStep::Transient(msg)) => Err(FetchError::Transient(msg)),
            Some(ScriptStep::Fatal(msg)) => Err(FetchError::Fatal(msg)),
            Some(ScriptStep::Stall(duration)) => {
                std::thread::sleep(duration);
                Err(FetchError::Timeout)
            }
            None => {
                std::thread::sleep(timeout);
                Err(FetchError::Timeout)
            }
        }
    }

    fn current_rate(&self) -> f64 {
        self.rate
    }
}
