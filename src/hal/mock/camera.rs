use crate::core::{FetchError, PixelData, PixelFormat};
use crate::hal::{FrameSource, Image, SourceInfo};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Free-running camera whose pixel intensity is modulated at a fixed frequency.
///
/// Pixel `(x, y)` of frame `k` is
/// `offset + amplitude * sin(2π·f·k/fps + phase_step·x)`, so a harmonic
/// analysis at `f` recovers `amplitude` and a phase ramp along x.
pub struct SimulatedCamera {
    width: usize,
    height: usize,
    frame_rate: f64,
    modulation_hz: f64,
    amplitude: f64,
    offset: f64,
    phase_step: f64,
    format: PixelFormat,
    frame_counter: u64,
    next_due: Option<Instant>,
    disconnect_after: Option<u64>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            width: 16,
            height: 16,
            frame_rate: 100.0,
            modulation_hz: 5.0,
            amplitude: 50.0,
            offset: 100.0,
            phase_step: 0.0,
            format: PixelFormat::Mono8,
            frame_counter: 0,
            next_due: None,
            disconnect_after: None,
        }
    }

    pub fn configure(&mut self, config: Value) -> Result<()> {
        if let Some(w) = config["width"].as_u64() {
            self.width = w as usize;
        }
        if let Some(h) = config["height"].as_u64() {
            self.height = h as usize;
        }
        if let Some(fps) = config["frame_rate"].as_f64() {
            if fps <= 0.0 {
                return Err(anyhow!("frame_rate must be positive, got {}", fps));
            }
            self.frame_rate = fps;
        }
        if let Some(freq) = config["modulation_hz"].as_f64() {
            self.modulation_hz = freq;
        }
        if let Some(amp) = config["amplitude"].as_f64() {
            self.amplitude = amp;
        }
        if let Some(offset) = config["offset"].as_f64() {
            self.offset = offset;
        }
        if let Some(step) = config["phase_step"].as_f64() {
            self.phase_step = step;
        }
        if let Some(limit) = config["disconnect_after"].as_u64() {
            self.disconnect_after = Some(limit);
        }
        if let Some(fmt) = config["pixel_format"].as_str() {
            self.format = match fmt {
                "mono8" => PixelFormat::Mono8,
                "mono16" => PixelFormat::Mono16,
                "float" => PixelFormat::Float,
                _ => return Err(anyhow!("Unknown pixel format: {}", fmt)),
            };
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("Image size must be non-zero"));
        }
        Ok(())
    }

    /// Render frame `index` without pacing
    pub fn render(&self, index: u64) -> Image {
        let t = index as f64 / self.frame_rate;
        let n = self.width * self.height;
        let mut values = Vec::with_capacity(n);
        for _y in 0..self.height {
            for x in 0..self.width {
                let phase = 2.0 * PI * self.modulation_hz * t + self.phase_step * x as f64;
                values.push(self.offset + self.amplitude * phase.sin());
            }
        }

        let pixels = match self.format {
            PixelFormat::Mono8 => PixelData::Mono8(
                values.iter().map(|v| v.round().clamp(0.0, 255.0) as u8).collect(),
            ),
            PixelFormat::Mono16 => PixelData::Mono16(
                values.iter().map(|v| v.round().clamp(0.0, 65535.0) as u16).collect(),
            ),
            PixelFormat::Float => PixelData::Float(values),
        };
        Image::new(self.width, self.height, pixels)
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate)
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SimulatedCamera {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            id: "simulated-camera".to_string(),
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    fn try_get_frame(&mut self, timeout: Duration) -> std::result::Result<Image, FetchError> {
        if let Some(limit) = self.disconnect_after {
            if self.frame_counter >= limit {
                return Err(FetchError::Fatal("simulated camera disconnected".to_string()));
            }
        }

        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now);
        let wait = due.saturating_duration_since(now);
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(FetchError::Timeout);
        }
        std::thread::sleep(wait);

        let image = self.render(self.frame_counter);
        self.frame_counter += 1;
        self.next_due = Some(due + self.period());
        Ok(image)
    }

    fn current_rate(&self) -> f64 {
        self.frame_rate
    }
}
