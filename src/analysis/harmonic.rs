use crate::core::{AcquisitionError, ComplexImage, Frame, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::borrow::Borrow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pixels transformed per FFT batch; bounds the scratch allocation
const PIXEL_CHUNK: usize = 4096;

/// Longest window accepted, in frames
pub const MAX_WINDOW_FRAMES: usize = 1 << 20;

/// Sample frequencies of an `n`-point DFT at `rate` samples per second,
/// in FFT output order: `0, 1, ..., ⌈n/2⌉-1, -⌊n/2⌋, ..., -1` times `rate/n`.
pub fn fft_frequencies(n: usize, rate: f64) -> Vec<f64> {
    let positive = (n + 1) / 2;
    (0..n)
        .map(|k| {
            let signed = if k < positive { k as f64 } else { k as f64 - n as f64 };
            signed * rate / n as f64
        })
        .collect()
}

/// Index of the bin closest to `target`; lowest index wins exact ties
pub fn nearest_bin(freqs: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (k, f) in freqs.iter().enumerate() {
        let distance = (f - target).abs();
        if distance < best_distance {
            best = k;
            best_distance = distance;
        }
    }
    best
}

/// Window geometry derived from the target frequency and frame rate
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPlan {
    pub frequency: f64,
    pub min_cycles: usize,
    pub frame_rate: f64,

    /// Frames per oscillation; also the stride between window starts
    pub min_frames: usize,

    /// Window length: `min_frames * min_cycles`
    pub cycle_frames: usize,

    pub freq_axis: Vec<f64>,
    pub target_bin: usize,
}

impl WindowPlan {
    pub fn new(frequency: f64, min_cycles: usize, frame_rate: f64) -> Result<Self> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(AcquisitionError::InvalidParameter(format!(
                "frequency must be positive, got {}",
                frequency
            )));
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(AcquisitionError::InvalidParameter(format!(
                "frame rate must be positive, got {}",
                frame_rate
            )));
        }
        if min_cycles == 0 {
            return Err(AcquisitionError::InvalidParameter(
                "min_cycles must be at least 1".to_string(),
            ));
        }

        let ratio = (frame_rate / frequency).round();
        if ratio < 1.0 {
            return Err(AcquisitionError::InvalidParameter(format!(
                "{} Hz cannot be resolved at {} fps",
                frequency, frame_rate
            )));
        }
        // checked in f64 first so the usize arithmetic below cannot overflow
        if ratio * min_cycles as f64 > MAX_WINDOW_FRAMES as f64 {
            return Err(AcquisitionError::InvalidParameter(format!(
                "{} cycles of {} Hz at {} fps need {:.0} frames per window, limit is {}",
                min_cycles,
                frequency,
                frame_rate,
                ratio * min_cycles as f64,
                MAX_WINDOW_FRAMES
            )));
        }
        let min_frames = ratio as usize;
        let cycle_frames = min_frames
            .checked_mul(min_cycles)
            .filter(|frames| *frames <= MAX_WINDOW_FRAMES)
            .ok_or_else(|| {
                AcquisitionError::InvalidParameter(format!(
                    "window of {} x {} frames is too long",
                    min_frames, min_cycles
                ))
            })?;
        let freq_axis = fft_frequencies(cycle_frames, frame_rate);
        let target_bin = nearest_bin(&freq_axis, frequency);

        Ok(Self {
            frequency,
            min_cycles,
            frame_rate,
            min_frames,
            cycle_frames,
            freq_axis,
            target_bin,
        })
    }

    /// Frequency actually read from the transform
    pub fn target_frequency(&self) -> f64 {
        self.freq_axis[self.target_bin]
    }

    /// Window starts step by `min_frames`; a start needs `cycle_frames`
    /// frames ahead of it.
    pub fn window_starts(&self, len: usize) -> impl Iterator<Item = usize> {
        let last = len.checked_sub(self.cycle_frames);
        let step = self.min_frames;
        (0..)
            .map(move |i: usize| i * step)
            .take_while(move |start| last.map_or(false, |last| *start <= last))
    }

    pub fn window_count(&self, len: usize) -> usize {
        match len.checked_sub(self.cycle_frames) {
            Some(slack) => slack / self.min_frames + 1,
            None => 0,
        }
    }
}

/// Per-window harmonic components of one analyzed sequence
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicResult {
    pub windows: Vec<ComplexImage>,
    pub width: usize,
    pub height: usize,
    pub freq_axis: Vec<f64>,
    pub target_bin: usize,
    pub frame_rate: f64,
}

impl HarmonicResult {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Extracts the target-frequency component of every pixel over sliding windows
pub struct HarmonicAnalyzer {
    plan: WindowPlan,
    fft: Arc<dyn Fft<f64>>,
}

impl HarmonicAnalyzer {
    pub fn new(frequency: f64, min_cycles: usize, frame_rate: f64) -> Result<Self> {
        Ok(Self::from_plan(WindowPlan::new(frequency, min_cycles, frame_rate)?))
    }

    pub fn from_plan(plan: WindowPlan) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(plan.cycle_frames);
        Self { plan, fft }
    }

    pub fn plan(&self) -> &WindowPlan {
        &self.plan
    }

    pub fn analyze<F: Borrow<Frame>>(&self, frames: &[F]) -> Result<HarmonicResult> {
        self.analyze_cancellable(frames, &AtomicBool::new(false))
    }

    /// Like `analyze`, but checks `cancel` before each window. A window that
    /// has started always completes.
    pub fn analyze_cancellable<F: Borrow<Frame>>(
        &self,
        frames: &[F],
        cancel: &AtomicBool,
    ) -> Result<HarmonicResult> {
        let (height, width) = check_shapes(frames)?;
        let total = self.plan.window_count(frames.len());
        let mut windows = Vec::with_capacity(total);

        for start in self.plan.window_starts(frames.len()) {
            if cancel.load(Ordering::Acquire) {
                log::info!("Analysis cancelled after {}/{} windows", windows.len(), total);
                break;
            }
            log::trace!("Window {}/{} at frame {}", windows.len() + 1, total, start);
            windows.push(self.transform_window(&frames[start..start + self.plan.cycle_frames]));
        }

        if windows.is_empty() {
            log::info!(
                "0 windows produced: {} frames, {} needed per window",
                frames.len(),
                self.plan.cycle_frames
            );
        }

        Ok(HarmonicResult {
            windows,
            width,
            height,
            freq_axis: self.plan.freq_axis.clone(),
            target_bin: self.plan.target_bin,
            frame_rate: self.plan.frame_rate,
        })
    }

    /// DFT along time for every pixel of `window`, keeping only the target bin.
    /// `window` must hold exactly `cycle_frames` frames of one shape.
    pub fn transform_window<F: Borrow<Frame>>(&self, window: &[F]) -> ComplexImage {
        let n = self.plan.cycle_frames;
        let bin = self.plan.target_bin;
        let first: &Frame = window[0].borrow();
        let (width, height) = (first.width, first.height);
        let pixels = width * height;

        let mut out = Vec::with_capacity(pixels);
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];
        let mut buffer = Vec::with_capacity(PIXEL_CHUNK.min(pixels) * n);

        let mut chunk_start = 0;
        while chunk_start < pixels {
            let chunk_end = (chunk_start + PIXEL_CHUNK).min(pixels);
            let chunk_len = chunk_end - chunk_start;

            // pixel-major: each pixel's time series is contiguous
            buffer.clear();
            buffer.resize(chunk_len * n, Complex::new(0.0, 0.0));
            for (t, frame) in window.iter().enumerate() {
                let frame: &Frame = frame.borrow();
                for p in 0..chunk_len {
                    buffer[p * n + t] = Complex::new(frame.pixels.value(chunk_start + p), 0.0);
                }
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            out.extend((0..chunk_len).map(|p| buffer[p * n + bin]));
            chunk_start = chunk_end;
        }

        ComplexImage::new(width, height, out)
    }
}

/// All frames must share the first frame's shape; returns (height, width)
fn check_shapes<F: Borrow<Frame>>(frames: &[F]) -> Result<(usize, usize)> {
    let Some(first) = frames.first() else {
        return Ok((0, 0));
    };
    let expected = first.borrow().shape();
    for frame in frames {
        let frame = frame.borrow();
        if frame.shape() != expected || frame.pixels.len() != frame.pixel_count() {
            return Err(AcquisitionError::ShapeMismatch {
                expected,
                actual: frame.shape(),
            });
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_frequencies_match_numpy_layout() {
        assert_eq!(fft_frequencies(4, 4.0), vec![0.0, 1.0, -2.0, -1.0]);
        assert_eq!(fft_frequencies(5, 5.0), vec![0.0, 1.0, 2.0, -2.0, -1.0]);
    }

    #[test]
    fn test_nearest_bin_lowest_index_on_tie() {
        assert_eq!(nearest_bin(&[0.0, 5.0, 10.0, 15.0], 7.5), 1);
    }

    #[test]
    fn test_window_count_needs_full_window() {
        let plan = WindowPlan::new(10.0, 2, 100.0).unwrap();
        assert_eq!(plan.window_count(19), 0);
        assert_eq!(plan.window_count(20), 1);
        assert_eq!(plan.window_count(29), 1);
        assert_eq!(plan.window_count(30), 2);
    }

    #[test]
    fn test_min_frames_rounds() {
        // 100 / 30 = 3.33 -> 3, 100 / 40 = 2.5 -> 3 (round half away from zero)
        assert_eq!(WindowPlan::new(30.0, 1, 100.0).unwrap().min_frames, 3);
        assert_eq!(WindowPlan::new(40.0, 1, 100.0).unwrap().min_frames, 3);
    }

    #[test]
    fn test_tiny_frequency_rejected_without_overflow() {
        for frequency in [1e-300, 1e-6, f64::MIN_POSITIVE] {
            assert!(matches!(
                WindowPlan::new(frequency, 2, 100.0),
                Err(AcquisitionError::InvalidParameter(_))
            ));
        }
        assert!(matches!(
            WindowPlan::new(1.0, usize::MAX, 100.0),
            Err(AcquisitionError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unresolvable_frequency_rejected() {
        assert!(matches!(
            WindowPlan::new(500.0, 1, 100.0),
            Err(AcquisitionError::InvalidParameter(_))
        ));
    }
}
