use super::harmonic::fft_frequencies;
use super::roi::{integrate_roi, Roi};
use crate::core::{AcquisitionError, Frame, Result};
use rustfft::{num_complex::Complex, FftPlanner};
use std::borrow::Borrow;

/// Single-sided spectrum of the ROI-integrated intensity
#[derive(Debug, Clone, PartialEq)]
pub struct RoiSpectrum {
    /// Non-negative frequencies, `N/2` entries
    pub freqs: Vec<f64>,

    /// `2/N · |X[k]|` for each entry of `freqs`
    pub power: Vec<f64>,

    /// Strongest component, ignoring 0 Hz
    pub dominant_frequency: f64,
    pub dominant_power: f64,
}

/// Spectrum of the integrated ROI intensity over the whole sequence.
///
/// Used to estimate the modulation frequency from the data itself.
pub fn roi_spectrum<F: Borrow<Frame>>(frames: &[F], roi: &Roi, frame_rate: f64) -> Result<RoiSpectrum> {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(AcquisitionError::InvalidParameter(format!(
            "frame rate must be positive, got {}",
            frame_rate
        )));
    }
    let n = frames.len();
    if n / 2 < 2 {
        return Err(AcquisitionError::InvalidParameter(format!(
            "need at least 4 frames for a spectrum, got {}",
            n
        )));
    }

    let integrated = integrate_roi(frames, roi)?;
    let mut buffer: Vec<Complex<f64>> = integrated.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let half = n / 2;
    let freqs = fft_frequencies(n, frame_rate)[..half].to_vec();
    let power: Vec<f64> = buffer[..half]
        .iter()
        .map(|v| 2.0 / n as f64 * v.norm())
        .collect();

    let mut dominant = 1;
    for k in 2..half {
        if power[k] > power[dominant] {
            dominant = k;
        }
    }

    Ok(RoiSpectrum {
        dominant_frequency: freqs[dominant],
        dominant_power: power[dominant],
        freqs,
        power,
    })
}

/// Longest segment of a spectrogram, in frames
pub const SPECTROGRAM_SEGMENT: usize = 256;

/// Short-time spectrum of the ROI-integrated intensity
#[derive(Debug, Clone, PartialEq)]
pub struct RoiSpectrogram {
    /// Non-negative frequencies, `segment/2 + 1` entries
    pub freqs: Vec<f64>,

    /// Segment centres in seconds
    pub times: Vec<f64>,

    /// One complex spectrum per segment, indexed like `freqs`
    pub segments: Vec<Vec<Complex<f64>>>,
}

impl RoiSpectrogram {
    /// Frequency of the strongest non-DC component of segment `index`
    pub fn dominant_frequency(&self, index: usize) -> Option<f64> {
        let segment = self.segments.get(index)?;
        (1..segment.len())
            .max_by(|&a, &b| segment[a].norm().total_cmp(&segment[b].norm()))
            .map(|k| self.freqs[k])
    }
}

/// Spectrogram of the integrated ROI intensity.
///
/// Segments are `SPECTROGRAM_SEGMENT` frames long (or the whole sequence
/// when shorter) and start `segment - overlap` frames apart. Each segment
/// has its mean removed and is tapered with a periodic Tukey window
/// (α = 0.25); values are density-scaled complex spectra.
pub fn roi_spectrogram<F: Borrow<Frame>>(
    frames: &[F],
    roi: &Roi,
    frame_rate: f64,
    overlap: usize,
) -> Result<RoiSpectrogram> {
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(AcquisitionError::InvalidParameter(format!(
            "frame rate must be positive, got {}",
            frame_rate
        )));
    }
    let n = frames.len();
    let segment = n.min(SPECTROGRAM_SEGMENT);
    if segment < 2 {
        return Err(AcquisitionError::InvalidParameter(format!(
            "need at least 2 frames for a spectrogram, got {}",
            n
        )));
    }
    if overlap >= segment {
        return Err(AcquisitionError::InvalidParameter(format!(
            "overlap {} must be shorter than the {} frame segment",
            overlap, segment
        )));
    }

    let integrated = integrate_roi(frames, roi)?;
    let window = tukey_periodic(segment, 0.25);
    let scale = (1.0 / (frame_rate * window.iter().map(|w| w * w).sum::<f64>())).sqrt();
    let step = segment - overlap;
    let count = (n - overlap) / step;
    let bins = segment / 2 + 1;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(segment);
    let mut buffer = vec![Complex::new(0.0, 0.0); segment];
    let mut times = Vec::with_capacity(count);
    let mut segments = Vec::with_capacity(count);

    for i in 0..count {
        let start = i * step;
        let samples = &integrated[start..start + segment];
        let mean = samples.iter().sum::<f64>() / segment as f64;
        for (slot, (value, w)) in buffer.iter_mut().zip(samples.iter().zip(&window)) {
            *slot = Complex::new((value - mean) * w, 0.0);
        }
        fft.process(&mut buffer);

        segments.push(buffer[..bins].iter().map(|v| *v * scale).collect());
        times.push((segment / 2 + start) as f64 / frame_rate);
    }

    Ok(RoiSpectrogram {
        freqs: (0..bins)
            .map(|k| k as f64 * frame_rate / segment as f64)
            .collect(),
        times,
        segments,
    })
}

/// Tukey window of length `len` for spectral analysis: the symmetric window
/// of `len + 1` points without its last sample
fn tukey_periodic(len: usize, alpha: f64) -> Vec<f64> {
    let m = len + 1;
    let span = (m - 1) as f64;
    let width = (alpha * span / 2.0).floor() as usize;
    let mut window: Vec<f64> = (0..m)
        .map(|i| {
            let x = i as f64;
            if i <= width {
                0.5 * (1.0 + (std::f64::consts::PI * (-1.0 + 2.0 * x / (alpha * span))).cos())
            } else if i >= m - width - 1 {
                0.5 * (1.0
                    + (std::f64::consts::PI * (-2.0 / alpha + 1.0 + 2.0 * x / (alpha * span))).cos())
            } else {
                1.0
            }
        })
        .collect();
    window.truncate(len);
    window
}
