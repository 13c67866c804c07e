pub mod harmonic;
pub mod offline;
pub mod roi;
pub mod spectrum;

pub use harmonic::{fft_frequencies, nearest_bin, HarmonicAnalyzer, HarmonicResult, WindowPlan};
pub use offline::analyze_recording;
pub use roi::{integrate_roi, Roi};
pub use spectrum::{roi_spectrogram, roi_spectrum, RoiSpectrogram, RoiSpectrum, SPECTROGRAM_SEGMENT};
