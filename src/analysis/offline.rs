use super::harmonic::HarmonicAnalyzer;
use crate::core::{Frame, Result};
use crate::sink::ResultSink;
use std::borrow::Borrow;

/// Windowed harmonic extraction over a complete recording.
///
/// The window count is known up front, so the sink is pre-sized.
pub fn analyze_recording<F: Borrow<Frame>>(
    frames: &[F],
    frame_rate: f64,
    frequency: f64,
    min_cycles: usize,
) -> Result<ResultSink> {
    let analyzer = HarmonicAnalyzer::new(frequency, min_cycles, frame_rate)?;
    let expected = analyzer.plan().window_count(frames.len());
    log::info!(
        "Offline analysis: {} frames, {} windows of {} frames at {:.3} Hz",
        frames.len(),
        expected,
        analyzer.plan().cycle_frames,
        analyzer.plan().target_frequency()
    );

    let sink = ResultSink::with_capacity(expected);
    let result = analyzer.analyze(frames)?;
    sink.append(result)?;
    Ok(sink)
}
