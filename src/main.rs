use framelock::analysis::{roi_spectrum, Roi};
use framelock::config::SessionConfig;
use framelock::engine::{AcquisitionKernel, AnalysisScheduler};
use framelock::hal::mock::SimulatedCamera;
use framelock::hal::FrameSource;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Framelock - Live Harmonic Analysis Demo");
    println!("=======================================\n");

    let mut config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(&path).await?,
        None => SessionConfig::default(),
    };
    // keep the demo short
    config.analysis_interval_ms = config.analysis_interval_ms.min(1_000);

    let mut camera = SimulatedCamera::new();
    camera.configure(serde_json::json!({
        "width": 32,
        "height": 24,
        "frame_rate": 100.0,
        "modulation_hz": config.frequency_hz,
        "phase_step": 0.1,
    }))?;
    let info = camera.info();
    println!(
        "Source: {} ({}x{}, {:?})",
        info.id, info.width, info.height, info.format
    );

    let kernel = Arc::new(AcquisitionKernel::new(config.clone(), Box::new(camera))?);
    kernel.start_acquisition()?;

    let scheduler = AnalysisScheduler::spawn(
        kernel.clone(),
        config.analysis_interval(),
        config.frequency_hz,
        config.min_cycles,
    );

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(750)).await;
        if let Some(frame) = kernel.get_latest_frame() {
            println!(
                "Latest frame #{} at {:.3}s, {} windows so far",
                frame.sequence,
                frame.timestamp_us as f64 / 1e6,
                kernel.sink().len()
            );
        }
    }

    let report = scheduler.shutdown().await;
    let rate = kernel.get_rate_stats();
    kernel.stop_acquisition()?;
    println!(
        "\nScheduler: {} cycles, {} windows, {} skipped, {} errors",
        report.cycles, report.windows, report.skipped, report.errors
    );

    let residual = kernel.store().snapshot();
    if let Some(rate) = rate {
        let roi = Roi::full(info.width, info.height);
        match roi_spectrum(&residual, &roi, rate.mean) {
            Ok(spectrum) => println!(
                "Dominant frequency in residual frames: {:.2} Hz",
                spectrum.dominant_frequency
            ),
            Err(e) => println!("No spectrum for residual frames: {}", e),
        }
    }

    let windows = kernel.flush()?;
    println!("Saved {} windows to {:?}\n", windows, config.output_path);
    println!("{}", kernel.monitor().generate_report());

    Ok(())
}
