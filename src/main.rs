use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use smilecomb::device::{self, SmileSwitch};
use smilecomb::kernel::calibration::CalibrationCriteria;
use smilecomb::kernel::cancel::RunState;
use smilecomb::render::LogRenderer;
use smilecomb::{Coordinator, PipelineConfig};

/// Drives the simulated face: smile through calibration, then alternate
/// between smiling and resting so the field grows and shrinks.
async fn script_smiles(smile: SmileSwitch, config: PipelineConfig, run: RunState) {
    let cal = &config.calibration;
    let calibration_span = cal.lead_in()
        + cal.countdown_step() * cal.countdown_from
        + cal.go_hold()
        + cal.measure_window();
    let grow = config.field_update_interval() * 12;
    let rest = config.field_update_interval() * 5;

    smile.set(true);
    let mut phase = calibration_span + Duration::from_secs(2);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(phase) => {}
            _ = run.stopped() => break,
        }
        let smiling = !smile.get();
        smile.set(smiling);
        phase = if smiling { grow } else { rest };
    }
}

async fn session(config: PipelineConfig) -> Result<()> {
    let stored = match &config.criteria_path {
        Some(path) if path.exists() => Some(
            CalibrationCriteria::load(path)
                .with_context(|| format!("loading calibration from {}", path.display()))?,
        ),
        _ => None,
    };

    let conn = device::connect_with_retry(
        &config.device_id,
        config.connect_attempts,
        config.connect_backoff(),
    )
    .await
    .context("connecting to the sensor")?;

    let mut coordinator = Coordinator::new(config.clone());
    if let Some(criteria) = stored {
        coordinator = coordinator.with_criteria(criteria);
    }
    // Stopped only once the session has returned.
    let sim_run = RunState::new();

    let mut generator = None;
    if let Some(sim) = conn.simulator {
        let sim = sim
            .with_channels(config.acc_channel, config.emg_channel)
            .with_bit_depth(config.bit_depth);
        tokio::spawn(script_smiles(sim.smile_switch(), config.clone(), sim_run.clone()));
        generator = Some(sim.spawn(config.sampling_rate_hz, sim_run.clone()));
    }

    let quit = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Quit requested");
    };

    info!("Session starting on '{}'. Press Ctrl+C to stop.", config.device_id);
    let outcome = coordinator.run(conn.device, LogRenderer::new(), quit).await;

    sim_run.stop();
    if let Some(handle) = generator {
        if handle.join().is_err() {
            warn!("Simulator thread panicked");
        }
    }

    let report = outcome?;
    info!(
        "Finished ({:?}): {}/{} cells, {} smiles, peak {}",
        report.termination,
        report.active_count,
        report.capacity,
        report.summary.smiles,
        report.summary.peak_active
    );
    info!("Report: {}", serde_json::to_string(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", e);
    }

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => PipelineConfig::load(&path).with_context(|| format!("loading {}", path.display())),
        None => {
            let config = PipelineConfig::default();
            config.validate().map(|_| config).context("default config")
        }
    };

    let result = match config {
        Ok(config) => session(config).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
