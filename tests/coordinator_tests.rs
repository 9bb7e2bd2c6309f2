use smilecomb::config::{CalibrationConfig, LayoutKind, PipelineConfig};
use smilecomb::device::{ring_device, SyntheticEmg, ANALOG_CHANNELS};
use smilecomb::error::{DeviceError, PipelineError};
use smilecomb::kernel::calibration::{CalibrationCriteria, SMILING_AVERAGE};
use smilecomb::kernel::cancel::RunState;
use smilecomb::render::{CountdownCue, RenderFrame, RenderSink};
use smilecomb::{Coordinator, SessionReport, Termination};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct SharedSink {
    cues: Arc<Mutex<Vec<CountdownCue>>>,
    frames: Arc<Mutex<Vec<RenderFrame>>>,
}

impl RenderSink for SharedSink {
    fn cue(&mut self, cue: &CountdownCue) {
        self.cues.lock().unwrap().push(cue.clone());
    }

    fn frame(&mut self, frame: &RenderFrame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}

/// Default acquisition (100-frame batches) with short loop and calibration timings.
fn fast_config() -> PipelineConfig {
    PipelineConfig {
        layout: LayoutKind::Compact,
        skin_seed: Some(3),
        field_update_interval_ms: 5,
        render_interval_ms: 5,
        idle_anim_interval_ms: 50,
        calibration: CalibrationConfig {
            lead_in_ms: 200,
            countdown_from: 2,
            countdown_step_ms: 20,
            go_hold_ms: 20,
            measure_ms: 300,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Criteria low enough that any smile burst counts.
fn easy_criteria() -> CalibrationCriteria {
    let mut criteria = CalibrationCriteria::new();
    criteria.insert(SMILING_AVERAGE, 0.05);
    criteria
}

/// Criteria no synthetic signal can reach.
fn unreachable_criteria() -> CalibrationCriteria {
    let mut criteria = CalibrationCriteria::new();
    criteria.insert(SMILING_AVERAGE, 100.0);
    criteria
}

/// Where the synthetic source takes its stop signal from.
#[derive(Clone, Copy)]
enum SourceRun {
    /// Stopped after the session returns.
    Own,
    /// The coordinator's run state, so the source vanishes mid-read on shutdown.
    Session,
}

async fn run_session<Q>(
    coordinator: Coordinator,
    smiling: bool,
    source: SourceRun,
    sink: SharedSink,
    quit: Q,
) -> Result<SessionReport, PipelineError>
where
    Q: Future<Output = ()>,
{
    let (device, feeder) = ring_device(8192);
    let sim = SyntheticEmg::new(feeder).with_seed(11);
    sim.smile_switch().set(smiling);

    let own = RunState::new();
    let run = match source {
        SourceRun::Own => own.clone(),
        SourceRun::Session => coordinator.run_state(),
    };
    let generator = sim.spawn(1000, run);

    let result = tokio::time::timeout(
        Duration::from_secs(20),
        coordinator.run(Box::new(device), sink, quit),
    )
    .await
    .expect("session did not finish");

    own.stop();
    generator.join().unwrap();
    result
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_steady_smile_completes_the_field() {
    let coordinator = Coordinator::new(fast_config()).with_criteria(easy_criteria());
    let sink = SharedSink::default();

    let report = run_session(
        coordinator,
        true,
        SourceRun::Own,
        sink.clone(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(report.termination, Termination::FieldComplete);
    assert_eq!(report.active_count, 36);
    assert_eq!(report.capacity, 36);
    assert!(report.summary.completed_at.is_some());
    assert!(report.summary.cell_activations >= 36);
    assert!(report.summary.smiles >= 1);

    let frames = sink.frames.lock().unwrap();
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|f| f.active_count <= f.capacity && f.cells.len() == 37));
    assert!(frames.iter().all(|f| (0.0..=1.0).contains(&f.gauge)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_quit_ends_steady_state() {
    let coordinator = Coordinator::new(fast_config()).with_criteria(unreachable_criteria());
    let frames = coordinator.subscribe();
    let sink = SharedSink::default();

    let report = run_session(
        coordinator,
        false,
        SourceRun::Own,
        sink.clone(),
        tokio::time::sleep(Duration::from_millis(350)),
    )
    .await
    .unwrap();

    assert_eq!(report.termination, Termination::Quit);
    assert_eq!(report.active_count, 0);
    assert_eq!(report.summary.cell_activations, 0);
    assert!(report.field_ticks > 0);
    assert!(report.sampler_ticks > 0);
    // Stored criteria skip the countdown entirely.
    assert!(sink.cues.lock().unwrap().is_empty());

    let last = frames.borrow().clone();
    assert_eq!(last.capacity, 36);
    assert_eq!(last.cells.len(), 37);
    assert!(!last.smiling);
    assert!(last.emg.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_quit_during_calibration() {
    let config = PipelineConfig {
        calibration: CalibrationConfig::default(),
        ..fast_config()
    };
    let report = run_session(
        Coordinator::new(config),
        false,
        SourceRun::Own,
        SharedSink::default(),
        tokio::time::sleep(Duration::from_millis(200)),
    )
    .await
    .unwrap();

    assert_eq!(report.termination, Termination::Quit);
    assert!(report.criteria.is_none());
    assert_eq!(report.field_ticks, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fresh_calibration_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("criteria.json");
    let config = PipelineConfig {
        criteria_path: Some(path.clone()),
        ..fast_config()
    };
    let sink = SharedSink::default();

    // Calibration takes about 560ms here; quit well after it.
    let report = run_session(
        Coordinator::new(config),
        true,
        SourceRun::Own,
        sink.clone(),
        tokio::time::sleep(Duration::from_millis(1_200)),
    )
    .await
    .unwrap();

    let criteria = report.criteria.clone().expect("calibration finished");
    assert!(criteria.smiling_average().unwrap() > 0.0);
    assert_eq!(CalibrationCriteria::load(&path).unwrap(), criteria);

    let cues = sink.cues.lock().unwrap();
    assert_eq!(cues.iter().filter(|c| matches!(c, CountdownCue::Count(_))).count(), 2);
    assert_eq!(cues.last(), Some(&CountdownCue::Clear));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_with_vanishing_source_is_clean() {
    for round in 0..5 {
        let report = run_session(
            Coordinator::new(fast_config()).with_criteria(unreachable_criteria()),
            false,
            SourceRun::Session,
            SharedSink::default(),
            tokio::time::sleep(Duration::from_millis(350)),
        )
        .await
        .unwrap_or_else(|e| panic!("round {}: quit reported {}", round, e));
        assert_eq!(report.termination, Termination::Quit);

        let config = PipelineConfig {
            calibration: CalibrationConfig::default(),
            ..fast_config()
        };
        let report = run_session(
            Coordinator::new(config),
            false,
            SourceRun::Session,
            SharedSink::default(),
            tokio::time::sleep(Duration::from_millis(250)),
        )
        .await
        .unwrap_or_else(|e| panic!("round {}: calibration quit reported {}", round, e));
        assert_eq!(report.termination, Termination::Quit);

        let report = run_session(
            Coordinator::new(fast_config()).with_criteria(easy_criteria()),
            true,
            SourceRun::Session,
            SharedSink::default(),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_or_else(|e| panic!("round {}: completion reported {}", round, e));
        assert_eq!(report.termination, Termination::FieldComplete);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lost_device_ends_session_with_error() {
    let (device, mut feeder) = ring_device(1024);
    feeder.push_repeated([512; ANALOG_CHANNELS], 50);
    drop(feeder);

    let coordinator = Coordinator::new(fast_config());
    let run = coordinator.run_state();
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        coordinator.run(Box::new(device), SharedSink::default(), std::future::pending::<()>()),
    )
    .await
    .expect("session did not finish");

    assert!(matches!(result, Err(PipelineError::Device(DeviceError::Disconnected))));
    assert!(run.is_stopped());
}

#[tokio::test]
async fn test_bad_channel_fails_before_sampling() {
    let config = PipelineConfig {
        emg_channel: 7,
        ..fast_config()
    };
    let (device, _feeder) = ring_device(64);
    let result = Coordinator::new(config)
        .run(Box::new(device), SharedSink::default(), std::future::pending::<()>())
        .await;
    assert!(matches!(result, Err(PipelineError::Device(DeviceError::InvalidChannel(7)))));
}
