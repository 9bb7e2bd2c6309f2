use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::calibration::{CalibrationController, CalibrationCriteria, SMILING_AVERAGE};
use super::cancel::RunState;
use super::detector::{EdgeDetector, SmileDetector, SmileEdge};
use super::honeycomb::{FieldStep, HoneycombField};
use super::sampler::{Sampler, SignalStreams};
use super::telemetry::{SessionEvent, SessionSummary, SessionTelemetry, Tick};
use crate::config::PipelineConfig;
use crate::device::Device;
use crate::error::{DeviceError, PipelineError};
use crate::render::{RenderFrame, RenderSink};
use crate::signal::LatestCell;

type SamplerTask = JoinHandle<(Sampler, Result<u64, DeviceError>)>;

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// The quit signal fired.
    Quit,
    /// Every cell was grown.
    FieldComplete,
    /// The run state was stopped from outside.
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub termination: Termination,
    /// `None` when the session ended before calibration finished.
    pub criteria: Option<CalibrationCriteria>,
    pub field_ticks: u64,
    pub sampler_ticks: u64,
    pub active_count: usize,
    pub capacity: usize,
    pub summary: SessionSummary,
}

/// Owns the run state and drives one session: sampler, calibration, then the
/// field-update and render loops, until quit, completion, or a device failure.
pub struct Coordinator {
    config: PipelineConfig,
    run: RunState,
    criteria: Option<CalibrationCriteria>,
    frames: watch::Sender<RenderFrame>,
}

impl Coordinator {
    pub fn new(config: PipelineConfig) -> Self {
        let (frames, _) = watch::channel(RenderFrame::default());
        Self {
            config,
            run: RunState::new(),
            criteria: None,
            frames,
        }
    }

    /// Skip calibration and use stored references.
    pub fn with_criteria(mut self, criteria: CalibrationCriteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn run_state(&self) -> RunState {
        self.run.clone()
    }

    /// Latest packaged frame, updated by the render loop.
    pub fn subscribe(&self) -> watch::Receiver<RenderFrame> {
        self.frames.subscribe()
    }

    /// Runs a session on an unstarted `device`. Every spawned loop has exited
    /// and the device is stopped by the time this returns, on every path.
    pub async fn run<S, Q>(
        self,
        mut device: Box<dyn Device>,
        mut sink: S,
        quit: Q,
    ) -> Result<SessionReport, PipelineError>
    where
        S: RenderSink + 'static,
        Q: Future<Output = ()>,
    {
        let Coordinator {
            config,
            run,
            criteria,
            frames,
        } = self;

        let field = HoneycombField::new(&config.layout.layout(), &config.geometry(), config.skin_seed)?;
        let capacity = field.capacity();
        device.start(config.sampling_rate_hz, &[config.acc_channel, config.emg_channel])?;

        let streams = SignalStreams::new(config.history_capacity);
        let mut sampler = Sampler::new(device, &config, streams.clone());
        let sampler_run = run.clone();
        let mut sampler_task: SamplerTask = tokio::task::spawn_blocking(move || {
            let result = sampler.run(&sampler_run);
            if result.is_err() {
                sampler_run.stop();
            }
            (sampler, result)
        });

        tokio::pin!(quit);

        // === Calibration ===
        let fresh = criteria.is_none();
        let calibration = match criteria {
            Some(stored) => {
                info!("Using stored calibration");
                Some(Ok(stored))
            }
            None => {
                let controller = CalibrationController::new(config.calibration.clone(), run.clone());
                tokio::select! {
                    res = controller.calibrate(&streams.latest_smoothed, &mut sink) => Some(res),
                    _ = &mut quit => None,
                }
            }
        };

        let criteria = match calibration {
            Some(Ok(criteria)) => criteria,
            Some(Err(e)) => {
                stop_sampler(&run, sampler_task).await?;
                return Err(e.into());
            }
            None => {
                info!("Quit during calibration");
                let sampler_ticks = stop_sampler(&run, sampler_task).await?;
                return Ok(SessionReport {
                    termination: Termination::Quit,
                    criteria: None,
                    field_ticks: 0,
                    sampler_ticks,
                    active_count: 0,
                    capacity,
                    summary: SessionSummary::default(),
                });
            }
        };

        let smiling_average = match criteria.require(SMILING_AVERAGE) {
            Ok(avg) => avg,
            Err(e) => {
                stop_sampler(&run, sampler_task).await?;
                return Err(e.into());
            }
        };
        if fresh {
            if let Some(path) = &config.criteria_path {
                match criteria.save(path) {
                    Ok(()) => info!("Calibration saved to {}", path.display()),
                    Err(e) => warn!("Could not save calibration: {}", e),
                }
            }
        }

        // === Steady state ===
        let detector = SmileDetector::new(smiling_average, config.detection_threshold_ratio);
        info!(
            "Detection threshold {:.5} mV ({} x {:.5} mV)",
            detector.threshold(),
            config.detection_threshold_ratio,
            smiling_average
        );

        let field = Arc::new(RwLock::new(field));
        let smiling = Arc::new(AtomicBool::new(false));

        let mut field_task = tokio::spawn(field_loop(FieldLoop {
            field: Arc::clone(&field),
            detector,
            latest: streams.latest_smoothed.clone(),
            smiling: Arc::clone(&smiling),
            interval: config.field_update_interval(),
            run: run.clone(),
        }));
        let render_task = tokio::spawn(render_loop(
            sink,
            RenderLoop {
                field: Arc::clone(&field),
                detector,
                latest: streams.latest_display.clone(),
                smiling,
                frames,
                interval: config.render_interval(),
                idle_interval: config.idle_anim_interval(),
                started: Instant::now(),
                run: run.clone(),
            },
        ));

        let mut field_done = None;
        let mut sampler_done = None;
        let quit_requested = tokio::select! {
            _ = &mut quit => true,
            res = &mut field_task => { field_done = Some(res); false }
            res = &mut sampler_task => { sampler_done = Some(res); false }
        };

        // === Shutdown: stop everyone, then join everyone ===
        run.stop();
        let field_joined = match field_done {
            Some(res) => res,
            None => field_task.await,
        };
        let render_joined = render_task.await;
        let sampler_joined = match sampler_done {
            Some(res) => res,
            None => sampler_task.await,
        };

        let sampler_ticks = finish_sampler(sampler_joined)?;
        let exit = field_joined.map_err(|_| PipelineError::TaskPanicked("field update"))?;
        render_joined.map_err(|_| PipelineError::TaskPanicked("render"))?;

        let termination = if exit.completed {
            Termination::FieldComplete
        } else if quit_requested {
            Termination::Quit
        } else {
            Termination::Stopped
        };
        let active_count = field.read().unwrap_or_else(PoisonError::into_inner).active_count();
        info!(
            "Session ended ({:?}): {}/{} cells after {} ticks",
            termination, active_count, capacity, exit.ticks
        );

        Ok(SessionReport {
            termination,
            criteria: Some(criteria),
            field_ticks: exit.ticks,
            sampler_ticks,
            active_count,
            capacity,
            summary: exit.telemetry.summary(),
        })
    }
}

/// Stops the run, joins the sampler, stops the device. A device failure
/// outranks whatever made the caller stop.
async fn stop_sampler(run: &RunState, task: SamplerTask) -> Result<u64, PipelineError> {
    run.stop();
    finish_sampler(task.await)
}

fn finish_sampler(
    joined: Result<(Sampler, Result<u64, DeviceError>), JoinError>,
) -> Result<u64, PipelineError> {
    let (sampler, result) = joined.map_err(|_| PipelineError::TaskPanicked("sampler"))?;
    drop(sampler.into_device());
    Ok(result?)
}

struct FieldLoop {
    field: Arc<RwLock<HoneycombField>>,
    detector: SmileDetector,
    latest: LatestCell,
    smiling: Arc<AtomicBool>,
    interval: Duration,
    run: RunState,
}

struct FieldExit {
    ticks: u64,
    completed: bool,
    telemetry: SessionTelemetry,
}

/// Sole mutator of the field. One growth or shrink step per tick at most.
async fn field_loop(ctx: FieldLoop) -> FieldExit {
    let mut cadence = tokio::time::interval(ctx.interval);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut edges = EdgeDetector::default();
    let mut telemetry = SessionTelemetry::new();
    let mut tick = Tick::new();
    let mut completed = false;

    loop {
        tokio::select! {
            _ = cadence.tick() => {}
            _ = ctx.run.stopped() => break,
        }
        tick = tick.next();

        // Not ready yet; the sampler has not published anything.
        let Some(emg) = ctx.latest.latest() else {
            continue;
        };

        match edges.update(ctx.detector.is_smiling(emg)) {
            Some(SmileEdge::Started) => {
                info!("Smile! ({:.5} mV)", emg);
                telemetry.record(SessionEvent::SmileStarted { tick, emg });
            }
            Some(SmileEdge::Stopped) => {
                info!("No smile... ({:.5} mV)", emg);
                telemetry.record(SessionEvent::SmileStopped { tick, emg });
            }
            None => {}
        }
        ctx.smiling.store(edges.is_smiling(), Ordering::Relaxed);

        let mut field = ctx.field.write().unwrap_or_else(PoisonError::into_inner);
        match field.step(edges.is_smiling()) {
            FieldStep::Grew(index) => {
                debug!("Cell {} grown ({}/{})", index, field.active_count(), field.capacity());
                telemetry.record(SessionEvent::CellActivated { tick, index });
            }
            FieldStep::Shrank(index) => {
                debug!("Cell {} withdrawn ({}/{})", index, field.active_count(), field.capacity());
                telemetry.record(SessionEvent::CellDeactivated { tick, index });
            }
            FieldStep::Unchanged => {}
        }

        if field.is_complete() {
            info!("Field fully grown after {} ticks", tick.frame);
            telemetry.record(SessionEvent::FieldComplete { tick });
            completed = true;
            break;
        }
    }

    FieldExit {
        ticks: tick.frame,
        completed,
        telemetry,
    }
}

struct RenderLoop {
    field: Arc<RwLock<HoneycombField>>,
    detector: SmileDetector,
    latest: LatestCell,
    smiling: Arc<AtomicBool>,
    frames: watch::Sender<RenderFrame>,
    interval: Duration,
    idle_interval: Duration,
    started: Instant,
    run: RunState,
}

/// Packages the latest detector and field state for the render sink. Reads only.
async fn render_loop<S: RenderSink>(mut sink: S, ctx: RenderLoop) {
    let mut cadence = tokio::time::interval(ctx.interval);
    cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cadence.tick() => {}
            _ = ctx.run.stopped() => break,
        }

        let emg = ctx.latest.latest();
        let frame = {
            let field = ctx.field.read().unwrap_or_else(PoisonError::into_inner);
            RenderFrame {
                emg,
                gauge: emg.map(|v| ctx.detector.gauge(v)).unwrap_or(0.0),
                threshold_mark: ctx.detector.threshold_mark(),
                smiling: ctx.smiling.load(Ordering::Relaxed),
                active_count: field.active_count(),
                capacity: field.capacity(),
                cells: field.snapshot(ctx.started.elapsed(), ctx.idle_interval),
            }
        };
        sink.frame(&frame);
        ctx.frames.send_replace(frame);
    }
    debug!("Render loop exiting");
}
