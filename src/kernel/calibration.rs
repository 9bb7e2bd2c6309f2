use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::cancel::RunState;
use crate::config::CalibrationConfig;
use crate::error::{CalibrationError, ConfigError};
use crate::render::{CountdownCue, RenderSink};
use crate::signal::LatestCell;

pub const SMILING_AVERAGE: &str = "smiling_average";
pub const BASELINE_AVERAGE: &str = "baseline_average";

/// Named reference voltages (mV) measured for one subject.
///
/// Written once by calibration and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationCriteria {
    references: BTreeMap<String, f64>,
}

impl CalibrationCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.references.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.references.get(key).copied()
    }

    pub fn require(&self, key: &str) -> Result<f64, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingReference(key.to_string()))
    }

    pub fn smiling_average(&self) -> Option<f64> {
        self.get(SMILING_AVERAGE)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Which facial state a measurement window captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Smiling,
    Baseline,
}

impl Reference {
    pub fn key(self) -> &'static str {
        match self {
            Reference::Smiling => SMILING_AVERAGE,
            Reference::Baseline => BASELINE_AVERAGE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Reference::Smiling => "smiling",
            Reference::Baseline => "baseline",
        }
    }

    fn instruction(self, window: Duration) -> String {
        let secs = window.as_secs_f64();
        match self {
            Reference::Smiling => format!("Please keep smiling for {} seconds.", secs),
            Reference::Baseline => format!("Please relax your face for {} seconds.", secs),
        }
    }
}

/// `(elapsed seconds, smoothed mV)` pairs from one measurement window.
#[derive(Debug, Clone, Default)]
pub struct CalibrationRecording {
    pub label: String,
    samples: Vec<(f64, f64)>,
}

impl CalibrationRecording {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, elapsed_secs: f64, value: f64) {
        self.samples.push((elapsed_secs, value));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|&(_, v)| v).sum();
        Some(sum / self.samples.len() as f64)
    }

    /// Two-column `time,value` CSV for offline inspection.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["time", "value"])?;
        for (t, v) in &self.samples {
            wtr.write_record([t.to_string(), v.to_string()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Guided, one-shot measurement of the subject's reference levels.
///
/// Every wait observes the run state, so a shutdown during calibration ends
/// it with [`CalibrationError::Cancelled`].
pub struct CalibrationController {
    config: CalibrationConfig,
    run: RunState,
}

impl CalibrationController {
    pub fn new(config: CalibrationConfig, run: RunState) -> Self {
        Self { config, run }
    }

    async fn pause(&self, duration: Duration) -> Result<(), CalibrationError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.run.stopped() => Err(CalibrationError::Cancelled),
        }
    }

    /// Polls until the sampler has published a first smoothed value.
    pub async fn wait_for_signal(&self, latest: &LatestCell) -> Result<f64, CalibrationError> {
        let mut announced = false;
        loop {
            if let Some(value) = latest.latest() {
                return Ok(value);
            }
            if !announced {
                debug!("Waiting for the first EMG sample");
                announced = true;
            }
            self.pause(self.config.poll_interval()).await?;
        }
    }

    /// Lead-in prompt, a descending count, then "Go". Measures nothing.
    pub async fn countdown<S>(&self, reference: Reference, sink: &mut S) -> Result<(), CalibrationError>
    where
        S: RenderSink + ?Sized,
    {
        sink.cue(&CountdownCue::Prompt {
            title: "Measurement".to_string(),
            description: reference.instruction(self.config.measure_window()),
        });
        self.pause(self.config.lead_in()).await?;

        for n in (1..=self.config.countdown_from).rev() {
            sink.cue(&CountdownCue::Count(n));
            self.pause(self.config.countdown_step()).await?;
        }

        sink.cue(&CountdownCue::Go);
        self.pause(self.config.go_hold()).await?;
        sink.cue(&CountdownCue::Clear);
        Ok(())
    }

    /// Samples the latest smoothed value at a fixed interval for the whole window.
    pub async fn measure(
        &self,
        reference: Reference,
        latest: &LatestCell,
    ) -> Result<CalibrationRecording, CalibrationError> {
        let window = self.config.measure_window();
        let mut recording = CalibrationRecording::new(reference.label());
        let started = Instant::now();

        while started.elapsed() < window {
            if let Some(value) = latest.latest() {
                recording.push(started.elapsed().as_secs_f64(), value);
            }
            self.pause(self.config.poll_interval()).await?;
        }
        Ok(recording)
    }

    /// Mean of the window. Too few samples is an error, never a NaN.
    pub fn summarize(&self, recording: &CalibrationRecording) -> Result<f64, CalibrationError> {
        let min = self.config.min_samples.max(1);
        match recording.mean() {
            Some(mean) if recording.len() >= min => Ok(mean),
            _ => Err(CalibrationError::InsufficientSamples {
                got: recording.len(),
                min,
            }),
        }
    }

    fn log_recording(&self, recording: &CalibrationRecording) -> Result<Option<PathBuf>, CalibrationError> {
        let Some(dir) = &self.config.log_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = dir.join(format!("{}_{}.csv", stamp, recording.label));
        recording.write_csv(&path)?;
        Ok(Some(path))
    }

    /// Countdown, measure, summarize one reference.
    pub async fn calibrate_reference<S>(
        &self,
        reference: Reference,
        latest: &LatestCell,
        sink: &mut S,
    ) -> Result<f64, CalibrationError>
    where
        S: RenderSink + ?Sized,
    {
        self.wait_for_signal(latest).await?;
        self.countdown(reference, sink).await?;

        info!("Measuring {} level", reference.label());
        let recording = self.measure(reference, latest).await?;
        if let Some(path) = self.log_recording(&recording)? {
            info!("Calibration window written to {}", path.display());
        }

        let mean = self.summarize(&recording)?;
        info!(
            "{} average: {:.5} mV ({} samples)",
            reference.label(),
            mean,
            recording.len()
        );
        Ok(mean)
    }

    /// The full procedure: an optional baseline window, then the smiling window.
    pub async fn calibrate<S>(
        &self,
        latest: &LatestCell,
        sink: &mut S,
    ) -> Result<CalibrationCriteria, CalibrationError>
    where
        S: RenderSink + ?Sized,
    {
        let mut criteria = CalibrationCriteria::new();
        if self.config.measure_baseline {
            let baseline = self.calibrate_reference(Reference::Baseline, latest, sink).await?;
            criteria.insert(BASELINE_AVERAGE, baseline);
        }
        let smiling = self.calibrate_reference(Reference::Smiling, latest, sink).await?;
        criteria.insert(SMILING_AVERAGE, smiling);
        Ok(criteria)
    }
}
