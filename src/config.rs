use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::ANALOG_CHANNELS;
use crate::error::ConfigError;
use crate::kernel::layout::{FieldLayout, HexGeometry, Point};
use crate::signal::Conditioner;

/// Which static honeycomb grid to grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// 11x11 grid, 90 cells around the base.
    Full,
    /// Two rings plus a partial third, 36 cells around the base.
    Compact,
}

impl LayoutKind {
    pub fn layout(self) -> FieldLayout {
        match self {
            LayoutKind::Full => FieldLayout::full(),
            LayoutKind::Compact => FieldLayout::compact(),
        }
    }
}

/// Timing of the guided calibration procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub lead_in_ms: u64,
    pub countdown_from: u32,
    pub countdown_step_ms: u64,
    pub go_hold_ms: u64,
    pub measure_ms: u64,
    pub poll_interval_ms: u64,
    /// Fewer recorded values than this fail the calibration instead of
    /// producing a meaningless mean.
    pub min_samples: usize,
    /// Also measure a relaxed-face reference before the smiling one.
    pub measure_baseline: bool,
    /// When set, every measurement window is written here as CSV.
    pub log_dir: Option<PathBuf>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            lead_in_ms: 6_000,
            countdown_from: 4,
            countdown_step_ms: 1_000,
            go_hold_ms: 1_000,
            measure_ms: 5_000,
            poll_interval_ms: 10,
            min_samples: 10,
            measure_baseline: false,
            log_dir: None,
        }
    }
}

impl CalibrationConfig {
    pub fn lead_in(&self) -> Duration {
        Duration::from_millis(self.lead_in_ms)
    }

    pub fn countdown_step(&self) -> Duration {
        Duration::from_millis(self.countdown_step_ms)
    }

    pub fn go_hold(&self) -> Duration {
        Duration::from_millis(self.go_hold_ms)
    }

    pub fn measure_window(&self) -> Duration {
        Duration::from_millis(self.measure_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Fixed parameters of one sensor configuration and session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// MAC address or serial port of the sensor, or `sim` for the built-in simulator.
    pub device_id: String,
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,

    pub sampling_rate_hz: u32,
    pub acc_channel: usize,
    pub emg_channel: usize,
    /// Frames pulled per sampler tick; only the first one is kept.
    pub batch_size: usize,

    pub bit_depth: u32,
    pub reference_voltage: f64,
    pub gain: f64,

    pub history_capacity: usize,
    /// Smoothing of the value that feeds detection.
    pub ema_decay: f64,
    /// Lighter smoothing for the live gauge only.
    pub display_ema_decay: f64,
    pub detection_threshold_ratio: f64,

    pub field_update_interval_ms: u64,
    pub render_interval_ms: u64,
    pub idle_anim_interval_ms: u64,

    pub layout: LayoutKind,
    pub hex_spacing: f64,
    pub cell_size: f64,
    pub screen_center: [f64; 2],
    /// Seed for the active-skin choice. Unseeded sessions vary between runs.
    pub skin_seed: Option<u64>,

    /// Stored calibration. Loaded if present, written after a fresh calibration otherwise.
    pub criteria_path: Option<PathBuf>,
    pub calibration: CalibrationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device_id: "sim".to_string(),
            connect_attempts: 3,
            connect_backoff_ms: 1_000,
            sampling_rate_hz: 1000,
            acc_channel: 0,
            emg_channel: 1,
            batch_size: 100,
            bit_depth: 10,
            reference_voltage: 3.3,
            gain: 1009.0,
            history_capacity: 100,
            ema_decay: 0.925,
            display_ema_decay: 0.8,
            detection_threshold_ratio: 0.8,
            field_update_interval_ms: 500,
            render_interval_ms: 33,
            idle_anim_interval_ms: 1_000,
            layout: LayoutKind::Full,
            hex_spacing: 50.0,
            cell_size: 65.0,
            screen_center: [200.0, 200.0],
            skin_seed: None,
            criteria_path: None,
            calibration: CalibrationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Invalid(reason.to_string()));

        if !(self.ema_decay > 0.0 && self.ema_decay < 1.0) {
            return invalid("ema_decay must lie strictly between 0 and 1");
        }
        if !(self.display_ema_decay > 0.0 && self.display_ema_decay < 1.0) {
            return invalid("display_ema_decay must lie strictly between 0 and 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.history_capacity == 0 {
            return invalid("history_capacity must be at least 1");
        }
        if !(1..=16).contains(&self.bit_depth) {
            return invalid("bit_depth must be between 1 and 16");
        }
        if self.gain <= 0.0 || self.reference_voltage <= 0.0 {
            return invalid("gain and reference_voltage must be positive");
        }
        if self.detection_threshold_ratio <= 0.0 {
            return invalid("detection_threshold_ratio must be positive");
        }
        if self.sampling_rate_hz == 0 {
            return invalid("sampling_rate_hz must be positive");
        }
        if self.acc_channel >= ANALOG_CHANNELS || self.emg_channel >= ANALOG_CHANNELS {
            return invalid("acc_channel and emg_channel must name analog inputs");
        }
        if self.field_update_interval_ms == 0
            || self.render_interval_ms == 0
            || self.idle_anim_interval_ms == 0
        {
            return invalid("loop intervals must be non-zero");
        }
        if self.hex_spacing <= 0.0 {
            return invalid("hex_spacing must be positive");
        }

        let cal = &self.calibration;
        if cal.poll_interval_ms == 0 || cal.min_samples == 0 {
            return invalid("calibration needs a non-zero poll interval and sample minimum");
        }
        // A window shorter than one poll records nothing.
        if cal.measure_ms < cal.poll_interval_ms {
            return invalid("calibration window is shorter than its poll interval");
        }
        Ok(())
    }

    pub fn conditioner(&self) -> Conditioner {
        Conditioner {
            bit_depth: self.bit_depth,
            vcc: self.reference_voltage,
            gain: self.gain,
        }
    }

    pub fn geometry(&self) -> HexGeometry {
        HexGeometry {
            spacing: self.hex_spacing,
            cell_size: self.cell_size,
            center: Point {
                x: self.screen_center[0],
                y: self.screen_center[1],
            },
        }
    }

    pub fn field_update_interval(&self) -> Duration {
        Duration::from_millis(self.field_update_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn idle_anim_interval(&self) -> Duration {
        Duration::from_millis(self.idle_anim_interval_ms)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }
}
