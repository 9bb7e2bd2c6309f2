use std::time::Duration;
use thiserror::Error;

/// Failures of the sensor link.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device unavailable: '{0}' is not a reachable sensor")]
    Unavailable(String),
    #[error("device has not been started")]
    NotStarted,
    #[error("no frames arrived within {0:?}")]
    ReadTimeout(Duration),
    #[error("device link closed")]
    Disconnected,
    #[error("analog channel {0} is not available on this device")]
    InvalidChannel(usize),
}

/// Static field layout is malformed. Always fatal at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout contains no cells")]
    Empty,
    #[error("layout has no base cell (index 0)")]
    NoBase,
    #[error("cell {0} is missing from the layout")]
    MissingCell(usize),
    #[error("cell {0} appears more than once in the layout")]
    DuplicateCell(usize),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("calibration window recorded {got} samples, need at least {min}")]
    InsufficientSamples { got: usize, min: usize },
    #[error("calibration cancelled")]
    Cancelled,
    #[error("failed to write calibration log: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write calibration log: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("calibration criteria lack the '{0}' reference")]
    MissingReference(String),
}

/// Everything that can end a session abnormally.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0} task panicked")]
    TaskPanicked(&'static str),
}
