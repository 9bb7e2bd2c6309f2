//! Sensor link. The physical Bluetooth/serial transport lives outside this
//! crate; what the pipeline sees is the [`Device`] trait.

pub mod ring;
pub mod synthetic;

use std::time::Duration;
use tracing::{info, warn};

use crate::error::DeviceError;

pub use ring::{ring_device, FrameFeeder, RingDevice};
pub use synthetic::{SmileSwitch, SyntheticEmg};

/// Analog inputs per frame.
pub const ANALOG_CHANNELS: usize = 6;

/// One multi-channel sample as delivered by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    /// Wrapping sequence counter (4 bits on the wire, kept as-is).
    pub seq: u8,
    pub digital: [bool; 4],
    /// Raw ADC codes, indexed by analog channel id.
    pub analog: [u16; ANALOG_CHANNELS],
}

pub trait Device: Send {
    /// Begins acquisition. Must precede any `read`.
    fn start(&mut self, sampling_rate_hz: u32, channels: &[usize]) -> Result<(), DeviceError>;

    /// Blocks until `n` frames are available and returns them, oldest first.
    fn read(&mut self, n: usize) -> Result<Vec<Frame>, DeviceError>;

    fn stop(&mut self);
}

/// A connected sensor, plus the simulator driving it when there is no hardware.
pub struct Connection {
    pub device: Box<dyn Device>,
    pub simulator: Option<SyntheticEmg>,
}

const SIMULATOR_IDS: [&str; 2] = ["sim", "synthetic"];
const SIMULATOR_BUFFER: usize = 8192;

/// Opens the sensor named by `identifier`.
pub fn connect(identifier: &str) -> Result<Connection, DeviceError> {
    if SIMULATOR_IDS.contains(&identifier.trim().to_ascii_lowercase().as_str()) {
        let (device, feeder) = ring_device(SIMULATOR_BUFFER);
        info!("Connected to simulated sensor");
        return Ok(Connection {
            device: Box::new(device),
            simulator: Some(SyntheticEmg::new(feeder)),
        });
    }
    Err(DeviceError::Unavailable(identifier.to_string()))
}

/// [`connect`] with a bounded number of attempts.
pub async fn connect_with_retry(
    identifier: &str,
    attempts: u32,
    backoff: Duration,
) -> Result<Connection, DeviceError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match connect(identifier) {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!("Connect attempt {}/{} failed: {}", attempt, attempts, e);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
