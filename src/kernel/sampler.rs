use tracing::{debug, error, info};

use super::cancel::RunState;
use crate::config::PipelineConfig;
use crate::device::Device;
use crate::error::DeviceError;
use crate::signal::{Conditioner, EmaFilter, LatestCell, SharedHistory};

/// The streams the sampler publishes. Clones share the same buffers.
///
/// The sampler is the only writer; every other loop only reads.
#[derive(Debug, Clone)]
pub struct SignalStreams {
    /// Raw accelerometer codes.
    pub accel: SharedHistory<u16>,
    /// Conditioned EMG in mV.
    pub emg: SharedHistory<f64>,
    /// Smoothed rectified EMG in mV.
    pub emg_smoothed: SharedHistory<f64>,
    /// Same value as the newest `emg_smoothed` entry, readable without a lock.
    /// Detection reads this one.
    pub latest_smoothed: LatestCell,
    /// Rectified EMG under the lighter display filter, for the live gauge.
    pub latest_display: LatestCell,
}

impl SignalStreams {
    pub fn new(capacity: usize) -> Self {
        Self {
            accel: SharedHistory::new(capacity),
            emg: SharedHistory::new(capacity),
            emg_smoothed: SharedHistory::new(capacity),
            latest_smoothed: LatestCell::new(),
            latest_display: LatestCell::new(),
        }
    }
}

/// What one sampler tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTick {
    pub accel: u16,
    pub emg: f64,
    pub smoothed: f64,
    pub display: f64,
}

/// Pulls batches from the device and turns them into the published streams.
///
/// Each tick keeps only the first frame of its batch.
pub struct Sampler {
    device: Box<dyn Device>,
    conditioner: Conditioner,
    filter: EmaFilter,
    display_filter: EmaFilter,
    batch_size: usize,
    acc_channel: usize,
    emg_channel: usize,
    streams: SignalStreams,
    ticks: u64,
}

impl Sampler {
    /// `device` must already be started with both channels selected.
    pub fn new(device: Box<dyn Device>, config: &PipelineConfig, streams: SignalStreams) -> Self {
        Self {
            device,
            conditioner: config.conditioner(),
            filter: EmaFilter::new(config.ema_decay),
            display_filter: EmaFilter::new(config.display_ema_decay),
            batch_size: config.batch_size.max(1),
            acc_channel: config.acc_channel,
            emg_channel: config.emg_channel,
            streams,
            ticks: 0,
        }
    }

    pub fn tick(&mut self) -> Result<SampleTick, DeviceError> {
        let frames = self.device.read(self.batch_size)?;
        let frame = frames.first().ok_or(DeviceError::Disconnected)?;

        let accel = *frame
            .analog
            .get(self.acc_channel)
            .ok_or(DeviceError::InvalidChannel(self.acc_channel))?;
        let raw_emg = *frame
            .analog
            .get(self.emg_channel)
            .ok_or(DeviceError::InvalidChannel(self.emg_channel))?;

        let emg = self.conditioner.millivolts(raw_emg);
        let smoothed = self.filter.update(emg.abs());
        let display = self.display_filter.update(emg.abs());

        self.streams.accel.push(accel);
        self.streams.emg.push(emg);
        self.streams.emg_smoothed.push(smoothed);
        self.streams.latest_smoothed.publish(smoothed);
        self.streams.latest_display.publish(display);
        self.ticks += 1;

        Ok(SampleTick {
            accel,
            emg,
            smoothed,
            display,
        })
    }

    /// Ticks until `run` stops. A device error ends the loop and is returned,
    /// unless the stop was already requested: a read cut short by shutdown
    /// is a normal exit.
    pub fn run(&mut self, run: &RunState) -> Result<u64, DeviceError> {
        info!("Sampler started (batch of {})", self.batch_size);
        while !run.is_stopped() {
            if let Err(e) = self.tick() {
                if run.is_stopped() {
                    debug!("Read interrupted by shutdown: {}", e);
                    break;
                }
                error!("Sampler stopped after {} ticks: {}", self.ticks, e);
                return Err(e);
            }
        }
        debug!("Sampler exiting after {} ticks", self.ticks);
        Ok(self.ticks)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn streams(&self) -> &SignalStreams {
        &self.streams
    }

    /// Stops acquisition and hands the device back.
    pub fn into_device(mut self) -> Box<dyn Device> {
        self.device.stop();
        self.device
    }
}
