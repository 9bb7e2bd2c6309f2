use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{FrameFeeder, ANALOG_CHANNELS};
use crate::kernel::cancel::RunState;

const PUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Shared switch that tells a [`SyntheticEmg`] whether the simulated face is smiling.
#[derive(Debug, Clone, Default)]
pub struct SmileSwitch(Arc<AtomicBool>);

impl SmileSwitch {
    pub fn set(&self, smiling: bool) {
        self.0.store(smiling, Ordering::Relaxed);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Generates sensor frames in real time: a quiet EMG line near mid-scale,
/// and a wide random burst while the [`SmileSwitch`] is on.
pub struct SyntheticEmg {
    feeder: FrameFeeder,
    smile: SmileSwitch,
    acc_channel: usize,
    emg_channel: usize,
    bit_depth: u32,
    /// Peak deviation from mid-scale, in ADC codes, while smiling.
    burst_amplitude: i32,
    seed: Option<u64>,
}

impl SyntheticEmg {
    pub fn new(feeder: FrameFeeder) -> Self {
        Self {
            feeder,
            smile: SmileSwitch::default(),
            acc_channel: 0,
            emg_channel: 1,
            bit_depth: 10,
            burst_amplitude: 200,
            seed: None,
        }
    }

    pub fn with_channels(mut self, acc_channel: usize, emg_channel: usize) -> Self {
        self.acc_channel = acc_channel.min(ANALOG_CHANNELS - 1);
        self.emg_channel = emg_channel.min(ANALOG_CHANNELS - 1);
        self
    }

    pub fn with_bit_depth(mut self, bit_depth: u32) -> Self {
        self.bit_depth = bit_depth.clamp(2, 16);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn smile_switch(&self) -> SmileSwitch {
        self.smile.clone()
    }

    /// Runs the generator on its own thread until `run` stops or the device
    /// reading its frames is dropped.
    pub fn spawn(self, sampling_rate_hz: u32, run: RunState) -> JoinHandle<()> {
        std::thread::spawn(move || self.generate(sampling_rate_hz, run))
    }

    fn generate(mut self, sampling_rate_hz: u32, run: RunState) {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let max_code = (1i32 << self.bit_depth) - 1;
        let mid = 1i32 << (self.bit_depth - 1);
        let burst_floor = self.burst_amplitude / 4;

        info!("Synthetic EMG source running at {}Hz", sampling_rate_hz);
        let started = Instant::now();
        let mut emitted: u64 = 0;
        let mut dropped: u64 = 0;

        while !run.is_stopped() && self.feeder.is_connected() {
            // Catch up to the wall clock so the average rate holds under jitter.
            let due = (started.elapsed().as_secs_f64() * sampling_rate_hz as f64) as u64;
            while emitted < due {
                let mut analog = [mid as u16; ANALOG_CHANNELS];
                let emg = if self.smile.get() {
                    let swing = rng.gen_range(burst_floor..=self.burst_amplitude);
                    if rng.gen_bool(0.5) { mid + swing } else { mid - swing }
                } else {
                    mid + rng.gen_range(-3..=3)
                };
                analog[self.emg_channel] = emg.clamp(0, max_code) as u16;
                analog[self.acc_channel] = (mid + rng.gen_range(-8..=8)).clamp(0, max_code) as u16;

                if !self.feeder.push(analog) {
                    dropped += 1;
                }
                emitted += 1;
            }
            std::thread::sleep(PUSH_INTERVAL);
        }
        debug!("Synthetic EMG source stopped ({} frames, {} dropped)", emitted, dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ring_device, Device};

    #[test]
    fn produces_bursts_only_while_smiling() {
        let (mut dev, feeder) = ring_device(4096);
        dev.start(1000, &[0, 1]).unwrap();
        let sim = SyntheticEmg::new(feeder).with_seed(7);
        let smile = sim.smile_switch();
        let run = RunState::new();
        let handle = sim.spawn(1000, run.clone());

        let idle = dev.read(50).unwrap();
        assert!(idle.iter().all(|f| (f.analog[1] as i32 - 512).abs() <= 3));

        smile.set(true);
        // Skip idle frames generated before the switch flipped.
        let mut skipped = 0;
        while (dev.read(1).unwrap()[0].analog[1] as i32 - 512).abs() <= 3 {
            skipped += 1;
            assert!(skipped < 1000, "source never switched to bursts");
        }
        let burst = dev.read(50).unwrap();
        assert!(burst.iter().all(|f| (f.analog[1] as i32 - 512).abs() >= 50));

        run.stop();
        handle.join().unwrap();
    }

    #[test]
    fn exits_when_device_is_dropped() {
        let (dev, feeder) = ring_device(64);
        let handle = SyntheticEmg::new(feeder).spawn(1000, RunState::new());
        drop(dev);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !handle.is_finished() {
            assert!(Instant::now() < deadline, "generator outlived its device");
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.join().unwrap();
    }
}
