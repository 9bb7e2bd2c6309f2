use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{Device, Frame, ANALOG_CHANNELS};
use crate::error::DeviceError;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Creates a device whose frames are supplied through the returned feeder.
///
/// The two halves share a lock-free SPSC ring: the feeder lives on whatever
/// thread produces frames, the device on the sampler thread.
pub fn ring_device(capacity: usize) -> (RingDevice, FrameFeeder) {
    let rb = HeapRb::<Frame>::new(capacity.max(1));
    let (producer, consumer) = rb.split();
    let feeder_alive = Arc::new(AtomicBool::new(true));
    let device_alive = Arc::new(AtomicBool::new(true));

    let device = RingDevice {
        consumer,
        feeder_alive: Arc::clone(&feeder_alive),
        device_alive: Arc::clone(&device_alive),
        pending: Vec::new(),
        acquisition: None,
        read_timeout: DEFAULT_READ_TIMEOUT,
    };
    let feeder = FrameFeeder {
        producer,
        alive: feeder_alive,
        device_alive,
        seq: 0,
    };
    (device, feeder)
}

#[derive(Debug, Clone)]
struct Acquisition {
    sampling_rate_hz: u32,
    channels: Vec<usize>,
}

pub struct RingDevice {
    consumer: HeapCons<Frame>,
    feeder_alive: Arc<AtomicBool>,
    device_alive: Arc<AtomicBool>,
    // Frames already popped for a read that has not completed yet.
    pending: Vec<Frame>,
    acquisition: Option<Acquisition>,
    read_timeout: Duration,
}

impl RingDevice {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn is_started(&self) -> bool {
        self.acquisition.is_some()
    }

    pub fn sampling_rate_hz(&self) -> Option<u32> {
        self.acquisition.as_ref().map(|a| a.sampling_rate_hz)
    }

    fn drain_into_pending(&mut self, n: usize) {
        while self.pending.len() < n {
            match self.consumer.try_pop() {
                Some(frame) => self.pending.push(frame),
                None => break,
            }
        }
    }
}

impl Device for RingDevice {
    fn start(&mut self, sampling_rate_hz: u32, channels: &[usize]) -> Result<(), DeviceError> {
        if let Some(&bad) = channels.iter().find(|&&c| c >= ANALOG_CHANNELS) {
            return Err(DeviceError::InvalidChannel(bad));
        }
        info!(
            "Acquisition started: {}Hz, channels {:?}",
            sampling_rate_hz, channels
        );
        self.acquisition = Some(Acquisition {
            sampling_rate_hz,
            channels: channels.to_vec(),
        });
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<Frame>, DeviceError> {
        if self.acquisition.is_none() {
            return Err(DeviceError::NotStarted);
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            // Load the flag before draining so frames pushed right before the
            // feeder went away are still delivered.
            let feeder_gone = !self.feeder_alive.load(Ordering::Acquire);
            self.drain_into_pending(n);
            if self.pending.len() >= n {
                return Ok(self.pending.drain(..n).collect());
            }
            if feeder_gone {
                return Err(DeviceError::Disconnected);
            }
            if Instant::now() >= deadline {
                return Err(DeviceError::ReadTimeout(self.read_timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&mut self) {
        if let Some(acq) = self.acquisition.take() {
            debug!("Acquisition stopped (channels {:?})", acq.channels);
        }
        self.pending.clear();
    }
}

/// Producer half of a [`ring_device`]. Dropping it disconnects the device.
pub struct FrameFeeder {
    producer: HeapProd<Frame>,
    alive: Arc<AtomicBool>,
    device_alive: Arc<AtomicBool>,
    seq: u8,
}

impl FrameFeeder {
    /// Pushes one frame with the given analog codes. Returns `false` when the
    /// ring is full and the frame was dropped.
    pub fn push(&mut self, analog: [u16; ANALOG_CHANNELS]) -> bool {
        let frame = Frame {
            seq: self.seq,
            digital: [false; 4],
            analog,
        };
        self.seq = (self.seq + 1) & 0x0F;
        self.producer.try_push(frame).is_ok()
    }

    /// Pushes `count` identical frames; returns how many fit.
    pub fn push_repeated(&mut self, analog: [u16; ANALOG_CHANNELS], count: usize) -> usize {
        (0..count).take_while(|_| self.push(analog)).count()
    }

    pub fn vacant_len(&self) -> usize {
        self.producer.vacant_len()
    }

    /// `false` once the reading [`RingDevice`] has been dropped.
    pub fn is_connected(&self) -> bool {
        self.device_alive.load(Ordering::Acquire)
    }
}

impl Drop for FrameFeeder {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl Drop for RingDevice {
    fn drop(&mut self) {
        self.device_alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(emg: u16) -> [u16; ANALOG_CHANNELS] {
        let mut a = [512; ANALOG_CHANNELS];
        a[1] = emg;
        a
    }

    #[test]
    fn read_before_start_fails() {
        let (mut dev, mut feeder) = ring_device(16);
        feeder.push(codes(600));
        assert!(matches!(dev.read(1), Err(DeviceError::NotStarted)));
    }

    #[test]
    fn start_rejects_unknown_channel() {
        let (mut dev, _feeder) = ring_device(16);
        assert!(matches!(
            dev.start(1000, &[0, ANALOG_CHANNELS]),
            Err(DeviceError::InvalidChannel(c)) if c == ANALOG_CHANNELS
        ));
    }

    #[test]
    fn reads_frames_in_order() {
        let (mut dev, mut feeder) = ring_device(16);
        dev.start(1000, &[0, 1]).unwrap();
        for code in [600, 601, 602, 603] {
            assert!(feeder.push(codes(code)));
        }
        let frames = dev.read(3).unwrap();
        let emg: Vec<u16> = frames.iter().map(|f| f.analog[1]).collect();
        assert_eq!(emg, vec![600, 601, 602]);
        assert_eq!(frames[1].seq, 1);
        assert_eq!(dev.read(1).unwrap()[0].analog[1], 603);
    }

    #[test]
    fn dropped_feeder_disconnects_after_draining() {
        let (dev, mut feeder) = ring_device(16);
        let mut dev = dev.with_read_timeout(Duration::from_millis(50));
        dev.start(1000, &[1]).unwrap();
        feeder.push_repeated(codes(700), 2);
        drop(feeder);
        assert_eq!(dev.read(2).unwrap().len(), 2);
        assert!(matches!(dev.read(2), Err(DeviceError::Disconnected)));
    }

    #[test]
    fn starved_read_times_out() {
        let (dev, _feeder) = ring_device(16);
        let mut dev = dev.with_read_timeout(Duration::from_millis(30));
        dev.start(1000, &[1]).unwrap();
        assert!(matches!(dev.read(1), Err(DeviceError::ReadTimeout(_))));
    }

    #[test]
    fn feeder_sees_dropped_device() {
        let (dev, feeder) = ring_device(4);
        assert!(feeder.is_connected());
        drop(dev);
        assert!(!feeder.is_connected());
    }

    #[test]
    fn full_ring_drops_frames() {
        let (_dev, mut feeder) = ring_device(4);
        assert_eq!(feeder.push_repeated(codes(512), 10), 4);
        assert_eq!(feeder.vacant_len(), 0);
    }
}
