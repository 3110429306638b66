#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use sensor_core::{Accuracy, Event, HalDevice, Sample, SensorError, SensorProperties, SensorType};
use sensor_wire::{decode_events, EventSink};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct Counters {
    pub enables: AtomicU32,
    pub disables: AtomicU32,
    pub interval: AtomicU32,
}

impl Counters {
    pub fn enables(&self) -> u32 {
        self.enables.load(Ordering::SeqCst)
    }

    pub fn disables(&self) -> u32 {
        self.disables.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> u32 {
        self.interval.load(Ordering::SeqCst)
    }
}

/// In-memory HAL device that hands out scripted readings.
pub struct FakeDevice {
    sensor_type: SensorType,
    readings: Arc<Mutex<VecDeque<Sample>>>,
    counters: Arc<Counters>,
}

pub struct FakeHandle {
    pub readings: Arc<Mutex<VecDeque<Sample>>>,
    pub counters: Arc<Counters>,
}

impl FakeHandle {
    pub fn push(&self, sample: Sample) {
        self.readings.lock().push_back(sample);
    }
}

pub fn fake_device(sensor_type: SensorType) -> (Box<dyn HalDevice>, FakeHandle) {
    let readings = Arc::new(Mutex::new(VecDeque::new()));
    let counters = Arc::new(Counters::default());
    let device = FakeDevice {
        sensor_type,
        readings: readings.clone(),
        counters: counters.clone(),
    };
    (Box::new(device), FakeHandle { readings, counters })
}

impl HalDevice for FakeDevice {
    fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    fn get_properties(&self) -> SensorProperties {
        SensorProperties::synthetic(&format!("fake {:?}", self.sensor_type), "test", -100.0, 100.0)
    }

    fn enable(&mut self) -> bool {
        self.counters.enables.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn disable(&mut self) -> bool {
        self.counters.disables.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn set_interval(&mut self, interval_ms: u32) -> bool {
        self.counters.interval.store(interval_ms, Ordering::SeqCst);
        true
    }

    fn is_data_ready(&mut self) -> bool {
        !self.readings.lock().is_empty()
    }

    fn get_sensor_data(&mut self) -> Result<Sample, SensorError> {
        self.readings.lock().pop_front().ok_or(SensorError::NoData)
    }
}

/// Event channel that forwards every write to a test receiver.
pub struct ChannelSink {
    tx: Sender<Vec<u8>>,
}

impl EventSink for ChannelSink {
    fn send_event(&self, frame: &[u8]) -> io::Result<()> {
        self.tx
            .send(frame.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver dropped"))
    }
}

pub fn channel_sink() -> (Arc<dyn EventSink>, Receiver<Vec<u8>>) {
    let (tx, rx) = unbounded();
    (Arc::new(ChannelSink { tx }), rx)
}

pub struct FailingSink;

impl EventSink for FailingSink {
    fn send_event(&self, _frame: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }
}

/// Next write, decoded.
pub fn next_write(rx: &Receiver<Vec<u8>>) -> Vec<Event> {
    let bytes = rx.recv_timeout(WAIT).expect("no write before timeout");
    decode_events(&bytes).expect("malformed frames")
}

pub fn sample(ts: u64, values: &[f32]) -> Sample {
    Sample::new(ts, Accuracy::Good, values)
}
