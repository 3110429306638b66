//! One poll thread per physical sensor, feeding the dispatcher queue.

use crate::dispatcher::Dispatch;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use sensor_core::{PhysicalSensor, Sensor};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

pub struct Poller {
    sensor: Arc<PhysicalSensor>,
    events: Sender<Dispatch>,
    default_interval_ms: u32,
}

impl Poller {
    pub fn new(sensor: Arc<PhysicalSensor>, events: Sender<Dispatch>, default_interval_ms: u32) -> Self {
        Self {
            sensor,
            events,
            default_interval_ms,
        }
    }

    fn interval(&self) -> Duration {
        let ms = self.sensor.interval().unwrap_or(self.default_interval_ms).max(1);
        Duration::from_millis(u64::from(ms))
    }

    /// Reads the device once if the sensor is started. Returns `false` once
    /// the dispatcher queue is gone.
    pub fn poll_once(&self) -> bool {
        if !self.sensor.is_started() {
            return true;
        }
        match self.sensor.poll() {
            Some(event) => self.events.send(Dispatch::Event(event)).is_ok(),
            None => true,
        }
    }

    /// Polls at the sensor's effective interval until `shutdown` fires or
    /// its sender is dropped.
    pub fn run(&self, shutdown: Receiver<()>) {
        info!(sensor = %self.sensor.name(), "poll loop started");
        loop {
            match shutdown.recv_timeout(self.interval()) {
                Err(RecvTimeoutError::Timeout) => {
                    if !self.poll_once() {
                        debug!(sensor = %self.sensor.name(), "event queue closed");
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(sensor = %self.sensor.name(), "poll loop stopped");
    }

    pub fn spawn(self, shutdown: Receiver<()>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("poll-{}", self.sensor.id()))
            .spawn(move || self.run(shutdown))
    }
}
