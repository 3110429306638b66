//! # Sensor Wire
//!
//! This crate defines the byte layout of event records sent to clients,
//! the sinks they are written to, and the JSON form of the sensor list.
//!
//! An event record is a 16-byte header followed by an 80-byte sample, all
//! little-endian and packed:
//!
//! ```text
//! header:  event_type u32 | sensor_id i64 | data_length u32
//! payload: accuracy i32 | timestamp u64 | value_count i32 | values [f32; 16]
//! ```
use parking_lot::Mutex;
use sensor_core::{
    Accuracy, Event, EventType, Sample, SensorId, SensorProperties, SensorType, MAX_VALUE_COUNT,
};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;

pub const HEADER_LEN: usize = 4 + 8 + 4;
pub const PAYLOAD_LEN: usize = 4 + 8 + 4 + 4 * MAX_VALUE_COUNT;
pub const FRAME_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("truncated frame: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("unexpected payload length {0}")]
    BadLength(u32),
    #[error("unknown accuracy {0}")]
    BadAccuracy(i32),
    #[error("value count {0} out of range")]
    BadValueCount(i32),
    #[error("sensor list encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

// --- Data Structures ---

/// One row of the sensor list handed to clients.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct SensorListEntry {
    pub sensor_id: SensorId,
    pub sensor_type: SensorType,
    pub event_types: Vec<EventType>,
    pub is_virtual: bool,
    pub properties: SensorProperties,
}

// --- Event Records ---

pub fn encode_event(event: &Event) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    let sample = &event.data;
    let mut at = 0;
    let mut put = |bytes: &[u8]| {
        frame[at..at + bytes.len()].copy_from_slice(bytes);
        at += bytes.len();
    };
    put(&event.event_type.0.to_le_bytes());
    put(&event.sensor_id.0.to_le_bytes());
    put(&(PAYLOAD_LEN as u32).to_le_bytes());
    put(&(sample.accuracy as i32).to_le_bytes());
    put(&sample.timestamp.to_le_bytes());
    put(&(sample.value_count() as i32).to_le_bytes());
    let mut values = [0.0f32; MAX_VALUE_COUNT];
    values[..sample.value_count()].copy_from_slice(sample.values());
    for v in values {
        put(&v.to_le_bytes());
    }
    frame
}

/// Concatenated records, the unit written for a flushed batch.
pub fn encode_events(events: &[Event]) -> Vec<u8> {
    let mut out = Vec::with_capacity(events.len() * FRAME_LEN);
    for event in events {
        out.extend_from_slice(&encode_event(event));
    }
    out
}

struct Reader<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.at..self.at + N]);
        self.at += N;
        out
    }
}

/// Decodes the record at the start of `buf`.
pub fn decode_event(buf: &[u8]) -> Result<Event, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            expected: HEADER_LEN,
            actual: buf.len(),
        });
    }
    let mut r = Reader { buf, at: 0 };
    let event_type = EventType(u32::from_le_bytes(r.take()));
    let sensor_id = SensorId(i64::from_le_bytes(r.take()));
    let data_length = u32::from_le_bytes(r.take());
    if data_length as usize != PAYLOAD_LEN {
        return Err(WireError::BadLength(data_length));
    }
    if buf.len() < FRAME_LEN {
        return Err(WireError::Truncated {
            expected: FRAME_LEN,
            actual: buf.len(),
        });
    }

    let raw_accuracy = i32::from_le_bytes(r.take());
    let accuracy = Accuracy::from_raw(raw_accuracy).ok_or(WireError::BadAccuracy(raw_accuracy))?;
    let timestamp = u64::from_le_bytes(r.take());
    let value_count = i32::from_le_bytes(r.take());
    if !(0..=MAX_VALUE_COUNT as i32).contains(&value_count) {
        return Err(WireError::BadValueCount(value_count));
    }
    let mut values = [0.0f32; MAX_VALUE_COUNT];
    for v in values.iter_mut() {
        *v = f32::from_le_bytes(r.take());
    }
    let sample = Sample::new(timestamp, accuracy, &values[..value_count as usize]);
    Ok(Event::new(sensor_id, event_type, sample))
}

/// Decodes a buffer of back-to-back records.
pub fn decode_events(mut buf: &[u8]) -> Result<Vec<Event>, WireError> {
    let mut events = Vec::with_capacity(buf.len() / FRAME_LEN);
    while !buf.is_empty() {
        events.push(decode_event(buf)?);
        buf = &buf[FRAME_LEN..];
    }
    Ok(events)
}

// --- Sinks ---

/// A client's event channel. Writes of one call are never interleaved with
/// another call's bytes.
pub trait EventSink: Send + Sync {
    fn send_event(&self, frame: &[u8]) -> io::Result<()>;
}

/// Sink over any byte stream (a Unix socket, a pipe, a file).
pub struct StreamSink<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W: Write + Send> EventSink for StreamSink<W> {
    fn send_event(&self, frame: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.write_all(frame)?;
        inner.flush()
    }
}

// --- Sensor List ---

fn write_struct<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(serde_json::to_vec(value)?)
}

fn read_struct<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_sensor_list(entries: &[SensorListEntry]) -> Result<Vec<u8>, WireError> {
    write_struct(&entries)
}

pub fn decode_sensor_list(bytes: &[u8]) -> Result<Vec<SensorListEntry>, WireError> {
    read_struct(bytes)
}
