//! Per-client buffering for usages with a batch latency.
//!
//! A client's pending frames are flushed as one write when the buffered span
//! reaches its latency, when `max_events` frames are pending, or on demand.
//!
//! There is one buffer per client, shared by all of its batched sensors. The
//! span is checked against the latency of the event just pushed, so the
//! tightest latency among a client's sensors decides when the shared buffer
//! is written.

use parking_lot::Mutex;
use sensor_core::{ClientId, Event};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Pending {
    events: Vec<Event>,
}

impl Pending {
    fn span_us(&self) -> u64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp().saturating_sub(first.timestamp()),
            _ => 0,
        }
    }
}

pub struct BatchBuffers {
    max_events: usize,
    pending: Mutex<HashMap<ClientId, Pending>>,
}

impl BatchBuffers {
    pub fn new(max_events: usize) -> Self {
        Self {
            max_events: max_events.max(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Buffers `event`; returns the client's whole batch, frames of every
    /// sensor included, once the span reaches `latency_ms`.
    pub fn push(&self, client: ClientId, event: Event, latency_ms: u32) -> Option<Vec<Event>> {
        let mut pending = self.pending.lock();
        let buffer = pending.entry(client).or_default();
        buffer.events.push(event);
        let due = buffer.events.len() >= self.max_events
            || buffer.span_us() >= u64::from(latency_ms) * 1000;
        if due {
            pending.remove(&client).map(|p| p.events)
        } else {
            None
        }
    }

    /// Takes whatever is pending for the client.
    pub fn take(&self, client: ClientId) -> Vec<Event> {
        self.pending
            .lock()
            .remove(&client)
            .map(|p| p.events)
            .unwrap_or_default()
    }

    pub fn take_all(&self) -> Vec<(ClientId, Vec<Event>)> {
        self.pending
            .lock()
            .drain()
            .map(|(client, p)| (client, p.events))
            .collect()
    }

    pub fn pending_count(&self, client: ClientId) -> usize {
        self.pending
            .lock()
            .get(&client)
            .map_or(0, |p| p.events.len())
    }
}
