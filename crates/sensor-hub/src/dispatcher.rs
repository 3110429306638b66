//! # Event Dispatcher
//!
//! One cycle per seed event popped from the queue:
//!
//! ```text
//! WAIT_EVENT -> SYNTHESIZE -> SORT -> RECORD -> DELIVER -> WAIT_EVENT
//! ```
//!
//! SYNTHESIZE cascades: the seed and every derived event are offered to all
//! active virtual sensors, in dependency order, until nothing new is produced.
//! SORT is stable on timestamp, so equal timestamps keep production order.

use crate::context::AppContext;
use crossbeam_channel::Receiver;
use sensor_core::{ClientId, Event};
use sensor_wire::{encode_event, encode_events};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Messages on the shared event queue.
#[derive(Debug, Clone, Copy)]
pub enum Dispatch {
    Event(Event),
    Shutdown,
}

pub struct Dispatcher {
    ctx: Arc<AppContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Seed plus everything derived from it, ordered by timestamp.
    pub fn synthesize(&self, seed: Event) -> Vec<Event> {
        let active = self.ctx.registry.active_virtual_sensors();
        let mut queue = VecDeque::from([seed]);
        let mut batch = Vec::new();
        while let Some(event) = queue.pop_front() {
            for sensor in &active {
                queue.extend(sensor.synthesize(&event));
            }
            batch.push(event);
        }
        batch.sort_by_key(Event::timestamp);
        batch
    }

    /// Runs one full cycle for `seed`.
    pub fn dispatch(&self, seed: Event) {
        let batch = self.synthesize(seed);
        trace!(events = batch.len(), "dispatch cycle");
        for event in &batch {
            self.ctx.cache.record(event);
        }
        for event in &batch {
            self.deliver(event);
        }
    }

    fn deliver(&self, event: &Event) {
        let clients = &self.ctx.clients;
        for client in clients.get_listener_ids(event.sensor_id, event.event_type) {
            let latency = clients
                .get_usage(client, event.sensor_id)
                .map_or(0, |u| u.latency_ms);
            if latency > 0 {
                if let Some(batch) = self.ctx.batches.push(client, *event, latency) {
                    self.send(client, &encode_events(&batch));
                }
                continue;
            }
            // Frames buffered for this client's other streams go out first.
            let pending = self.ctx.batches.take(client);
            if !pending.is_empty() {
                self.send(client, &encode_events(&pending));
            }
            self.send(client, &encode_event(event));
        }
    }

    /// Writes to the client's event channel. A failed write only affects
    /// that client.
    pub fn send(&self, client: ClientId, bytes: &[u8]) {
        let Some(sink) = self.ctx.clients.get_event_socket(client) else {
            debug!(client_id = client, "no event channel, dropping frames");
            return;
        };
        if let Err(e) = sink.send_event(bytes) {
            warn!(client_id = client, error = %e, "event write failed");
        }
    }

    /// Writes out the client's pending batch, if any.
    pub fn flush_client(&self, client: ClientId) {
        let pending = self.ctx.batches.take(client);
        if !pending.is_empty() {
            self.send(client, &encode_events(&pending));
        }
    }

    pub fn flush_all(&self) {
        for (client, pending) in self.ctx.batches.take_all() {
            self.send(client, &encode_events(&pending));
        }
    }

    /// Drains `events` until a shutdown message arrives or every sender is
    /// gone, then flushes all pending batches.
    pub fn run(&self, events: Receiver<Dispatch>) {
        info!("dispatcher started");
        while let Ok(Dispatch::Event(event)) = events.recv() {
            self.dispatch(event);
        }
        self.flush_all();
        info!("dispatcher stopped");
    }

    pub fn spawn(ctx: Arc<AppContext>, events: Receiver<Dispatch>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("sensor-dispatcher".to_string())
            .spawn(move || Dispatcher::new(ctx).run(events))
    }
}
