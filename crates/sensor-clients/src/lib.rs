//! # Sensor Clients
//!
//! Per-client sensor usage records and the queries the dispatcher runs
//! against them.
//! - A record exists from connect until disconnect, or until its last sensor
//!   usage is removed while no event socket is attached.
//! - Listeners of `(sensor, event type)` are started usages that registered the
//!   event type and whose option allows delivery in the current power state.
//! - The socket type is generic so the hub decides what a client channel is.

use parking_lot::Mutex;
use sensor_core::{ClientId, EventType, SensorId};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("unknown client {0}")]
    UnknownClient(ClientId),
    #[error("client {client} does not use sensor {sensor}")]
    SensorNotUsed { client: ClientId, sensor: SensorId },
}

/// When a client keeps receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorOption {
    #[default]
    Default,
    OnInScreenOff,
    OnInPowerSave,
    AlwaysOn,
}

impl SensorOption {
    pub fn receives(self, screen_off: bool, power_save: bool) -> bool {
        let screen_ok = !screen_off
            || matches!(self, SensorOption::OnInScreenOff | SensorOption::AlwaysOn);
        let power_ok = !power_save
            || matches!(self, SensorOption::OnInPowerSave | SensorOption::AlwaysOn);
        screen_ok && power_ok
    }
}

/// One client's use of one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SensorUsage {
    pub event_types: BTreeSet<EventType>,
    /// Requested interval in milliseconds, zero when unset.
    pub interval_ms: u32,
    /// Batch latency in milliseconds, zero for immediate delivery.
    pub latency_ms: u32,
    pub option: SensorOption,
    pub started: bool,
}

#[derive(Debug, Default)]
struct ClientRecord {
    usages: BTreeMap<SensorId, SensorUsage>,
}

#[derive(Debug)]
struct Table<S> {
    next_id: ClientId,
    records: BTreeMap<ClientId, ClientRecord>,
    sockets: BTreeMap<ClientId, S>,
    screen_off: bool,
    power_save: bool,
}

impl<S> Table<S> {
    fn known(&self, client: ClientId) -> bool {
        self.records.contains_key(&client) || self.sockets.contains_key(&client)
    }

    /// Record of a connected client, recreated if its usages were all removed.
    fn record(&mut self, client: ClientId) -> Result<&mut ClientRecord, ClientError> {
        if !self.known(client) {
            return Err(ClientError::UnknownClient(client));
        }
        Ok(self.records.entry(client).or_default())
    }

    fn usage(&mut self, client: ClientId, sensor: SensorId) -> Result<&mut SensorUsage, ClientError> {
        Ok(self.record(client)?.usages.entry(sensor).or_default())
    }

    fn existing_usage(
        &mut self,
        client: ClientId,
        sensor: SensorId,
    ) -> Result<&mut SensorUsage, ClientError> {
        self.record(client)?
            .usages
            .get_mut(&sensor)
            .ok_or(ClientError::SensorNotUsed { client, sensor })
    }

    fn started_usages(&self, sensor: SensorId) -> impl Iterator<Item = (ClientId, &SensorUsage)> + '_ {
        self.records.iter().filter_map(move |(id, record)| {
            record
                .usages
                .get(&sensor)
                .filter(|u| u.started)
                .map(|u| (*id, u))
        })
    }
}

/// Thread-safe registry of connected clients, one mutex for the whole table.
pub struct ClientRegistry<S> {
    table: Mutex<Table<S>>,
}

impl<S: Clone> Default for ClientRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone> ClientRegistry<S> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                next_id: 1,
                records: BTreeMap::new(),
                sockets: BTreeMap::new(),
                screen_off: false,
                power_save: false,
            }),
        }
    }

    /// Allocates a new, strictly increasing client id.
    pub fn create_client(&self) -> ClientId {
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.records.insert(id, ClientRecord::default());
        info!(client_id = id, "client record created");
        id
    }

    pub fn has_client(&self, client: ClientId) -> bool {
        self.table.lock().known(client)
    }

    pub fn client_count(&self) -> usize {
        let table = self.table.lock();
        let mut ids: BTreeSet<ClientId> = table.records.keys().copied().collect();
        ids.extend(table.sockets.keys().copied());
        ids.len()
    }

    pub fn set_event_socket(&self, client: ClientId, socket: S) -> Result<(), ClientError> {
        let mut table = self.table.lock();
        if !table.known(client) {
            return Err(ClientError::UnknownClient(client));
        }
        table.sockets.insert(client, socket);
        Ok(())
    }

    pub fn get_event_socket(&self, client: ClientId) -> Option<S> {
        self.table.lock().sockets.get(&client).cloned()
    }

    /// Forgets the client and returns its usages so the caller can release
    /// the sensors they held.
    pub fn remove_client(&self, client: ClientId) -> Result<Vec<(SensorId, SensorUsage)>, ClientError> {
        let mut table = self.table.lock();
        if !table.known(client) {
            return Err(ClientError::UnknownClient(client));
        }
        table.sockets.remove(&client);
        let usages = table
            .records
            .remove(&client)
            .map(|r| r.usages.into_iter().collect())
            .unwrap_or_default();
        info!(client_id = client, "client record removed");
        Ok(usages)
    }

    /// Marks the usage started. Returns `false` if it already was.
    pub fn start_usage(&self, client: ClientId, sensor: SensorId) -> Result<bool, ClientError> {
        let mut table = self.table.lock();
        let usage = table.usage(client, sensor)?;
        let newly = !usage.started;
        usage.started = true;
        Ok(newly)
    }

    /// Marks the usage stopped. Returns `false` if it was not started.
    pub fn stop_usage(&self, client: ClientId, sensor: SensorId) -> Result<bool, ClientError> {
        let mut table = self.table.lock();
        let usage = table.existing_usage(client, sensor)?;
        let was_started = usage.started;
        usage.started = false;
        Ok(was_started)
    }

    /// Drops one usage; the record goes with its last usage unless the client
    /// still has an event socket.
    pub fn remove_usage(&self, client: ClientId, sensor: SensorId) -> Result<SensorUsage, ClientError> {
        let mut table = self.table.lock();
        let record = table.record(client)?;
        let usage = record
            .usages
            .remove(&sensor)
            .ok_or(ClientError::SensorNotUsed { client, sensor })?;
        let empty = record.usages.is_empty();
        if empty && !table.sockets.contains_key(&client) {
            table.records.remove(&client);
            debug!(client_id = client, "last usage removed, record dropped");
        }
        Ok(usage)
    }

    pub fn get_usage(&self, client: ClientId, sensor: SensorId) -> Option<SensorUsage> {
        self.table
            .lock()
            .records
            .get(&client)
            .and_then(|r| r.usages.get(&sensor))
            .cloned()
    }

    /// Returns `false` if the event type was already registered.
    pub fn register_event(
        &self,
        client: ClientId,
        sensor: SensorId,
        event_type: EventType,
    ) -> Result<bool, ClientError> {
        Ok(self.table.lock().usage(client, sensor)?.event_types.insert(event_type))
    }

    pub fn unregister_event(
        &self,
        client: ClientId,
        sensor: SensorId,
        event_type: EventType,
    ) -> Result<bool, ClientError> {
        Ok(self
            .table
            .lock()
            .existing_usage(client, sensor)?
            .event_types
            .remove(&event_type))
    }

    pub fn set_interval(&self, client: ClientId, sensor: SensorId, interval_ms: u32) -> Result<(), ClientError> {
        self.table.lock().usage(client, sensor)?.interval_ms = interval_ms;
        Ok(())
    }

    pub fn set_latency(&self, client: ClientId, sensor: SensorId, latency_ms: u32) -> Result<(), ClientError> {
        self.table.lock().usage(client, sensor)?.latency_ms = latency_ms;
        Ok(())
    }

    pub fn set_option(&self, client: ClientId, sensor: SensorId, option: SensorOption) -> Result<(), ClientError> {
        self.table.lock().usage(client, sensor)?.option = option;
        Ok(())
    }

    /// Clients that should receive `event_type` from `sensor`, by ascending id.
    pub fn get_listener_ids(&self, sensor: SensorId, event_type: EventType) -> Vec<ClientId> {
        let table = self.table.lock();
        let (screen_off, power_save) = (table.screen_off, table.power_save);
        table
            .started_usages(sensor)
            .filter(|(_, u)| u.event_types.contains(&event_type))
            .filter(|(_, u)| u.option.receives(screen_off, power_save))
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether any client has the sensor started.
    pub fn is_sensor_used(&self, sensor: SensorId) -> bool {
        self.table.lock().started_usages(sensor).next().is_some()
    }

    pub fn set_screen_off(&self, screen_off: bool) {
        self.table.lock().screen_off = screen_off;
        info!(screen_off, "screen state changed");
    }

    pub fn set_power_save(&self, power_save: bool) {
        self.table.lock().power_save = power_save;
        info!(power_save, "power save state changed");
    }
}
