//! # Sensor Hub
//!
//! Wires HAL devices and virtual sensor factories into one running hub:
//! a registry built once at startup, one poll thread per physical sensor,
//! and a single dispatcher thread that synthesizes, orders, records and
//! delivers events to connected clients.
//!
//! Client requests (start, stop, intervals, batching) arrive on the caller's
//! threads through [`SensorHub`]; nothing here holds a lock across a dispatch
//! cycle.

pub mod batch;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod poller;
pub mod registry;

pub use config::{load_config, save_config, DispatcherConfig, HubConfig};
pub use context::{AppContext, ClientSink};
pub use dispatcher::{Dispatch, Dispatcher};
pub use registry::{RegistryError, SensorRegistry};

use anyhow::Context as _;
use crossbeam_channel::{unbounded, Sender};
use poller::Poller;
use sensor_clients::{ClientError, SensorOption};
use sensor_core::{
    ClientId, Event, EventType, HalDevice, IntervalOrigin, Sample, SensorError, SensorHandle,
    SensorId,
};
use sensor_virtual::{builtin_factories, VirtualSensorFactory};
use sensor_wire::{encode_event, encode_sensor_list, SensorListEntry, WireError};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors returned to client request handlers.
#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("hub is shut down")]
    Stopped,
}

pub type HubResult<T> = Result<T, HubError>;

pub struct SensorHub {
    ctx: Arc<AppContext>,
    dispatcher: Dispatcher,
    events: Sender<Dispatch>,
    poll_shutdown: Option<Sender<()>>,
    poll_threads: Vec<JoinHandle<()>>,
    dispatcher_thread: Option<JoinHandle<()>>,
}

impl SensorHub {
    /// Builds the hub with the stock virtual sensors and starts its threads.
    pub fn new(config: HubConfig, devices: Vec<Box<dyn HalDevice>>) -> anyhow::Result<Self> {
        let factories = builtin_factories(&config.fusion);
        Self::with_factories(config, devices, factories)
    }

    pub fn with_factories(
        config: HubConfig,
        devices: Vec<Box<dyn HalDevice>>,
        factories: Vec<Box<dyn VirtualSensorFactory>>,
    ) -> anyhow::Result<Self> {
        let registry = SensorRegistry::build(devices, factories, &config)
            .context("building sensor registry")?;
        let ctx = Arc::new(AppContext::new(config, registry));

        let (events, queue) = unbounded();
        let dispatcher_thread = Dispatcher::spawn(ctx.clone(), queue)
            .context("spawning dispatcher thread")?;

        let mut hub = Self {
            dispatcher: Dispatcher::new(ctx.clone()),
            ctx,
            events,
            poll_shutdown: None,
            poll_threads: Vec::new(),
            dispatcher_thread: Some(dispatcher_thread),
        };

        let (poll_shutdown, shutdown_rx) = unbounded();
        let default_interval = hub.ctx.config.dispatcher.default_poll_interval_ms;
        for sensor in hub.ctx.registry.physical_sensors() {
            let poller = Poller::new(sensor, hub.events.clone(), default_interval);
            let handle = poller
                .spawn(shutdown_rx.clone())
                .context("spawning poll thread")?;
            hub.poll_threads.push(handle);
        }
        hub.poll_shutdown = Some(poll_shutdown);

        info!(
            sensors = hub.ctx.registry.get_sensors(sensor_core::SensorType::All).len(),
            pollers = hub.poll_threads.len(),
            "sensor hub started"
        );
        Ok(hub)
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    fn sensor(&self, id: SensorId) -> HubResult<&SensorHandle> {
        self.ctx
            .registry
            .get_sensor(id)
            .ok_or(HubError::Sensor(SensorError::InvalidSensor(id)))
    }

    fn known_client(&self, client: ClientId) -> HubResult<()> {
        if self.ctx.clients.has_client(client) {
            Ok(())
        } else {
            Err(ClientError::UnknownClient(client).into())
        }
    }

    pub fn connect_client(&self) -> ClientId {
        let client = self.ctx.clients.create_client();
        info!(client_id = client, "client connected");
        client
    }

    /// Attaches the channel events for `client` are written to.
    pub fn set_event_sink(&self, client: ClientId, sink: ClientSink) -> HubResult<()> {
        self.ctx.clients.set_event_socket(client, sink)?;
        debug!(client_id = client, "event channel attached");
        Ok(())
    }

    /// Releases every sensor the client still holds and forgets it. Pending
    /// batched frames are discarded.
    pub fn disconnect_client(&self, client: ClientId) -> HubResult<()> {
        let usages = self.ctx.clients.remove_client(client)?;
        self.ctx.batches.take(client);
        for (sensor_id, usage) in usages.into_iter().filter(|(_, u)| u.started) {
            let Some(handle) = self.ctx.registry.get_sensor(sensor_id) else {
                continue;
            };
            let sensor = handle.sensor();
            if let Err(e) = sensor
                .delete_interval(client, IntervalOrigin::Direct)
                .and_then(|_| sensor.stop())
            {
                warn!(client_id = client, sensor_id = %sensor_id, error = %e, "release on disconnect failed");
            }
        }
        info!(client_id = client, "client disconnected");
        Ok(())
    }

    /// Starts `sensor_id` for `client`. Only the client's first start reaches
    /// the sensor's reference count.
    pub fn start_sensor(&self, client: ClientId, sensor_id: SensorId) -> HubResult<()> {
        let sensor = self.sensor(sensor_id)?.sensor();
        if !self.ctx.clients.start_usage(client, sensor_id)? {
            return Ok(());
        }
        if let Err(e) = sensor.start() {
            self.ctx.clients.stop_usage(client, sensor_id)?;
            warn!(client_id = client, sensor_id = %sensor_id, error = %e, "start failed");
            return Err(e.into());
        }
        let interval = self
            .ctx
            .clients
            .get_usage(client, sensor_id)
            .map_or(0, |u| u.interval_ms);
        if interval > 0 {
            sensor.add_interval(client, interval, IntervalOrigin::Direct)?;
        }
        info!(client_id = client, sensor = %sensor.name(), "sensor started for client");
        Ok(())
    }

    /// Stops `sensor_id` for `client`, flushing the client's pending batch
    /// first.
    pub fn stop_sensor(&self, client: ClientId, sensor_id: SensorId) -> HubResult<()> {
        let sensor = self.sensor(sensor_id)?.sensor();
        if !self.ctx.clients.stop_usage(client, sensor_id)? {
            return Ok(());
        }
        self.dispatcher.flush_client(client);
        sensor.delete_interval(client, IntervalOrigin::Direct)?;
        sensor.stop()?;
        info!(client_id = client, sensor = %sensor.name(), "sensor stopped for client");
        self.drop_idle_usage(client, sensor_id)
    }

    /// Forgets a usage that is stopped and listens to nothing. The client
    /// record goes with its last usage unless an event channel is attached.
    fn drop_idle_usage(&self, client: ClientId, sensor_id: SensorId) -> HubResult<()> {
        let idle = self
            .ctx
            .clients
            .get_usage(client, sensor_id)
            .is_some_and(|u| !u.started && u.event_types.is_empty());
        if idle {
            self.ctx.clients.remove_usage(client, sensor_id)?;
            debug!(client_id = client, sensor_id = %sensor_id, "idle usage removed");
        }
        Ok(())
    }

    /// Subscribes the client to `event_type`. A recorded event type replays
    /// its last cached event right away.
    pub fn register_event(
        &self,
        client: ClientId,
        sensor_id: SensorId,
        event_type: EventType,
    ) -> HubResult<()> {
        let sensor = self.sensor(sensor_id)?.sensor();
        if !sensor.event_types().contains(&event_type) {
            return Err(SensorError::UnsupportedEvent(event_type.0).into());
        }
        if !self.ctx.clients.register_event(client, sensor_id, event_type)? {
            return Ok(());
        }
        if let Some(last) = self
            .ctx
            .cache
            .last(event_type)
            .filter(|e| e.sensor_id == sensor_id)
        {
            debug!(client_id = client, event_type = %event_type, "replaying last event");
            self.dispatcher.send(client, &encode_event(&last));
        }
        Ok(())
    }

    pub fn unregister_event(
        &self,
        client: ClientId,
        sensor_id: SensorId,
        event_type: EventType,
    ) -> HubResult<()> {
        self.sensor(sensor_id)?;
        self.ctx.clients.unregister_event(client, sensor_id, event_type)?;
        self.drop_idle_usage(client, sensor_id)
    }

    /// Requests a delivery interval; zero withdraws the request.
    pub fn set_interval(&self, client: ClientId, sensor_id: SensorId, interval_ms: u32) -> HubResult<()> {
        let sensor = self.sensor(sensor_id)?.sensor();
        self.ctx.clients.set_interval(client, sensor_id, interval_ms)?;
        let started = self
            .ctx
            .clients
            .get_usage(client, sensor_id)
            .is_some_and(|u| u.started);
        if !started {
            return Ok(());
        }
        if interval_ms > 0 {
            sensor.add_interval(client, interval_ms, IntervalOrigin::Direct)?;
        } else {
            sensor.delete_interval(client, IntervalOrigin::Direct)?;
        }
        Ok(())
    }

    /// Sets the batch latency of one usage; zero switches back to immediate
    /// delivery and flushes what is pending.
    pub fn set_batch_latency(&self, client: ClientId, sensor_id: SensorId, latency_ms: u32) -> HubResult<()> {
        self.sensor(sensor_id)?;
        self.ctx.clients.set_latency(client, sensor_id, latency_ms)?;
        if latency_ms == 0 {
            self.dispatcher.flush_client(client);
        }
        Ok(())
    }

    pub fn set_option(&self, client: ClientId, sensor_id: SensorId, option: SensorOption) -> HubResult<()> {
        self.sensor(sensor_id)?;
        self.ctx.clients.set_option(client, sensor_id, option)?;
        Ok(())
    }

    pub fn set_screen_off(&self, screen_off: bool) {
        self.ctx.clients.set_screen_off(screen_off);
    }

    pub fn set_power_save(&self, power_save: bool) {
        self.ctx.clients.set_power_save(power_save);
    }

    /// Latest value of `event_type`. Virtual sensors recompute it from their
    /// upstream sensors.
    pub fn get_data(&self, sensor_id: SensorId, event_type: EventType) -> HubResult<Sample> {
        Ok(self.sensor(sensor_id)?.sensor().get_sensor_data(event_type)?)
    }

    pub fn sensor_list(&self) -> Vec<SensorListEntry> {
        self.ctx.registry.sensor_list()
    }

    pub fn sensor_list_json(&self) -> HubResult<Vec<u8>> {
        Ok(encode_sensor_list(&self.sensor_list())?)
    }

    /// Writes out the client's pending batch now.
    pub fn flush(&self, client: ClientId) -> HubResult<()> {
        self.known_client(client)?;
        self.dispatcher.flush_client(client);
        Ok(())
    }

    pub fn is_sensor_used(&self, sensor_id: SensorId) -> bool {
        self.ctx.clients.is_sensor_used(sensor_id)
    }

    /// Queues an event as if a poll thread had read it.
    pub fn inject_event(&self, event: Event) -> HubResult<()> {
        self.events
            .send(Dispatch::Event(event))
            .map_err(|_| HubError::Stopped)
    }

    /// Stops the poll threads, lets the dispatcher drain what they queued,
    /// flushes pending batches and joins every thread.
    pub fn shutdown(&mut self) {
        let Some(dispatcher) = self.dispatcher_thread.take() else {
            return;
        };
        self.poll_shutdown.take();
        for handle in self.poll_threads.drain(..) {
            if handle.join().is_err() {
                warn!("poll thread panicked");
            }
        }
        // The queue is FIFO, so everything sent before this is dispatched.
        if self.events.send(Dispatch::Shutdown).is_err() {
            debug!("dispatcher already gone");
        }
        if dispatcher.join().is_err() {
            warn!("dispatcher thread panicked");
        }
        info!("sensor hub stopped");
    }
}

impl Drop for SensorHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}
