use crate::batch::BatchBuffers;
use crate::cache::EventCache;
use crate::config::HubConfig;
use crate::registry::SensorRegistry;
use sensor_clients::ClientRegistry;
use sensor_wire::EventSink;
use std::sync::Arc;

pub type ClientSink = Arc<dyn EventSink>;

/// The single instance of every shared hub component, built once at startup
/// and handed to the dispatcher, the poll threads and the request handlers.
pub struct AppContext {
    pub config: HubConfig,
    pub registry: SensorRegistry,
    pub clients: ClientRegistry<ClientSink>,
    pub cache: EventCache,
    pub batches: BatchBuffers,
}

impl AppContext {
    pub fn new(config: HubConfig, registry: SensorRegistry) -> Self {
        Self {
            cache: EventCache::new(&config.dispatcher.record_event_types),
            batches: BatchBuffers::new(config.dispatcher.max_batch_events),
            clients: ClientRegistry::new(),
            registry,
            config,
        }
    }
}
