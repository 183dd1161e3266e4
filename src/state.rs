use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::gateway::{PaymentGateway, SandboxGateway};
use crate::locator::{DriverLocator, StoreLocator};
use crate::models::event::RideEvent;
use crate::observability::metrics::Metrics;
use crate::store::memory::InMemoryStore;
use crate::store::StateStore;

/// Everything an engine operation needs. Holds no per-request identity:
/// the acting user is always passed explicitly.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn StateStore>,
    pub locator: Arc<dyn DriverLocator>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub clock: Arc<dyn Clock>,
    pub ride_events_tx: broadcast::Sender<RideEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn StateStore>,
        locator: Arc<dyn DriverLocator>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (ride_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size.max(1));

        Self {
            config,
            store,
            locator,
            gateway,
            clock,
            ride_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// In-memory store, store-backed locator, sandbox gateway.
    pub fn in_memory(config: Config) -> Self {
        Self::in_memory_with_clock(config, Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let locator = Arc::new(StoreLocator::new(store.clone()));
        Self::new(config, store, locator, Arc::new(SandboxGateway), clock)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
