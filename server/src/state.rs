//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::poi::OverpassClient;
use crate::store::LocationStore;

/// Shared application state for the lastseen server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup, hidden zones included.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Last-known location and battery.
    pub store: LocationStore,
    /// Nearby POI lookup used when no hidden zone matches.
    pub overpass: OverpassClient,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, store: LocationStore, overpass: OverpassClient) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            store,
            overpass,
        }
    }
}
