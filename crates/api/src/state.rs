use std::sync::Arc;

use runcast_core::relay::ProcessRelay;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Process relay: global subscriber slot and job registry.
    pub relay: ProcessRelay,
}

impl AppState {
    /// Build the state and the relay it owns from configuration.
    pub fn new(config: ServerConfig) -> Self {
        let relay = ProcessRelay::new(config.relay.clone());
        Self {
            config: Arc::new(config),
            relay,
        }
    }
}
