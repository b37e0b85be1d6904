//! Shared application state for the HTTP server.

use crate::config::ServerConfig;
use crate::store::Broadcaster;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Latest reading plus subscriber fan-out.
    pub broadcaster: Arc<Broadcaster>,

    /// Deadline for one WebSocket write.
    pub send_timeout: Duration,
}

impl AppState {
    /// Creates app state with a fresh broadcaster sized from `config`.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_broadcaster(
            Arc::new(Broadcaster::with_queue_capacity(config.queue_capacity)),
            config,
        )
    }

    /// Creates app state around an existing broadcaster.
    pub fn with_broadcaster(broadcaster: Arc<Broadcaster>, config: &ServerConfig) -> Self {
        Self {
            broadcaster,
            send_timeout: config.send_timeout,
        }
    }
}
