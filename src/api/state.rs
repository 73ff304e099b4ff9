//! Application State
//!
//! Shared state accessible by all handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::config::Config;
use crate::relay::{LifecycleController, Registry};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
pub struct AppState {
    /// Lifecycle controller driving the relay core
    pub controller: Arc<LifecycleController>,
    /// Server configuration
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(Registry::new(config.server.max_connections));
        Self {
            controller: Arc::new(LifecycleController::new(registry)),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.controller.registry().size().await
    }
}
