//! Shared application state for Axum handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state, cloned per request.
///
/// The whitelist engine itself lives in the middleware layer; handlers only
/// need configuration and uptime.
#[derive(Clone)]
pub struct AppState {
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            started_at: Instant::now(),
            config: Arc::new(config),
        }
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
