//! Shared HTTP client utilities

use crate::{EgressError, Result};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Forwarder and HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Deadline for a whole downstream exchange (send and body read)
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Idle pooled connections are closed after this many seconds
    pub pool_idle_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 10,
            pool_idle_timeout_secs: 30,
            user_agent: format!("Clover/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ForwarderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Create a configured HTTP client with connection pooling
///
/// No client-level timeout is set; the forwarder owns the deadline.
pub fn create_client(config: &ForwarderConfig) -> Result<Client> {
    if config.request_timeout_secs == 0 {
        return Err(EgressError::Config(
            "request_timeout_secs must be greater than zero".to_string(),
        ));
    }

    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .user_agent(&config.user_agent)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| EgressError::Config(format!("Failed to create HTTP client: {}", e)))
}
