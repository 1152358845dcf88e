//! Session configuration

use cdp_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a socket session
///
/// Fields are read through accessors; build custom values with
/// [`SessionConfig::builder`] or deserialize them from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// WebSocket debugger URL of the browser or target
    url: String,

    /// Transport settings (message size limit, handshake timeout)
    transport: TransportConfig,

    /// Events buffered per subscription before new ones are dropped
    event_queue_capacity: usize,

    /// Anomalies buffered per observer
    anomaly_capacity: usize,
}

impl SessionConfig {
    /// Create a new builder for SessionConfig
    ///
    /// # Example
    ///
    /// ```
    /// use cdp_session::SessionConfig;
    ///
    /// let config = SessionConfig::builder()
    ///     .url("ws://127.0.0.1:9222/devtools/page/ABC")
    ///     .event_queue_capacity(64)
    ///     .build();
    /// assert_eq!(config.event_queue_capacity(), 64);
    /// ```
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Default configuration pointed at `url`
    pub fn for_url(url: impl Into<String>) -> Self {
        Self::builder().url(url).build()
    }

    /// Get the debugger URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the transport settings
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Get the per-subscription queue capacity
    pub fn event_queue_capacity(&self) -> usize {
        self.event_queue_capacity
    }

    /// Get the per-observer anomaly buffer
    pub fn anomaly_capacity(&self) -> usize {
        self.anomaly_capacity
    }
}

impl Default for SessionConfig {
    /// Default values:
    /// - url: "ws://127.0.0.1:9222/devtools/browser"
    /// - transport: 100 MB messages, 30 s handshake timeout
    /// - event_queue_capacity: 1024
    /// - anomaly_capacity: 256
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9222/devtools/browser".to_string(),
            transport: TransportConfig::default(),
            event_queue_capacity: 1024,
            anomaly_capacity: 256,
        }
    }
}

/// Builder for SessionConfig
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    url: Option<String>,
    max_message_size: Option<usize>,
    connect_timeout: Option<Option<Duration>>,
    event_queue_capacity: Option<usize>,
    anomaly_capacity: Option<usize>,
}

impl SessionConfigBuilder {
    /// Set the debugger URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set maximum inbound message size in bytes
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Set the handshake timeout (`None` waits indefinitely)
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set how many events a subscription buffers
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = Some(capacity);
        self
    }

    /// Set how many anomalies an observer buffers
    pub fn anomaly_capacity(mut self, capacity: usize) -> Self {
        self.anomaly_capacity = Some(capacity);
        self
    }

    /// Build the SessionConfig
    ///
    /// Uses default values for any options not explicitly set. Capacities
    /// are at least 1.
    pub fn build(self) -> SessionConfig {
        let default = SessionConfig::default();

        let mut transport = default.transport;
        if let Some(size) = self.max_message_size {
            transport = transport.with_max_message_size(size);
        }
        if let Some(timeout) = self.connect_timeout {
            transport = transport.with_connect_timeout(timeout);
        }

        SessionConfig {
            url: self.url.unwrap_or(default.url),
            transport,
            event_queue_capacity: self
                .event_queue_capacity
                .unwrap_or(default.event_queue_capacity)
                .max(1),
            anomaly_capacity: self
                .anomaly_capacity
                .unwrap_or(default.anomaly_capacity)
                .max(1),
        }
    }
}
