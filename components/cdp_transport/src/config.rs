//! Transport configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a frame transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportConfig {
    /// Maximum inbound message size in bytes (default 100MB)
    pub max_message_size: usize,

    /// Handshake timeout in milliseconds (`None` waits indefinitely)
    pub connect_timeout_ms: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: 100 * 1024 * 1024, // 100MB
            connect_timeout_ms: Some(30_000),
        }
    }
}

impl TransportConfig {
    /// Create a new transport configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set handshake timeout (`None` disables it)
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// Handshake timeout as a duration
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.max_message_size, 100 * 1024 * 1024);
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_builder_pattern() {
        let config = TransportConfig::new()
            .with_max_message_size(1024)
            .with_connect_timeout(None);

        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: TransportConfig = serde_json::from_str(r#"{"maxMessageSize": 4096}"#).unwrap();

        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.connect_timeout_ms, Some(30_000));
    }
}
