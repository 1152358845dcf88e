//! Error types for CDP transports

use thiserror::Error;

/// Errors that can occur while moving frames
#[derive(Error, Debug)]
pub enum TransportError {
    /// WebSocket error (boxed to reduce size)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tungstenite::Error>),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL the transport cannot dial
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Handshake did not finish in time
    #[error("Connection to {0} timed out after {1} ms")]
    ConnectTimeout(String, u64),

    /// Message too large
    #[error("Message size {0} exceeds limit {1}")]
    MessageTooLarge(usize, usize),

    /// Connection refused or otherwise unavailable
    #[error("Connection refused: {0}")]
    Refused(String),

    /// Frame written after the connection was closed
    #[error("Connection is closed")]
    Closed,
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::MessageTooLarge(2048, 1024);
        assert_eq!(err.to_string(), "Message size 2048 exceeds limit 1024");

        let err = TransportError::ConnectTimeout("ws://127.0.0.1:9222".to_string(), 500);
        assert_eq!(
            err.to_string(),
            "Connection to ws://127.0.0.1:9222 timed out after 500 ms"
        );
    }

    #[test]
    fn test_websocket_error_is_boxed() {
        let err: TransportError = Box::new(tungstenite::Error::ConnectionClosed).into();
        assert!(matches!(err, TransportError::WebSocket(_)));
    }
}
