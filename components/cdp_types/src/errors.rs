// CDP Error types
// The peer's error object (JSON-RPC 2.0 codes) and envelope failures

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error object reported by the browser for a failed command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CdpError {
    /// Error code (JSON-RPC standard codes, -32000 for most CDP failures)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Additional error data (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for CdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDP Error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({})", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for CdpError {}

impl CdpError {
    /// Create a new CDP error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::with_data(
            -32601,
            "Method not found",
            serde_json::json!({ "method": method }),
        )
    }

    /// Invalid params (-32602)
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::with_data(
            -32602,
            "Invalid params",
            serde_json::Value::String(details.into()),
        )
    }

    /// Internal error (-32603)
    pub fn internal_error(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self::with_data(-32603, message, data)
    }

    /// Generic server-side failure (-32000), the code the browser uses for
    /// most command errors ("No node with given id found", ...)
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(-32000, message)
    }
}

/// Failure to encode or classify a frame envelope
#[derive(Error, Debug)]
pub enum FrameError {
    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Frame is valid JSON but carries neither a correlating id nor a method
    #[error("Frame has neither an id nor a method: {0}")]
    Unclassifiable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CdpError::method_not_found("test").code, -32601);
        assert_eq!(CdpError::invalid_params("bad").code, -32602);
        assert_eq!(CdpError::server_error("gone").code, -32000);
        assert_eq!(CdpError::internal_error("odd", serde_json::json!({})).code, -32603);
    }

    #[test]
    fn test_error_display() {
        let error = CdpError::new(-32000, "No node with given id found");
        assert_eq!(error.to_string(), "CDP Error -32000: No node with given id found");

        let error = CdpError::with_data(-32602, "Invalid params", serde_json::json!("url"));
        assert_eq!(error.to_string(), "CDP Error -32602: Invalid params (\"url\")");
    }

    #[test]
    fn test_error_deserialization_without_data() {
        let error: CdpError =
            serde_json::from_str(r#"{"code": -32601, "message": "'Foo.bar' wasn't found"}"#)
                .unwrap();

        assert_eq!(error.code, -32601);
        assert!(error.data.is_none());
    }
}
