// CDP wire frames, payloads, and error definitions
//
// This module is the envelope layer of the CDP socket client. It knows the
// shape of a frame (id, method, result/params, error) and nothing about the
// domain-specific payloads carried inside.

pub mod command;
pub mod errors;
pub mod frame;
pub mod payload;

// Re-export commonly used types
pub use command::{Command, Event};
pub use errors::{CdpError, FrameError};
pub use frame::{
    parse_inbound_frame, serialize_command, EventFrame, InboundEnvelope, InboundFrame,
    ResponseFrame,
};
pub use payload::Payload;

use serde::{Deserialize, Serialize};

/// Identifier correlating a command with its response.
///
/// Zero is never allocated to a command; frames without an id (or with id 0)
/// are events.
pub type CommandId = u64;

/// CDP Request message
/// Represents a command sent from the client to the browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CdpRequest {
    /// Unique identifier for this request
    pub id: CommandId,
    /// Method name in format "Domain.method"
    pub method: String,
    /// Optional parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl CdpRequest {
    /// Build an outbound command frame.
    ///
    /// A `null` params value is sent as an empty object, which is what the
    /// browser expects for parameterless methods.
    pub fn command(id: CommandId, method: impl Into<String>, params: serde_json::Value) -> Self {
        let params = if params.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            params
        };

        Self {
            id,
            method: method.into(),
            params: Some(params),
        }
    }
}

/// CDP Response message
/// Represents a reply from the browser to a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CdpResponse {
    /// Request ID this response corresponds to
    pub id: CommandId,
    /// Result of the method call (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information (if method failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<errors::CdpError>,
}

impl CdpResponse {
    /// Successful reply carrying `result`
    pub fn success(id: CommandId, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed reply carrying `error`
    pub fn failure(id: CommandId, error: CdpError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// CDP Event message
/// Represents an unsolicited event pushed by the browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CdpEvent {
    /// Event name in format "Domain.event"
    pub method: String,
    /// Event parameters
    pub params: serde_json::Value,
}

impl CdpEvent {
    /// Create a new event frame
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_shape() {
        let request = CdpRequest::command(7, "Page.navigate", json!({"url": "about:blank"}));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({"id": 7, "method": "Page.navigate", "params": {"url": "about:blank"}})
        );
    }

    #[test]
    fn test_command_null_params_become_object() {
        let request = CdpRequest::command(1, "Page.enable", serde_json::Value::Null);
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"params\":{}"));
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let response = CdpResponse::success(3, json!({"frameId": "F1"}));
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"id\":3"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_event_basic() {
        let event = CdpEvent::new("Network.requestWillBeSent", json!({"requestId": "123"}));

        assert_eq!(event.method, "Network.requestWillBeSent");
        assert_eq!(event.params["requestId"], "123");
    }
}
