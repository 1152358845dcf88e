//! Inbound frame envelope parsing and outbound command encoding
//!
//! Only the envelope (`id`, `method`) is decoded strictly. `result` and
//! `params` are kept as raw JSON for the recipient, and a peer `error` that
//! does not have the usual `{code, message}` shape still fails its command.

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::errors::{CdpError, FrameError};
use crate::payload::Payload;
use crate::{CdpRequest, CommandId};

/// Envelope fields shared by every inbound frame
#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    /// Correlating id (responses only)
    #[serde(default)]
    pub id: Option<CommandId>,
    /// Event name (events only)
    #[serde(default)]
    pub method: Option<String>,
    /// Command result, left undecoded
    #[serde(default)]
    pub result: Option<Box<RawValue>>,
    /// Event parameters, left undecoded
    #[serde(default)]
    pub params: Option<Box<RawValue>>,
    /// Peer-reported command failure, decoded during classification
    #[serde(default)]
    pub error: Option<Box<RawValue>>,
}

impl InboundEnvelope {
    /// Classify the envelope as a response or an event.
    ///
    /// A present, non-zero id wins: the frame is a response even if it also
    /// carries a method. Otherwise a method makes it an event.
    pub fn classify(self) -> Result<InboundFrame, FrameError> {
        match (self.id, self.method) {
            (Some(id), _) if id != 0 => Ok(InboundFrame::Response(ResponseFrame {
                id,
                result: self.result.map(Payload::from_raw).unwrap_or_default(),
                error: self.error.as_deref().map(decode_peer_error),
            })),
            (_, Some(method)) => Ok(InboundFrame::Event(EventFrame {
                method,
                params: self.params.map(Payload::from_raw).unwrap_or_default(),
            })),
            (id, None) => Err(FrameError::Unclassifiable(format!("id={:?}", id))),
        }
    }
}

/// Decode a peer error object, falling back to -32603 with the raw object
/// as `data` when it is not `{code, message[, data]}`
fn decode_peer_error(raw: &RawValue) -> CdpError {
    if let Ok(error) = serde_json::from_str::<CdpError>(raw.get()) {
        return error;
    }

    let data = serde_json::from_str::<serde_json::Value>(raw.get())
        .unwrap_or_else(|_| serde_json::Value::String(raw.get().to_string()));
    let message = data
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Malformed error object")
        .to_string();
    CdpError::internal_error(message, data)
}

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply correlated with an outstanding command
    Response(ResponseFrame),
    /// Unsolicited server-pushed event
    Event(EventFrame),
}

/// Reply to a command
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    /// Id of the command this answers
    pub id: CommandId,
    /// Undecoded `result`
    pub result: Payload,
    /// Peer-reported failure, if any
    pub error: Option<CdpError>,
}

impl ResponseFrame {
    /// The command's outcome: the result payload, or the peer's error
    pub fn into_outcome(self) -> Result<Payload, CdpError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result),
        }
    }
}

/// Server-pushed event
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    /// Event name in format "Domain.event"
    pub method: String,
    /// Undecoded `params`
    pub params: Payload,
}

impl EventFrame {
    /// Domain part of the event name ("Page" for "Page.loadEventFired")
    pub fn domain(&self) -> Option<&str> {
        self.method.split_once('.').map(|(domain, _)| domain)
    }
}

/// Parse and classify one inbound text frame
pub fn parse_inbound_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let envelope: InboundEnvelope = serde_json::from_str(text)?;
    envelope.classify()
}

/// Serialize an outbound command frame
pub fn serialize_command(request: &CdpRequest) -> Result<String, FrameError> {
    serde_json::to_string(request).map_err(FrameError::from)
}
