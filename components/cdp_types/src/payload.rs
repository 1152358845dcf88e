//! Undecoded frame payloads
//!
//! The socket core never inspects `result` or `params`; it hands them to the
//! recipient as raw JSON and lets the recipient decode into whatever shape
//! it expects.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use std::fmt;
use std::sync::Arc;

const NULL_JSON: &str = "null";

/// Raw JSON payload of a response result or an event's params.
///
/// Cloning is cheap, so one event payload can be fanned out to every
/// subscriber without copying the text.
#[derive(Clone, Default)]
pub struct Payload(Option<Arc<RawValue>>);

impl Payload {
    /// Payload for a frame that carried no `result`/`params`
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wrap a raw value borrowed out of a parsed envelope
    pub fn from_raw(raw: Box<RawValue>) -> Self {
        Self(Some(Arc::from(raw)))
    }

    /// Serialize `value` into a payload
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self::from_raw)
    }

    /// Whether the frame omitted the payload entirely
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// The raw JSON text (`null` when absent)
    pub fn as_str(&self) -> &str {
        self.0.as_deref().map(RawValue::get).unwrap_or(NULL_JSON)
    }

    /// Decode into the recipient's expected shape
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.as_str())
    }

    /// Decode into an untyped JSON value
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        self.decode()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.as_str()).finish()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
