//! Typed command and event seams
//!
//! Domain wrappers describe each method once, as a type, and the session
//! does the envelope work:
//!
//! ```
//! use cdp_types::{Command, Event};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! #[serde(rename_all = "camelCase")]
//! struct Navigate {
//!     url: String,
//! }
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct NavigateReturns {
//!     frame_id: String,
//! }
//!
//! impl Command for Navigate {
//!     const METHOD: &'static str = "Page.navigate";
//!     type Response = NavigateReturns;
//! }
//!
//! #[derive(Deserialize)]
//! struct LoadEventFired {
//!     timestamp: f64,
//! }
//!
//! impl Event for LoadEventFired {
//!     const NAME: &'static str = "Page.loadEventFired";
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A CDP method with typed params (`Self`) and a typed result
pub trait Command: Serialize {
    /// Method name in format "Domain.method"
    const METHOD: &'static str;

    /// Shape of the `result` object
    type Response: DeserializeOwned;
}

/// A CDP event with typed params (`Self`)
pub trait Event: DeserializeOwned + Send + 'static {
    /// Event name in format "Domain.event"
    const NAME: &'static str;
}
