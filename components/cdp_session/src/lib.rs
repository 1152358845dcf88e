//! Command/event dispatch core of the CDP socket client
//!
//! A [`SocketSession`] multiplexes many in-flight commands over one
//! connection: every command gets a unique id, its response is routed back
//! to the caller that sent it, and server-pushed events are fanned out to
//! every handler subscribed to their name.
//!
//! # Example
//!
//! ```no_run
//! use cdp_session::{SessionConfig, SocketSession};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SocketSession::websocket(SessionConfig::default());
//!     session.connect().await?;
//!
//!     let version = session.send_command("Browser.getVersion", json!({})).await?;
//!     println!("{}", version.as_str());
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod anomaly;
pub mod broadcaster;
pub mod config;
pub mod correlator;
pub mod error;
pub mod id_allocator;
pub mod session;
mod writer;

// Re-export main types
pub use anomaly::{Anomaly, AnomalyReporter};
pub use broadcaster::{EventBroadcaster, EventStream, Subscription, SubscriptionId};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use correlator::{CommandOutcome, Correlator, DeliveryTarget};
pub use error::{Result, SessionError};
pub use id_allocator::IdAllocator;
pub use session::{PendingCommand, SessionId, SessionState, SocketSession};
