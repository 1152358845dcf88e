//! CDP socket client
//!
//! One entry point for the workspace crates: wire types from [`types`],
//! transports from [`transport`] and the session core re-exported at the
//! top level.
//!
//! ```no_run
//! use cdp_socket::{SessionConfig, SocketSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SocketSession::websocket(SessionConfig::for_url(
//!         "ws://127.0.0.1:9222/devtools/browser",
//!     ));
//!     session.connect().await?;
//!
//!     let mut targets = session.listen("Target.targetCreated");
//!     session
//!         .send_command("Target.setDiscoverTargets", serde_json::json!({"discover": true}))
//!         .await?;
//!
//!     while let Some(event) = targets.recv().await {
//!         println!("{}", event.params.as_str());
//!     }
//!     Ok(())
//! }
//! ```

pub use cdp_session::*;

/// Wire frames, payloads and the typed command/event traits
pub mod types {
    pub use cdp_types::*;
}

/// Frame transports
pub mod transport {
    pub use cdp_transport::*;
}

pub use cdp_types::{CdpError, Command, Event, EventFrame, Payload};
