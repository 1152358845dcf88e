//! Frame transport for the CDP socket client
//!
//! A transport moves whole text frames between the client and the browser.
//! It owns no protocol knowledge: the session above it decides what a frame
//! means.
//!
//! # Example
//!
//! ```no_run
//! use cdp_transport::{Transport, TransportConfig, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = WebSocketTransport::new(TransportConfig::default());
//!     let mut connection = transport
//!         .connect("ws://127.0.0.1:9222/devtools/browser")
//!         .await?;
//!
//!     connection
//!         .writer
//!         .write_frame(r#"{"id":1,"method":"Browser.getVersion","params":{}}"#.to_string())
//!         .await?;
//!     let reply = connection.reader.read_frame().await?;
//!     println!("{:?}", reply);
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod error;
pub mod mock;
pub mod transport;
pub mod websocket;

// Re-export main types
pub use config::TransportConfig;
pub use error::{Result, TransportError};
pub use mock::MockTransport;
pub use transport::{validate_message_size, Connection, FrameReader, FrameWriter, Transport};
pub use websocket::WebSocketTransport;
