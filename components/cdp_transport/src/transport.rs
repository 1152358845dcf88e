//! Transport boundary traits

use async_trait::async_trait;

use crate::error::{Result, TransportError};

/// Dials a peer and yields a connection split into its two halves
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a connection to `url`
    async fn connect(&self, url: &str) -> Result<Connection>;
}

/// Writing half of a connection
#[async_trait]
pub trait FrameWriter: Send {
    /// Send one whole text frame
    async fn write_frame(&mut self, frame: String) -> Result<()>;

    /// Close the connection. Closing an already closed connection is not an error.
    async fn close(&mut self) -> Result<()>;
}

/// Reading half of a connection
///
/// Only one task may read a connection; the split into halves makes the
/// single reader an ownership fact.
#[async_trait]
pub trait FrameReader: Send {
    /// Next text frame, or `None` once the peer closed the connection
    async fn read_frame(&mut self) -> Result<Option<String>>;
}

/// An established connection
pub struct Connection {
    /// Outbound half, shared by command senders
    pub writer: Box<dyn FrameWriter>,
    /// Inbound half, owned by the pump loop
    pub reader: Box<dyn FrameReader>,
}

impl Connection {
    /// Assemble a connection from its halves
    pub fn new(writer: impl FrameWriter + 'static, reader: impl FrameReader + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            reader: Box::new(reader),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Validate message size
pub fn validate_message_size(message: &str, max_size: usize) -> Result<()> {
    let size = message.len();
    if size > max_size {
        Err(TransportError::MessageTooLarge(size, max_size))
    } else {
        Ok(())
    }
}
