//! Error types for CDP sessions

use cdp_transport::TransportError;
use cdp_types::{CdpError, CommandId, FrameError};
use thiserror::Error;

use crate::session::SessionState;

/// Errors that can occur in session operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// Transport failed to connect or to write a frame
    #[error("Connection error: {0}")]
    Connection(#[from] TransportError),

    /// Transport dropped while the command was outstanding
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The browser answered the command with an error object
    #[error("{0}")]
    Protocol(CdpError),

    /// Session is closed
    #[error("Session is closed")]
    SessionClosed,

    /// Command issued before the session connected
    #[error("Session is not connected (state: {0:?})")]
    NotConnected(SessionState),

    /// Connect called on a session that is not disconnected
    #[error("Session is already connected")]
    AlreadyConnected,

    /// Command id registered twice
    #[error("Command id {0} is already pending")]
    DuplicateCommandId(CommandId),

    /// Command id counter ran out
    #[error("Command id space exhausted")]
    IdSpaceExhausted,

    /// Params could not be encoded or a result could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound frame could not be built
    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),
}

impl SessionError {
    /// The browser's error object, when the command itself failed
    pub fn protocol_error(&self) -> Option<&CdpError> {
        match self {
            SessionError::Protocol(error) => Some(error),
            _ => None,
        }
    }

    /// Whether the error means the session can no longer carry commands
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::SessionClosed
                | SessionError::ConnectionLost(_)
                | SessionError::Connection(_)
        )
    }
}

impl From<CdpError> for SessionError {
    fn from(error: CdpError) -> Self {
        SessionError::Protocol(error)
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
