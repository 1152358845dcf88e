//! Command id allocation

use cdp_types::CommandId;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, SessionError};

const FIRST_ID: CommandId = 1;

/// Hands out command ids, unique for the life of the session.
///
/// Ids start at 1 (0 marks an event on the wire) and never wrap: running out
/// is reported as [`SessionError::IdSpaceExhausted`].
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Create an allocator starting at 1
    pub fn new() -> Self {
        Self::starting_at(FIRST_ID)
    }

    pub(crate) fn starting_at(first: CommandId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate the next id
    pub fn next(&self) -> Result<CommandId> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| SessionError::IdSpaceExhausted)
    }

    /// The id the next call will hand out
    pub fn peek(&self) -> CommandId {
        self.next.load(Ordering::SeqCst)
    }

    /// Restart the id space. Only valid once no command is outstanding.
    pub fn reset(&self) {
        self.next.store(FIRST_ID, Ordering::SeqCst);
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
