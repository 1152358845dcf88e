//! Command/response correlation
//!
//! Tracks outstanding commands by id and delivers each response to its
//! waiting caller exactly once. Delivery always happens after the map lock
//! is released.

use cdp_types::{CommandId, Payload};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{Result, SessionError};

/// What a waiting command eventually receives
pub type CommandOutcome = Result<Payload>;

/// Where a command's outcome is delivered
pub type DeliveryTarget = oneshot::Sender<CommandOutcome>;

#[derive(Debug, Default)]
struct CorrelatorState {
    pending: HashMap<CommandId, DeliveryTarget>,
    /// Set by `resolve_all`; registration is refused until `reopen`
    closed: bool,
}

/// Registry of outstanding commands
#[derive(Debug, Default)]
pub struct Correlator {
    state: Mutex<CorrelatorState>,
}

impl Correlator {
    /// Create an empty, open correlator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` as outstanding
    ///
    /// Fails with [`SessionError::DuplicateCommandId`] if `id` is already
    /// registered, and with [`SessionError::SessionClosed`] once the
    /// correlator has been drained by teardown.
    pub fn register(&self, id: CommandId, target: DeliveryTarget) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SessionError::SessionClosed);
        }
        if state.pending.contains_key(&id) {
            return Err(SessionError::DuplicateCommandId(id));
        }
        state.pending.insert(id, target);
        trace!("Registered command {}", id);
        Ok(())
    }

    /// Deliver `outcome` to the command registered under `id`
    ///
    /// Returns `false` if no such command is outstanding (unknown id, or
    /// already resolved).
    pub fn resolve(&self, id: CommandId, outcome: CommandOutcome) -> bool {
        let target = self.state.lock().pending.remove(&id);
        match target {
            Some(target) => {
                // The caller may have dropped its future; the id is still consumed
                let _ = target.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding command and refuse new registrations
    pub fn resolve_all(&self, make_error: impl Fn() -> SessionError) -> usize {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.pending.drain().collect()
        };

        let count = drained.len();
        for (_, target) in drained {
            let _ = target.send(Err(make_error()));
        }
        count
    }

    /// Accept registrations again after a teardown
    pub fn reopen(&self) {
        self.state.lock().closed = false;
    }

    /// Drop a registration without delivering anything
    pub fn forget(&self, id: CommandId) -> bool {
        self.state.lock().pending.remove(&id).is_some()
    }

    /// Whether `id` is outstanding
    pub fn is_pending(&self, id: CommandId) -> bool {
        self.state.lock().pending.contains_key(&id)
    }

    /// Number of outstanding commands
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether registration is currently refused
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
