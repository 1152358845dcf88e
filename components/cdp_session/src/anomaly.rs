//! Non-fatal anomalies observed by a session
//!
//! Orphan responses, undecodable frames and misbehaving subscribers do not
//! stop the session. They are logged and published here so callers can
//! watch for them.

use cdp_types::CommandId;
use tokio::sync::broadcast;
use tracing::warn;

use crate::broadcaster::SubscriptionId;
use crate::session::SessionId;

/// Something unexpected the session survived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// A response carried an id with no outstanding command
    OrphanResponse {
        /// Id found in the frame
        id: CommandId,
    },
    /// A frame could not be decoded into an envelope
    MalformedFrame {
        /// Decoder error
        reason: String,
    },
    /// An event handler panicked
    HandlerPanic {
        /// Event being handled
        method: String,
        /// Subscription whose handler panicked
        subscription: SubscriptionId,
    },
    /// A subscriber's queue was full and an event was dropped for it
    SubscriberLagged {
        /// Event that was dropped
        method: String,
        /// Subscription that missed it
        subscription: SubscriptionId,
    },
}

/// Logs anomalies and publishes them to observers
#[derive(Debug, Clone)]
pub struct AnomalyReporter {
    session: SessionId,
    tx: broadcast::Sender<Anomaly>,
}

impl AnomalyReporter {
    /// Create a reporter buffering up to `capacity` anomalies per observer
    pub fn new(session: SessionId, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { session, tx }
    }

    /// Record an anomaly
    pub fn report(&self, anomaly: Anomaly) {
        match &anomaly {
            Anomaly::OrphanResponse { id } => {
                warn!("Session {}: response for unknown command {}", self.session, id)
            }
            Anomaly::MalformedFrame { reason } => {
                warn!("Session {}: dropping malformed frame: {}", self.session, reason)
            }
            Anomaly::HandlerPanic {
                method,
                subscription,
            } => warn!(
                "Session {}: handler {} panicked while handling {}",
                self.session, subscription, method
            ),
            Anomaly::SubscriberLagged {
                method,
                subscription,
            } => warn!(
                "Session {}: subscriber {} is lagging, dropped {}",
                self.session, subscription, method
            ),
        }

        // No observers is fine
        let _ = self.tx.send(anomaly);
    }

    /// Observe anomalies reported from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Anomaly> {
        self.tx.subscribe()
    }
}
