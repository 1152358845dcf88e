//! Event fan-out by method name
//!
//! Every subscription owns a bounded queue. Dispatch only enqueues, so a slow
//! or panicking handler never stalls the pump loop or its siblings. Callback
//! subscriptions get a dedicated worker task that drains the queue in
//! arrival order; stream subscriptions hand the queue to the caller.

use cdp_types::EventFrame;
use dashmap::DashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::anomaly::{Anomaly, AnomalyReporter};

/// Identifier of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned by a subscribe call, used to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: SubscriptionId,
    method: String,
}

impl Subscription {
    /// Subscription id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Event name this subscription listens to
    pub fn method(&self) -> &str {
        &self.method
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    queue: mpsc::Sender<Arc<EventFrame>>,
}

/// Registry of event subscribers keyed by method name
#[derive(Debug)]
pub struct EventBroadcaster {
    registry: DashMap<String, Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    reporter: AnomalyReporter,
}

impl EventBroadcaster {
    /// Create a broadcaster whose subscriber queues hold `queue_capacity` events
    pub fn new(queue_capacity: usize, reporter: AnomalyReporter) -> Self {
        Self {
            registry: DashMap::new(),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
            reporter,
        }
    }

    /// Run `handler` for every `method` event, on its own task
    ///
    /// Subscriptions are additive. A panic inside `handler` is caught,
    /// reported as [`Anomaly::HandlerPanic`], and the subscription keeps
    /// receiving later events. Must be called within a Tokio runtime.
    pub fn subscribe<F>(&self, method: &str, handler: F) -> Subscription
    where
        F: FnMut(Arc<EventFrame>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let subscription = self.register(method, tx);

        tokio::spawn(run_handler(
            subscription.clone(),
            rx,
            handler,
            self.reporter.clone(),
        ));

        subscription
    }

    /// Receive every `method` event through a stream owned by the caller
    ///
    /// Dropping the stream ends the subscription.
    pub fn subscribe_stream(&self, method: &str) -> EventStream {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let subscription = self.register(method, tx);
        EventStream { subscription, rx }
    }

    fn register(&self, method: &str, queue: mpsc::Sender<Arc<EventFrame>>) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .entry(method.to_string())
            .or_default()
            .push(Arc::new(Subscriber { id, queue }));

        debug!("Subscribed {} to {}", id, method);
        Subscription {
            id,
            method: method.to_string(),
        }
    }

    /// Remove exactly this subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let removed = match self.registry.get_mut(subscription.method()) {
            Some(mut subscribers) => {
                let before = subscribers.len();
                subscribers.retain(|s| s.id != subscription.id);
                subscribers.len() != before
            }
            None => false,
        };
        self.registry
            .remove_if(subscription.method(), |_, subscribers| subscribers.is_empty());

        if removed {
            debug!("Unsubscribed {} from {}", subscription.id, subscription.method);
        }
        removed
    }

    /// Hand `frame` to every subscriber of its method
    ///
    /// Returns how many subscribers accepted it. No subscribers is a no-op.
    pub fn dispatch(&self, frame: Arc<EventFrame>) -> usize {
        // Snapshot so the registry lock is not held while enqueueing
        let subscribers: Vec<Arc<Subscriber>> = match self.registry.get(&frame.method) {
            Some(subscribers) => subscribers.value().clone(),
            None => {
                trace!("No subscribers for {}", frame.method);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        for subscriber in subscribers {
            match subscriber.queue.try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => self.reporter.report(Anomaly::SubscriberLagged {
                    method: frame.method.clone(),
                    subscription: subscriber.id,
                }),
                Err(TrySendError::Closed(_)) => gone.push(subscriber.id),
            }
        }

        for id in gone {
            self.unsubscribe(&Subscription {
                id,
                method: frame.method.clone(),
            });
        }

        delivered
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.registry.clear();
    }

    /// Number of subscriptions for `method`
    pub fn subscriber_count(&self, method: &str) -> usize {
        self.registry.get(method).map(|s| s.len()).unwrap_or(0)
    }

    /// Number of subscriptions across all methods
    pub fn total_subscribers(&self) -> usize {
        self.registry.iter().map(|entry| entry.value().len()).sum()
    }
}

async fn run_handler<F>(
    subscription: Subscription,
    mut rx: mpsc::Receiver<Arc<EventFrame>>,
    mut handler: F,
    reporter: AnomalyReporter,
) where
    F: FnMut(Arc<EventFrame>) + Send + 'static,
{
    while let Some(frame) = rx.recv().await {
        let panicked = catch_unwind(AssertUnwindSafe(|| handler(frame))).is_err();
        if panicked {
            reporter.report(Anomaly::HandlerPanic {
                method: subscription.method.clone(),
                subscription: subscription.id,
            });
        }
    }
    trace!("Handler {} for {} finished", subscription.id, subscription.method);
}

/// Events for one subscription, consumed by the caller
#[derive(Debug)]
pub struct EventStream {
    subscription: Subscription,
    rx: mpsc::Receiver<Arc<EventFrame>>,
}

impl EventStream {
    /// Next event, or `None` once the subscription was removed
    pub async fn recv(&mut self) -> Option<Arc<EventFrame>> {
        self.rx.recv().await
    }

    /// Handle for unsubscribing explicitly
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl futures::Stream for EventStream {
    type Item = Arc<EventFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
