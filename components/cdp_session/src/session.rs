//! Socket session: connection lifecycle, command submission and the pump loop

use cdp_transport::{FrameReader, Transport, WebSocketTransport};
use cdp_types::{
    parse_inbound_frame, serialize_command, CdpRequest, Command, CommandId, Event, EventFrame,
    InboundFrame, Payload,
};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::anomaly::{Anomaly, AnomalyReporter};
use crate::broadcaster::{EventBroadcaster, EventStream, Subscription};
use crate::config::SessionConfig;
use crate::correlator::{CommandOutcome, Correlator};
use crate::error::{Result, SessionError};
use crate::id_allocator::IdAllocator;
use crate::writer::{self, FrameSender, WriterTask, WRITER_SHUTDOWN_GRACE};

/// Unique identifier for a socket session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session ID from its string form
    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a socket session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected yet
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Pump running, commands accepted
    Connected,
    /// Teardown in progress
    Closing,
    /// Torn down; only `reconnect` brings it back
    Closed,
}

/// A command that has been registered and written, awaiting its response
///
/// Dropping it abandons the result; the id stays registered until the
/// response arrives or the session is torn down.
#[derive(Debug)]
pub struct PendingCommand {
    id: CommandId,
    rx: oneshot::Receiver<CommandOutcome>,
}

impl PendingCommand {
    /// Id the command was sent with
    pub fn id(&self) -> CommandId {
        self.id
    }
}

impl Future for PendingCommand {
    type Output = Result<Payload>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SessionError::SessionClosed)))
    }
}

struct SessionInner {
    id: SessionId,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    state: RwLock<SessionState>,
    ids: IdAllocator,
    correlator: Correlator,
    broadcaster: EventBroadcaster,
    reporter: AnomalyReporter,
    /// Queue into the current connection's writer task
    link: Mutex<Option<FrameSender>>,
    writer_task: Mutex<Option<WriterTask>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    /// Serializes connect and teardown
    lifecycle: tokio::sync::Mutex<()>,
    /// Bumped on every successful connect
    generation: AtomicU64,
}

/// Client end of a CDP WebSocket connection
///
/// Multiplexes commands over one connection, correlating each response with
/// its caller, and fans server-pushed events out to subscribers.
///
/// # Example
///
/// ```no_run
/// use cdp_session::{SessionConfig, SocketSession};
/// use serde_json::json;
///
/// # async fn run() -> cdp_session::Result<()> {
/// let session = SocketSession::websocket(SessionConfig::for_url(
///     "ws://127.0.0.1:9222/devtools/page/ABC",
/// ));
/// session.connect().await?;
///
/// session.on("Page.loadEventFired", |event| {
///     println!("loaded: {}", event.params.as_str());
/// });
/// session.send_command("Page.enable", json!({})).await?;
/// let result = session
///     .send_command("Page.navigate", json!({"url": "https://example.com"}))
///     .await?;
/// println!("{}", result.as_str());
///
/// session.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct SocketSession {
    inner: Arc<SessionInner>,
}

impl SocketSession {
    /// Create a session that dials through `transport`
    pub fn new(config: SessionConfig, transport: impl Transport + 'static) -> Self {
        let id = SessionId::new();
        let reporter = AnomalyReporter::new(id, config.anomaly_capacity());
        let broadcaster = EventBroadcaster::new(config.event_queue_capacity(), reporter.clone());

        Self {
            inner: Arc::new(SessionInner {
                id,
                transport: Arc::new(transport),
                state: RwLock::new(SessionState::Disconnected),
                ids: IdAllocator::new(),
                correlator: Correlator::new(),
                broadcaster,
                reporter,
                link: Mutex::new(None),
                writer_task: Mutex::new(None),
                pump: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
                config,
            }),
        }
    }

    /// Create a session over a WebSocket transport built from `config`
    pub fn websocket(config: SessionConfig) -> Self {
        let transport = WebSocketTransport::new(config.transport().clone());
        Self::new(config, transport)
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Get the configuration
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Number of commands awaiting a response
    pub fn pending_commands(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Number of live subscriptions for `method`
    pub fn subscriber_count(&self, method: &str) -> usize {
        self.inner.broadcaster.subscriber_count(method)
    }

    /// Observe anomalies (orphan responses, malformed frames, handler
    /// panics, lagging subscribers) reported from now on
    pub fn anomalies(&self) -> broadcast::Receiver<Anomaly> {
        self.inner.reporter.subscribe()
    }

    /// Open the connection and start the pump
    pub async fn connect(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.connect_locked().await
    }

    /// Tear down any live connection and connect again
    ///
    /// Outstanding commands fail with [`SessionError::SessionClosed`], the
    /// id space restarts at 1 and existing subscriptions keep receiving
    /// events from the new connection.
    pub async fn reconnect(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        let state = self.state();
        if matches!(state, SessionState::Connected | SessionState::Connecting) {
            self.inner
                .teardown_locked(|| SessionError::SessionClosed)
                .await;
        }

        self.inner.ids.reset();
        *self.inner.state.write() = SessionState::Disconnected;
        self.inner.connect_locked().await
    }

    /// Close the session
    ///
    /// Idempotent. Outstanding commands fail with
    /// [`SessionError::SessionClosed`] and every subscription is dropped.
    pub async fn disconnect(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;

        if self.state() == SessionState::Closed {
            // A transport teardown may have left subscriptions behind
            self.inner.broadcaster.clear();
            return;
        }

        let failed = self
            .inner
            .teardown_locked(|| SessionError::SessionClosed)
            .await;
        self.inner.broadcaster.clear();
        info!(
            "Session {} closed ({} pending commands failed)",
            self.inner.id, failed
        );
    }

    /// Send a command and wait for its result
    ///
    /// A `null` params value is sent as `{}`.
    pub async fn send_command(&self, method: &str, params: impl Serialize) -> Result<Payload> {
        self.submit(method, params).await?.await
    }

    /// Send a typed command and decode its result
    pub async fn execute<C: Command>(&self, command: &C) -> Result<C::Response> {
        let payload = self.send_command(C::METHOD, command).await?;
        Ok(decode_result(&payload)?)
    }

    /// Register and write a command, returning the future of its result
    ///
    /// Fails without touching the transport unless the session is
    /// connected.
    pub async fn submit(&self, method: &str, params: impl Serialize) -> Result<PendingCommand> {
        self.inner.ensure_connected()?;
        let params = serde_json::to_value(params)?;

        let link = self.inner.link.lock().clone();
        match link {
            Some(link) => self.inner.submit_on(&link, method, params).await,
            None => Err(SessionError::SessionClosed),
        }
    }

    /// Run `handler` for every `method` event
    ///
    /// Handlers are additive and each runs on its own task, in arrival
    /// order. Must be called within a Tokio runtime.
    pub fn on<F>(&self, method: &str, handler: F) -> Subscription
    where
        F: FnMut(Arc<EventFrame>) + Send + 'static,
    {
        self.inner.broadcaster.subscribe(method, handler)
    }

    /// Run `handler` with every `E` event, decoded
    ///
    /// Events whose params do not decode into `E` are logged and skipped.
    pub fn on_event<E, F>(&self, mut handler: F) -> Subscription
    where
        E: Event,
        F: FnMut(E) + Send + 'static,
    {
        let session = self.inner.id;
        self.inner
            .broadcaster
            .subscribe(E::NAME, move |frame| match frame.params.decode::<E>() {
                Ok(event) => handler(event),
                Err(e) => warn!(
                    "Session {}: could not decode {} params: {}",
                    session,
                    E::NAME,
                    e
                ),
            })
    }

    /// Receive every `method` event through a stream
    pub fn listen(&self, method: &str) -> EventStream {
        self.inner.broadcaster.subscribe_stream(method)
    }

    /// Remove one subscription. Returns `false` if it was already removed.
    pub fn off(&self, subscription: &Subscription) -> bool {
        self.inner.broadcaster.unsubscribe(subscription)
    }
}

impl Drop for SocketSession {
    fn drop(&mut self) {
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        self.inner.link.lock().take();
        self.inner.writer_task.lock().take();
        self.inner
            .correlator
            .resolve_all(|| SessionError::SessionClosed);
    }
}

impl std::fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("url", &self.inner.config.url())
            .finish_non_exhaustive()
    }
}

fn decode_result<T: DeserializeOwned>(payload: &Payload) -> serde_json::Result<T> {
    if payload.is_empty() {
        // Commands without a result still decode into `{}`-shaped responses
        serde_json::from_str("{}")
    } else {
        payload.decode()
    }
}

impl SessionInner {
    fn ensure_connected(&self) -> Result<()> {
        match *self.state.read() {
            SessionState::Connected => Ok(()),
            SessionState::Closing | SessionState::Closed => Err(SessionError::SessionClosed),
            state => Err(SessionError::NotConnected(state)),
        }
    }

    /// Caller holds the lifecycle lock
    async fn connect_locked(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                SessionState::Disconnected => *state = SessionState::Connecting,
                SessionState::Closed => return Err(SessionError::SessionClosed),
                _ => return Err(SessionError::AlreadyConnected),
            }
        }

        let url = self.config.url();
        debug!("Session {}: connecting to {}", self.id, url);

        let connection = match self.transport.connect(url).await {
            Ok(connection) => connection,
            Err(e) => {
                *self.state.write() = SessionState::Disconnected;
                warn!("Session {}: failed to connect to {}: {}", self.id, url, e);
                return Err(SessionError::Connection(e));
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (link, writer_task) = writer::spawn(self.id, generation, connection.writer);
        *self.link.lock() = Some(link);
        *self.writer_task.lock() = Some(writer_task);
        self.correlator.reopen();
        *self.state.write() = SessionState::Connected;

        let pump = tokio::spawn(pump(Arc::clone(self), connection.reader, generation));
        *self.pump.lock() = Some(pump);

        info!("Session {} connected to {}", self.id, url);
        Ok(())
    }

    /// Stop the pump, fail pending commands and close the writer.
    /// Caller holds the lifecycle lock. Subscriptions are left alone.
    async fn teardown_locked(&self, make_error: impl Fn() -> SessionError) -> usize {
        *self.state.write() = SessionState::Closing;

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.link.lock().take();

        let failed = self.correlator.resolve_all(make_error);
        self.close_writer().await;
        *self.state.write() = SessionState::Closed;
        failed
    }

    /// Teardown started by the pump when the transport ends
    async fn connection_lost(&self, generation: u64, reason: String) {
        let _lifecycle = self.lifecycle.lock().await;

        if self.generation.load(Ordering::SeqCst) != generation
            || *self.state.read() != SessionState::Connected
        {
            trace!("Session {}: stale pump {} exiting", self.id, generation);
            return;
        }

        *self.state.write() = SessionState::Closing;
        // This task is the pump; drop its handle rather than abort itself
        self.pump.lock().take();
        self.link.lock().take();

        let failed = self
            .correlator
            .resolve_all(|| SessionError::ConnectionLost(reason.clone()));
        self.close_writer().await;
        *self.state.write() = SessionState::Closed;
        error!(
            "Session {}: connection lost ({}), {} pending commands failed",
            self.id, reason, failed
        );
    }

    /// Bounded: a write stuck in the transport is abandoned after the grace
    async fn close_writer(&self) {
        let task = self.writer_task.lock().take();
        if let Some(task) = task {
            task.shutdown(WRITER_SHUTDOWN_GRACE).await;
        }
    }

    /// Register `method` and write it through `link`
    ///
    /// The registration is dropped again if the connection `link` belongs
    /// to was replaced meanwhile or the write fails, so a command never
    /// reaches a connection whose id space it was not allocated from.
    async fn submit_on(
        &self,
        link: &FrameSender,
        method: &str,
        params: serde_json::Value,
    ) -> Result<PendingCommand> {
        let id = self.ids.next()?;
        let frame = serialize_command(&CdpRequest::command(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.correlator.register(id, tx)?;

        if self.generation.load(Ordering::SeqCst) != link.generation() {
            self.correlator.forget(id);
            debug!("Session {}: {} ({}) raced a reconnect, not sent", self.id, method, id);
            return Err(SessionError::SessionClosed);
        }

        match link.send(frame).await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                self.correlator.forget(id);
                warn!("Session {}: failed to send {} ({}): {}", self.id, method, id, e);
                return Err(SessionError::Connection(e));
            }
            None => {
                self.correlator.forget(id);
                return Err(SessionError::SessionClosed);
            }
        }

        trace!("Session {}: -> {} ({})", self.id, method, id);
        Ok(PendingCommand { id, rx })
    }

    fn route_frame(&self, text: &str) {
        trace!("Session {}: <- {}", self.id, text);
        match parse_inbound_frame(text) {
            Ok(InboundFrame::Response(response)) => {
                let id = response.id;
                let outcome = response.into_outcome().map_err(SessionError::Protocol);
                if !self.correlator.resolve(id, outcome) {
                    self.reporter.report(Anomaly::OrphanResponse { id });
                }
            }
            Ok(InboundFrame::Event(event)) => {
                let method = event.method.clone();
                let delivered = self.broadcaster.dispatch(Arc::new(event));
                trace!("Session {}: {} delivered to {} subscribers", self.id, method, delivered);
            }
            Err(e) => self.reporter.report(Anomaly::MalformedFrame {
                reason: e.to_string(),
            }),
        }
    }
}

/// Reads frames until the connection ends, routing each one
async fn pump(inner: Arc<SessionInner>, mut reader: Box<dyn FrameReader>, generation: u64) {
    debug!("Session {}: pump {} started", inner.id, generation);
    let reason = loop {
        match reader.read_frame().await {
            Ok(Some(text)) => inner.route_frame(&text),
            Ok(None) => break "connection closed by peer".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    debug!("Session {}: pump {} stopped: {}", inner.id, generation, reason);
    inner.connection_lost(generation, reason).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_transport::MockTransport;
    use serde_json::json;

    fn session() -> (SocketSession, MockTransport) {
        let mock = MockTransport::new();
        let session = SocketSession::new(SessionConfig::for_url("ws://mock/devtools"), mock.clone());
        (session, mock)
    }

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new();
        assert_eq!(SessionId::from_string(&id.to_string()).unwrap(), id);
        assert!(SessionId::from_string("not-a-uuid").is_err());
    }

    #[tokio::test]
    async fn test_new_session_is_disconnected() {
        let (session, mock) = session();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.pending_commands(), 0);
        assert_eq!(mock.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let (session, mock) = session();

        let err = session.send_command("Page.enable", json!({})).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::NotConnected(SessionState::Disconnected)
        ));
        assert!(mock.drain_written().await.is_empty());
    }

    #[tokio::test]
    async fn test_connect_twice() {
        let (session, _mock) = session();
        session.connect().await.unwrap();

        assert!(matches!(
            session.connect().await,
            Err(SessionError::AlreadyConnected)
        ));
    }

    #[tokio::test]
    async fn test_null_params_sent_as_empty_object() {
        let (session, mock) = session();
        session.connect().await.unwrap();

        let pending = session.submit("Page.enable", ()).await.unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&mock.next_written().await.unwrap()).unwrap();

        assert_eq!(
            written,
            json!({"id": pending.id(), "method": "Page.enable", "params": {}})
        );
    }

    #[test]
    fn test_decode_empty_result() {
        #[derive(Deserialize)]
        struct Empty {}

        assert!(decode_result::<Empty>(&Payload::empty()).is_ok());
    }

    #[tokio::test]
    async fn test_write_failure_forgets_registration() {
        let (session, mock) = session();
        session.connect().await.unwrap();
        mock.fail_writes(true);

        let err = session.send_command("Page.enable", json!({})).await.unwrap_err();

        assert!(matches!(err, SessionError::Connection(_)));
        assert_eq!(session.pending_commands(), 0);
    }

    #[tokio::test]
    async fn test_drop_fails_pending_commands() {
        let (session, _mock) = session();
        session.connect().await.unwrap();
        let pending = session.submit("Runtime.evaluate", json!({"expression": "1"})).await.unwrap();

        drop(session);

        assert!(matches!(pending.await, Err(SessionError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_submit_across_reconnect_is_not_sent() {
        let (session, mock) = session();
        session.connect().await.unwrap();
        let stale = session.inner.link.lock().clone().unwrap();

        session.reconnect().await.unwrap();
        let err = session
            .inner
            .submit_on(&stale, "Page.enable", json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::SessionClosed));
        assert_eq!(session.pending_commands(), 0);
        assert!(mock.drain_written().await.is_empty());

        // The id taken by the stale submit is not reused on the new connection
        let fresh = session.submit("Page.enable", json!({})).await.unwrap();
        assert_eq!(fresh.id(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_stops_writer_task() {
        let (session, mock) = session();
        session.connect().await.unwrap();
        let pending = session.submit("Page.enable", json!({})).await.unwrap();

        session.disconnect().await;

        assert!(matches!(pending.await, Err(SessionError::SessionClosed)));
        assert!(session.inner.link.lock().is_none());
        assert!(session.inner.writer_task.lock().is_none());
        assert_eq!(mock.client_close_count(), 1);
    }
}
