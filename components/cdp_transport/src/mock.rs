//! In-memory transport for tests
//!
//! Plays the browser side of a connection: frames can be seeded before
//! connecting (and are replayed on connect), pushed while connected, and
//! every frame the client writes can be observed.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::transport::{Connection, FrameReader, FrameWriter, Transport};

/// Something the mock peer sends to the client
#[derive(Debug)]
enum PeerEvent {
    Frame(String),
    Close,
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    /// Frames replayed to the next connection
    seeded: VecDeque<String>,
    /// Inbound link of the live connection
    inbound: Option<mpsc::UnboundedSender<PeerEvent>>,
    refuse_connect: bool,
    fail_writes: bool,
    connects: usize,
    client_closes: usize,
    urls: Vec<String>,
}

#[derive(Debug)]
struct MockShared {
    state: Mutex<MockState>,
    written_tx: mpsc::UnboundedSender<String>,
    written_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

/// Scriptable transport double. Clones share the same peer.
#[derive(Debug, Clone)]
pub struct MockTransport {
    shared: Arc<MockShared>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock peer with nothing seeded
    pub fn new() -> Self {
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(MockShared {
                state: Mutex::new(MockState::default()),
                written_tx,
                written_rx: tokio::sync::Mutex::new(written_rx),
            }),
        }
    }

    /// Queue a frame for the client. Delivered immediately when connected,
    /// otherwise replayed once the next connection is made.
    pub fn push_frame(&self, frame: impl Into<String>) {
        let frame = frame.into();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        match &state.inbound {
            Some(tx) => {
                if let Err(mpsc::error::SendError(PeerEvent::Frame(frame))) =
                    tx.send(PeerEvent::Frame(frame))
                {
                    state.seeded.push_back(frame);
                }
            }
            None => state.seeded.push_back(frame),
        }
    }

    /// Serialize `value` and queue it as a frame
    pub fn push_json<T: serde::Serialize>(&self, value: &T) -> serde_json::Result<()> {
        self.push_frame(serde_json::to_string(value)?);
        Ok(())
    }

    /// Close the live connection from the peer side
    pub fn close_remote(&self) {
        if let Some(tx) = self.shared.state.lock().inbound.take() {
            let _ = tx.send(PeerEvent::Close);
        }
    }

    /// Make the client's next read fail with an I/O error
    pub fn fail_remote(&self, reason: impl Into<String>) {
        if let Some(tx) = self.shared.state.lock().inbound.take() {
            let _ = tx.send(PeerEvent::Fail(reason.into()));
        }
    }

    /// Refuse (or accept again) future connection attempts
    pub fn refuse_connect(&self, refuse: bool) {
        self.shared.state.lock().refuse_connect = refuse;
    }

    /// Make (or stop making) writes fail
    pub fn fail_writes(&self, fail: bool) {
        self.shared.state.lock().fail_writes = fail;
    }

    /// Wait for the next frame the client wrote
    pub async fn next_written(&self) -> Option<String> {
        self.shared.written_rx.lock().await.recv().await
    }

    /// Frames written by the client and not yet taken
    pub async fn drain_written(&self) -> Vec<String> {
        let mut rx = self.shared.written_rx.lock().await;
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Number of successful connections so far
    pub fn connect_count(&self) -> usize {
        self.shared.state.lock().connects
    }

    /// Number of times the client closed a connection
    pub fn client_close_count(&self) -> usize {
        self.shared.state.lock().client_closes
    }

    /// URLs the client dialed, in order
    pub fn dialed_urls(&self) -> Vec<String> {
        self.shared.state.lock().urls.clone()
    }

    /// Whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().inbound.is_some()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let mut state = self.shared.state.lock();
        state.urls.push(url.to_string());

        if state.refuse_connect {
            return Err(TransportError::Refused(url.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for frame in state.seeded.drain(..) {
            let _ = tx.send(PeerEvent::Frame(frame));
        }
        state.inbound = Some(tx);
        state.connects += 1;
        debug!("Mock transport connected to {} (#{})", url, state.connects);

        Ok(Connection::new(
            MockWriter {
                shared: Arc::clone(&self.shared),
                connection: state.connects,
                closed: false,
            },
            MockReader { rx },
        ))
    }
}

struct MockWriter {
    shared: Arc<MockShared>,
    connection: usize,
    closed: bool,
}

#[async_trait]
impl FrameWriter for MockWriter {
    async fn write_frame(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.shared.state.lock().fail_writes {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        self.shared
            .written_tx
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            let mut state = self.shared.state.lock();
            state.client_closes += 1;
            // Dropping the sender ends the reader, unless a newer
            // connection already replaced it
            if state.connects == self.connection {
                state.inbound = None;
            }
        }
        Ok(())
    }
}

struct MockReader {
    rx: mpsc::UnboundedReceiver<PeerEvent>,
}

#[async_trait]
impl FrameReader for MockReader {
    async fn read_frame(&mut self) -> Result<Option<String>> {
        match self.rx.recv().await {
            Some(PeerEvent::Frame(frame)) => Ok(Some(frame)),
            Some(PeerEvent::Close) | None => Ok(None),
            Some(PeerEvent::Fail(reason)) => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                reason,
            ))),
        }
    }
}
