//! Per-connection writer task
//!
//! Submitters never hold the transport writer themselves. Each connection
//! gets one task that owns its [`FrameWriter`] and drains a queue of
//! frames, so teardown can stop it without waiting on a write that never
//! completes.

use cdp_transport::FrameWriter;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::SessionId;

/// How long teardown lets the writer finish its close handshake
pub(crate) const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

struct WriteRequest {
    frame: String,
    done: oneshot::Sender<cdp_transport::Result<()>>,
}

/// Queue into the writer task of one connection
#[derive(Clone)]
pub(crate) struct FrameSender {
    generation: u64,
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl FrameSender {
    /// Connection generation this sender writes to
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Write one frame and wait for the transport's verdict.
    /// `None` once the writer task is gone.
    pub(crate) async fn send(&self, frame: String) -> Option<cdp_transport::Result<()>> {
        let (done, written) = oneshot::channel();
        self.tx.send(WriteRequest { frame, done }).ok()?;
        written.await.ok()
    }
}

/// Handle used by teardown to stop the writer task
pub(crate) struct WriterTask {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl WriterTask {
    /// Ask the task to close the connection; abort it if it has not
    /// finished within `grace`
    pub(crate) async fn shutdown(mut self, grace: Duration) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(grace, &mut self.handle).await.is_err() {
            warn!("Writer task did not stop within {:?}, aborting it", grace);
            self.handle.abort();
        }
    }
}

impl Drop for WriterTask {
    fn drop(&mut self) {
        // Dropping the shutdown sender also stops the task; abort covers a
        // write that is stuck
        self.handle.abort();
    }
}

/// Start the writer task for one connection
pub(crate) fn spawn(
    session: SessionId,
    generation: u64,
    writer: Box<dyn FrameWriter>,
) -> (FrameSender, WriterTask) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(run(session, generation, writer, rx, shutdown_rx));

    (
        FrameSender { generation, tx },
        WriterTask {
            shutdown: Some(shutdown_tx),
            handle,
        },
    )
}

async fn run(
    session: SessionId,
    generation: u64,
    mut writer: Box<dyn FrameWriter>,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let request = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let result = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            result = writer.write_frame(request.frame) => result,
        };
        let _ = request.done.send(result);
    }

    // Requests still queued settle as `None`
    drop(rx);
    if let Err(e) = writer.close().await {
        debug!("Session {}: error closing connection {}: {}", session, generation, e);
    }
    debug!("Session {}: writer {} stopped", session, generation);
}
