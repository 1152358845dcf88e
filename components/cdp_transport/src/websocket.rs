//! WebSocket transport over tokio-tungstenite

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::transport::{validate_message_size, Connection, FrameReader, FrameWriter, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport dialing `ws://` / `wss://` endpoints
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: TransportConfig,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Get transport configuration
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Protocol limits handed to tungstenite, so its own defaults
    /// (16 MiB frames, 64 MiB messages) never undercut `max_message_size`
    fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: Some(self.config.max_message_size),
            max_frame_size: Some(self.config.max_message_size),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        debug!("Opening WebSocket to {}", url);

        let handshake = connect_async_with_config(url, Some(self.websocket_config()), false);
        let (ws_stream, response) = match self.config.connect_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, handshake)
                .await
                .map_err(|_| {
                    TransportError::ConnectTimeout(url.to_string(), timeout.as_millis() as u64)
                })?,
            None => handshake.await,
        }
        .map_err(Box::new)?;

        debug!("WebSocket handshake with {} completed: {}", url, response.status());

        let (sink, source) = ws_stream.split();
        Ok(Connection::new(
            WebSocketWriter { sink },
            WebSocketReader {
                source,
                max_message_size: self.config.max_message_size,
            },
        ))
    }
}

/// Writing half of a WebSocket connection
pub struct WebSocketWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameWriter for WebSocketWriter {
    async fn write_frame(&mut self, frame: String) -> Result<()> {
        trace!("ws send: {}", frame);
        self.sink.send(Message::Text(frame)).await.map_err(Box::new)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.sink.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(Box::new(e).into()),
        }
    }
}

/// Reading half of a WebSocket connection
pub struct WebSocketReader {
    source: SplitStream<WsStream>,
    max_message_size: usize,
}

#[async_trait]
impl FrameReader for WebSocketReader {
    async fn read_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.source.next().await {
                Some(Ok(Message::Text(text))) => {
                    validate_message_size(&text, self.max_message_size)?;
                    trace!("ws recv: {}", text);
                    return Ok(Some(text));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        validate_message_size(&text, self.max_message_size)?;
                        return Ok(Some(text));
                    }
                    Err(_) => warn!("Dropping binary frame that is not UTF-8"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!("Peer closed connection: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Pongs are queued by tungstenite itself
                }
                Some(Ok(Message::Frame(_))) => {
                    // Raw frames are handled internally
                }
                Some(Err(tungstenite::Error::Capacity(CapacityError::MessageTooLong {
                    size,
                    max_size,
                }))) => return Err(TransportError::MessageTooLarge(size, max_size)),
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    debug!("Connection closed");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(Box::new(e).into()),
            }
        }
    }
}
