//! A small fake browser speaking CDP over a real WebSocket
//!
//! Methods it understands:
//! - `Browser.getVersion` answers immediately
//! - `Runtime.evaluate` pushes `Runtime.consoleAPICalled` then echoes the
//!   expression as the result
//! - `Test.sleep {ms}` answers after `ms` milliseconds
//! - `Test.closeSocket` closes the connection without answering
//!
//! Anything else is answered with a -32601 error.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use cdp_socket::types::{CdpError, CdpEvent, CdpRequest, CdpResponse};

pub struct FakeBrowser {
    url: String,
    accept_loop: JoinHandle<()>,
}

impl FakeBrowser {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream));
            }
        });

        Self {
            url: format!("ws://{}/devtools/browser/fake", addr),
            accept_loop,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for FakeBrowser {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(stream: TcpStream) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut sink, mut source) = ws.split();

    // Replies from delayed handlers share the sink through this queue
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(message)) = source.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<CdpRequest>(&text) {
                Ok(request) => respond(&tx, request),
                Err(_) => continue,
            },
            Message::Close(_) => break,
            _ => continue,
        }
    }

    drop(tx);
    let _ = writer.await;
}

fn respond(tx: &mpsc::UnboundedSender<Message>, request: CdpRequest) {
    let id = request.id;
    let params = request.params.unwrap_or(Value::Null);
    let send = |frame: String| {
        let _ = tx.send(Message::Text(frame));
    };
    let reply = |result: Value| encode(&CdpResponse::success(id, result));

    match request.method.as_str() {
        "Browser.getVersion" => send(reply(json!({
            "protocolVersion": "1.3",
            "product": "FakeChrome/1.0"
        }))),
        "Runtime.evaluate" => {
            send(encode(&CdpEvent::new(
                "Runtime.consoleAPICalled",
                json!({"type": "log", "args": [{"type": "string", "value": params["expression"]}]}),
            )));
            send(reply(json!({
                "result": {"type": "string", "value": params["expression"]}
            })));
        }
        "Test.sleep" => {
            let tx = tx.clone();
            let ms = params["ms"].as_u64().unwrap_or(0);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                let frame = encode(&CdpResponse::success(id, json!({"slept": ms})));
                let _ = tx.send(Message::Text(frame));
            });
        }
        "Test.closeSocket" => {
            let _ = tx.send(Message::Close(None));
        }
        other => send(encode(&CdpResponse::failure(
            id,
            CdpError::new(-32601, format!("'{}' wasn't found", other)),
        ))),
    }
}

fn encode<T: serde::Serialize>(frame: &T) -> String {
    serde_json::to_string(frame).unwrap()
}
