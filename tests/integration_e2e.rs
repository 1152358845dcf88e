//! End-to-end tests: a session talking to a fake browser over a real WebSocket

mod support;

use cdp_socket::{Command, Event, SessionConfig, SessionError, SessionState, SocketSession};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use support::FakeBrowser;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn connect_to(browser: &FakeBrowser) -> SocketSession {
    init_tracing();
    let config = SessionConfig::builder()
        .url(browser.url())
        .connect_timeout(Some(Duration::from_secs(5)))
        .build();
    let session = SocketSession::websocket(config);
    assert_ok!(session.connect().await, "connect to fake browser");
    session
}

#[derive(Serialize)]
struct GetVersion {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetVersionReturns {
    protocol_version: String,
    product: String,
}

impl Command for GetVersion {
    const METHOD: &'static str = "Browser.getVersion";
    type Response = GetVersionReturns;
}

#[derive(Debug, Deserialize)]
struct ConsoleApiCalled {
    #[serde(rename = "type")]
    kind: String,
    args: Vec<Value>,
}

impl Event for ConsoleApiCalled {
    const NAME: &'static str = "Runtime.consoleAPICalled";
}

#[tokio::test]
async fn test_typed_command_round_trip() {
    let browser = FakeBrowser::start().await;
    let session = connect_to(&browser).await;

    let version = assert_ok!(session.execute(&GetVersion {}).await);

    assert_eq!(version.protocol_version, "1.3");
    assert_eq!(version.product, "FakeChrome/1.0");
    session.disconnect().await;
}

#[tokio::test]
async fn test_event_arrives_alongside_response() {
    let browser = FakeBrowser::start().await;
    let session = connect_to(&browser).await;

    let (tx, mut logs) = mpsc::unbounded_channel();
    session.on_event(move |event: ConsoleApiCalled| {
        let _ = tx.send(event);
    });

    let result = session
        .send_command("Runtime.evaluate", json!({"expression": "'hello'"}))
        .await
        .unwrap();
    assert_eq!(
        result.to_value().unwrap(),
        json!({"result": {"type": "string", "value": "'hello'"}})
    );

    let event = timeout(Duration::from_secs(2), logs.recv()).await.unwrap().unwrap();
    assert_eq!(event.kind, "log");
    assert_eq!(event.args[0]["value"], "'hello'");
}

#[tokio::test]
async fn test_responses_are_matched_out_of_order() {
    let browser = FakeBrowser::start().await;
    let session = connect_to(&browser).await;

    let slow = session.submit("Test.sleep", json!({"ms": 300})).await.unwrap();
    let slow = tokio::spawn(slow);

    let version = session.send_command("Browser.getVersion", json!({})).await.unwrap();
    assert_eq!(version.to_value().unwrap()["product"], "FakeChrome/1.0");
    assert!(!slow.is_finished());

    let slept = timeout(Duration::from_secs(2), slow).await.unwrap().unwrap().unwrap();
    assert_eq!(slept.to_value().unwrap(), json!({"slept": 300}));
}

#[tokio::test]
async fn test_unknown_method_is_protocol_error() {
    let browser = FakeBrowser::start().await;
    let session = connect_to(&browser).await;

    let err = assert_err!(session.send_command("Nope.notAMethod", json!({})).await);

    let protocol = err.protocol_error().expect("protocol error");
    assert_eq!(protocol.code, -32601);
    assert_eq!(protocol.message, "'Nope.notAMethod' wasn't found");
    assert_eq!(session.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_listen_for_events() {
    let browser = FakeBrowser::start().await;
    let session = connect_to(&browser).await;
    let mut console = session.listen("Runtime.consoleAPICalled");

    session
        .send_command("Runtime.evaluate", json!({"expression": "1"}))
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(2), console.recv()).await.unwrap().unwrap();
    assert_eq!(event.domain(), Some("Runtime"));
}

#[tokio::test]
async fn test_disconnect_fails_outstanding_commands() {
    let browser = FakeBrowser::start().await;
    let session = connect_to(&browser).await;

    let pending = session.submit("Test.sleep", json!({"ms": 5000})).await.unwrap();
    session.disconnect().await;

    let outcome = timeout(Duration::from_secs(2), pending).await.unwrap();
    assert!(matches!(outcome, Err(SessionError::SessionClosed)));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_peer_close_then_reconnect() {
    let browser = FakeBrowser::start().await;
    let session = connect_to(&browser).await;

    let err = timeout(
        Duration::from_secs(2),
        session.send_command("Test.closeSocket", json!({})),
    )
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, SessionError::ConnectionLost(_)));

    timeout(Duration::from_secs(2), async {
        while session.state() != SessionState::Closed {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_ok!(session.reconnect().await);
    let pending = assert_ok!(session.submit("Browser.getVersion", json!({})).await);
    assert_eq!(pending.id(), 1);
    assert_ok!(pending.await);
}

#[tokio::test]
async fn test_connect_to_nothing_fails() {
    init_tracing();
    let session = SocketSession::websocket(SessionConfig::for_url("ws://127.0.0.1:1/devtools"));

    let err = assert_err!(session.connect().await);

    assert!(matches!(err, SessionError::Connection(_)));
    assert_eq!(session.state(), SessionState::Disconnected);
}
