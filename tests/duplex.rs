//! Duplex-transport tests: real server, real client sockets, no browser.
//! Tools that need a target are not exercised here; the unknown-tool path
//! runs the full envelope → dispatch → response loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use chromelink::{router, BridgeConfig, Dispatcher, ServeState};

async fn start_bridge() -> String {
    let dispatcher = Arc::new(Dispatcher::new(&BridgeConfig::default()));
    let app = router(ServeState { dispatcher });
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}/ws")
}

fn call_frame(envelope_id: &str, tool: &str) -> Message {
    let frame = json!({
        "id": envelope_id,
        "direction": "to-chrome",
        "timestamp": 1700000000000i64,
        "payload": {
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": { "name": tool, "arguments": {} },
            "id": 1,
        },
    });
    Message::Text(frame.to_string().into())
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn next_json(socket: &mut WsClient) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("response in time")
            .expect("socket open")
            .expect("frame ok");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("response json");
        }
    }
}

#[tokio::test]
async fn same_envelope_id_from_two_clients_stays_isolated() {
    let url = start_bridge().await;
    let (mut c1, _) = tokio_tungstenite::connect_async(&url).await.expect("c1");
    let (mut c2, _) = tokio_tungstenite::connect_async(&url).await.expect("c2");

    c1.send(call_frame("7", "does_not_exist")).await.expect("c1 send");
    c2.send(call_frame("7", "does_not_exist")).await.expect("c2 send");

    let r1 = next_json(&mut c1).await;
    let r2 = next_json(&mut c2).await;

    for response in [&r1, &r2] {
        assert_eq!(response["payload"]["requestId"], json!("7"));
        assert_eq!(response["payload"]["error"]["code"], json!("NotFound"));
        assert_eq!(response["direction"], json!("from-chrome"));
    }

    // Exactly one response each; nothing else arrives.
    let extra = tokio::time::timeout(Duration::from_millis(300), c1.next()).await;
    assert!(extra.is_err(), "c1 got a second frame");
}

#[tokio::test]
async fn malformed_frames_do_not_kill_the_connection() {
    let url = start_bridge().await;
    let (mut client, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");

    client
        .send(Message::Text("this is not an envelope".to_string().into()))
        .await
        .expect("send garbage");
    client
        .send(call_frame("after-garbage", "does_not_exist"))
        .await
        .expect("send valid");

    let response = next_json(&mut client).await;
    assert_eq!(response["payload"]["requestId"], json!("after-garbage"));
}

#[tokio::test]
async fn bad_payload_method_surfaces_bad_arguments() {
    let url = start_bridge().await;
    let (mut client, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");

    let frame = json!({
        "id": "env-9",
        "direction": "to-chrome",
        "timestamp": 1700000000000i64,
        "payload": { "jsonrpc": "2.0", "method": "tools/list", "params": {}, "id": 2 },
    });
    client
        .send(Message::Text(frame.to_string().into()))
        .await
        .expect("send");

    let response = next_json(&mut client).await;
    assert_eq!(response["payload"]["error"]["code"], json!("BadArguments"));
}
