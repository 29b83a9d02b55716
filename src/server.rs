//! The duplex transport: one WebSocket endpoint, many concurrent clients.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::dispatch::Dispatcher;
use crate::envelope::Envelope;

#[derive(Clone)]
pub struct ServeState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(state: ServeState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

async fn websocket_handler(
    State(state): State<ServeState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.dispatcher))
}

async fn handle_socket(socket: WebSocket, dispatcher: Arc<Dispatcher>) {
    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client = dispatcher.register_client(tx.clone());

    // All outbound traffic funnels through one writer task; dispatch tasks
    // only ever touch the channel.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                Ok(envelope) => {
                    // Attribution is recorded before the dispatch task runs.
                    dispatcher.track(client, &envelope);
                    let dispatcher = Arc::clone(&dispatcher);
                    tokio::spawn(async move {
                        dispatcher.dispatch(client, envelope).await;
                    });
                }
                Err(err) => {
                    warn!(target: "duplex", client, ?err, "unparseable client envelope");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(target: "duplex", client, ?frame, "client closed the socket");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                error!(target: "duplex", client, ?err, "client socket error");
                break;
            }
        }
    }

    dispatcher.remove_client(client);
    writer.abort();
}
