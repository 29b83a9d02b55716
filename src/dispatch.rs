//! Routing of tool-call envelopes to handlers, with per-client attribution.
//!
//! Every inbound envelope is recorded against its originating client before
//! the dispatch is enqueued; the response is emitted on that client's socket
//! or silently dropped when the client has since disconnected. Envelope ids
//! are client-scoped, so the routing key is the (client, envelope) pair.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::envelope::Envelope;
use crate::errors::{BridgeError, BridgeResult};
use crate::sessions::{tab_ref_from_args, SessionHub};
use crate::tools::{self, ToolContext, ToolOutput};

pub type ClientId = u64;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub client: ClientId,
    pub envelope: String,
}

struct PendingCall {
    tool: String,
}

pub struct Dispatcher {
    hub: Arc<SessionHub>,
    clients: DashMap<ClientId, mpsc::UnboundedSender<Message>>,
    routing: DashMap<CallKey, PendingCall>,
    next_client: AtomicU64,
}

impl Dispatcher {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            hub: Arc::new(SessionHub::new(config)),
            clients: DashMap::new(),
            routing: DashMap::new(),
            next_client: AtomicU64::new(0),
        }
    }

    pub fn hub(&self) -> Arc<SessionHub> {
        Arc::clone(&self.hub)
    }

    pub fn register_client(&self, tx: mpsc::UnboundedSender<Message>) -> ClientId {
        let client = self.next_client.fetch_add(1, Ordering::SeqCst) + 1;
        self.clients.insert(client, tx);
        info!(target: "duplex", client, "client connected");
        client
    }

    pub fn remove_client(&self, client: ClientId) {
        self.clients.remove(&client);
        let before = self.routing.len();
        self.routing.retain(|key, _| key.client != client);
        info!(
            target: "duplex",
            client,
            dropped = before - self.routing.len(),
            "client disconnected"
        );
    }

    /// Record the envelope→client attribution. Must happen before the
    /// dispatch task is spawned.
    pub fn track(&self, client: ClientId, envelope: &Envelope) {
        self.routing.insert(
            CallKey {
                client,
                envelope: envelope.id.clone(),
            },
            PendingCall {
                tool: envelope.tool_name().unwrap_or("<unparsed>").to_string(),
            },
        );
    }

    pub async fn dispatch(&self, client: ClientId, envelope: Envelope) {
        let started = Instant::now();
        let envelope_id = envelope.id.clone();
        let outcome = self.run(envelope).await;

        let key = CallKey {
            client,
            envelope: envelope_id.clone(),
        };
        let Some((_, call)) = self.routing.remove(&key) else {
            debug!(
                target: "dispatch",
                client,
                envelope = %envelope_id,
                "client left before completion; dropping response"
            );
            return;
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let response = match outcome {
            Ok(output) => {
                info!(target: "dispatch", tool = %call.tool, client, elapsed_ms, "tool call ok");
                Envelope::result(&envelope_id, output.into_payload())
            }
            Err(err) => {
                warn!(
                    target: "dispatch",
                    tool = %call.tool,
                    client,
                    elapsed_ms,
                    code = err.code(),
                    error = %err,
                    "tool call failed"
                );
                Envelope::error(&envelope_id, err.code(), &err.public_message())
            }
        };
        self.emit(client, &response);
    }

    /// Parse, bind, and invoke. The handler runs in its own task so a panic
    /// becomes a structured `Internal` error instead of taking the caller
    /// down with it.
    async fn run(&self, envelope: Envelope) -> BridgeResult<ToolOutput> {
        let call = envelope.tool_call()?;
        let Some(spec) = tools::spec(&call.name) else {
            return Err(BridgeError::UnknownTool(call.name));
        };

        let session = if spec.requires_target {
            let tab = tab_ref_from_args(&call.arguments)?;
            Some(self.hub.bind(tab).await?)
        } else {
            None
        };
        let ctx = ToolContext {
            session,
            hub: self.hub(),
        };

        let handle =
            tokio::spawn(async move { tools::invoke(&ctx, &call.name, &call.arguments).await });
        match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(BridgeError::Internal(format!(
                "tool handler aborted: {join_error}"
            ))),
        }
    }

    fn emit(&self, client: ClientId, envelope: &Envelope) {
        let Some(tx) = self.clients.get(&client) else {
            debug!(target: "dispatch", client, "no socket for response; dropped");
            return;
        };
        match serde_json::to_string(envelope) {
            Ok(text) => {
                let _ = tx.send(Message::Text(text));
            }
            Err(err) => warn!(target: "dispatch", ?err, "failed to serialize response envelope"),
        }
    }
}
