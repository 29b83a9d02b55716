//! One WebSocket to one debugging target.
//!
//! A single socket task owns both directions: outbound commands arrive over
//! an mpsc channel (which is what preserves wire order), inbound frames are
//! demultiplexed by the one rule that matters — an `id` makes it a response,
//! a `method` without an `id` makes it an event.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CdpError, Result};
use crate::events::EventHub;
use crate::metrics::{CommandOutcome, MetricsReport, SessionMetrics};
use crate::state::PageState;
use crate::targets::Target;

/// Per-command deadline; a pending entry lives at most this long.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// `Network.enable` buffer sizing; shrinks the window in which a later
/// `Network.getResponseBody` answers "no data found".
const NETWORK_RESOURCE_BUFFER: u64 = 10_000_000;
const NETWORK_TOTAL_BUFFER: u64 = 50_000_000;

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Enable `Page`/`Runtime`/`Network`/`DOM` right after connect.
    pub auto_enable: bool,
    pub command_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_enable: true,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

struct OutboundCommand {
    id: u64,
    method: String,
    params: Value,
}

struct SessionShared {
    next_id: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<Result<Value>>>,
    hub: EventHub,
    state: PageState,
    metrics: SessionMetrics,
    enabled_domains: Mutex<HashSet<String>>,
    connected: AtomicBool,
    /// Socket generation; teardown from a superseded socket is a no-op.
    epoch: AtomicU64,
}

impl SessionShared {
    fn handle_frame(&self, text: &str) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "cdp-session", ?err, "unparseable frame from browser");
                return;
            }
        };

        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            let outcome = match value.get("error") {
                Some(error) => Err(CdpError::Protocol {
                    code: error["code"].as_i64().unwrap_or_default(),
                    message: error["message"].as_str().unwrap_or_default().to_string(),
                }),
                None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
            };
            match self.pending.remove(&id) {
                Some((_, tx)) => {
                    let _ = tx.send(outcome);
                }
                // Cancelled or timed-out command; the late answer is dropped.
                None => debug!(target: "cdp-session", id, "response without pending command"),
            }
        } else if let Some(method) = value.get("method").and_then(Value::as_str) {
            let params = value.get("params").cloned().unwrap_or(Value::Null);
            let ts_ms = Utc::now().timestamp_millis();
            self.state.observe(method, &params, ts_ms);
            self.hub.publish(method, params, ts_ms);
        }
    }

    fn teardown(&self, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        let pending_ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in pending_ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(CdpError::Disconnected));
            }
        }
        self.hub.clear_all();
        self.state.reset();
        self.enabled_domains
            .lock()
            .expect("enabled domains poisoned")
            .clear();
    }
}

/// Exclusive owner of one target's debugger WebSocket.
pub struct CdpSession {
    target: Target,
    shared: Arc<SessionShared>,
    cmd_tx: mpsc::Sender<OutboundCommand>,
    shutdown: CancellationToken,
    command_timeout: Duration,
}

impl CdpSession {
    /// Open the socket and, unless opted out, enable the default domains.
    pub async fn connect(target: Target, options: SessionOptions) -> Result<Self> {
        let ws_url = target
            .ws_url
            .clone()
            .ok_or_else(|| CdpError::NotFound(format!("target {} has no debugger url", target.id)))?;

        let (ws, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|err| CdpError::BrowserUnavailable(err.to_string()))?;

        let shared = Arc::new(SessionShared {
            next_id: AtomicU64::new(0),
            pending: DashMap::new(),
            hub: EventHub::new(),
            state: PageState::new(),
            metrics: SessionMetrics::new(),
            enabled_domains: Mutex::new(HashSet::new()),
            connected: AtomicBool::new(true),
            epoch: AtomicU64::new(1),
        });

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let shutdown = CancellationToken::new();
        tokio::spawn(Self::socket_loop(
            Arc::clone(&shared),
            ws,
            cmd_rx,
            shutdown.clone(),
            1,
        ));
        debug!(target: "cdp-session", target_id = %target.id, url = %ws_url, "session connected");

        let session = Self {
            target,
            shared,
            cmd_tx,
            shutdown,
            command_timeout: options.command_timeout,
        };

        if options.auto_enable {
            session.enable_defaults().await?;
        }
        Ok(session)
    }

    async fn socket_loop(
        shared: Arc<SessionShared>,
        ws: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        mut cmd_rx: mpsc::Receiver<OutboundCommand>,
        shutdown: CancellationToken,
        epoch: u64,
    ) {
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    let frame = json!({ "id": cmd.id, "method": cmd.method, "params": cmd.params });
                    if let Err(err) = sink.send(WsMessage::Text(frame.to_string().into())).await {
                        warn!(target: "cdp-session", ?err, "write to browser failed");
                        break;
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => shared.handle_frame(text.as_str()),
                        Some(Ok(WsMessage::Ping(payload))) => {
                            let _ = sink.send(WsMessage::Pong(payload)).await;
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!(target: "cdp-session", ?err, "browser socket error");
                            break;
                        }
                    }
                }
            }
        }
        shared.teardown(epoch);
        debug!(target: "cdp-session", "socket loop exited");
    }

    async fn enable_defaults(&self) -> Result<()> {
        let network_params = json!({
            "maxResourceBufferSize": NETWORK_RESOURCE_BUFFER,
            "maxTotalBufferSize": NETWORK_TOTAL_BUFFER,
        });
        self.enable_domain("Page", json!({})).await?;
        self.enable_domain("Runtime", json!({})).await?;
        self.enable_domain("Network", network_params).await?;
        self.enable_domain("DOM", json!({})).await?;
        self.send("Page.setLifecycleEventsEnabled", json!({ "enabled": true }))
            .await?;
        Ok(())
    }

    /// `<domain>.enable`, skipped when the domain is already on.
    pub async fn enable_domain(&self, domain: &str, params: Value) -> Result<()> {
        {
            let enabled = self
                .shared
                .enabled_domains
                .lock()
                .expect("enabled domains poisoned");
            if enabled.contains(domain) {
                return Ok(());
            }
        }
        self.send(&format!("{domain}.enable"), params).await?;
        self.shared
            .enabled_domains
            .lock()
            .expect("enabled domains poisoned")
            .insert(domain.to_string());
        Ok(())
    }

    /// Issue one command and await its correlated response. Resolves with the
    /// response `result`, or fails with the browser's error, `Timeout`, or
    /// `NotConnected`/`Disconnected`.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(CdpError::NotConnected);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx);

        let command = OutboundCommand {
            id,
            method: method.to_string(),
            params,
        };
        if self.cmd_tx.send(command).await.is_err() {
            self.shared.pending.remove(&id);
            return Err(CdpError::NotConnected);
        }

        let started = Instant::now();
        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(outcome)) => {
                let ended = match &outcome {
                    Ok(_) => CommandOutcome::Answered,
                    Err(_) => CommandOutcome::Refused,
                };
                self.shared.metrics.record(ended, started.elapsed());
                outcome
            }
            Ok(Err(_)) => {
                self.shared
                    .metrics
                    .record(CommandOutcome::Disconnected, started.elapsed());
                Err(CdpError::Disconnected)
            }
            Err(_) => {
                // The id stays consumed; a late response is ignored by the
                // demultiplexer once this entry is gone.
                self.shared.pending.remove(&id);
                self.shared
                    .metrics
                    .record(CommandOutcome::TimedOut, started.elapsed());
                Err(CdpError::timeout(method, self.command_timeout.as_millis() as u64))
            }
        }
    }

    /// Command accounting for this session since it connected.
    pub fn metrics(&self) -> MetricsReport {
        self.shared.metrics.report()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn events(&self) -> &EventHub {
        &self.shared.hub
    }

    pub fn state(&self) -> &PageState {
        &self.shared.state
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Tear the socket down; every pending command fails `Disconnected`.
    pub fn close(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
