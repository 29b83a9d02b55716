//! Composite wait primitives: load completion, network idle, response match,
//! dialogs, and file choosers.
//!
//! Every primitive installs its subscription before issuing any command that
//! could trigger the awaited event, so the event cannot fall between the
//! action and the wait.

use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{CdpError, Result};
use crate::events::{EventRecord, Subscription, WILDCARD};
use crate::session::CdpSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
}

impl WaitUntil {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            other => Err(CdpError::BadArguments(format!(
                "wait_until must be \"load\" or \"domcontentloaded\", got {other:?}"
            ))),
        }
    }

    fn lifecycle_name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
        }
    }
}

/// A pre-registered subscription to `Page.lifecycleEvent`. Create it, then
/// issue the navigation, then await [`LoadWaiter::wait`].
pub struct LoadWaiter<'s> {
    session: &'s CdpSession,
    _sub: Subscription,
    rx: mpsc::UnboundedReceiver<EventRecord>,
    wait_until: WaitUntil,
    frame_id: Option<String>,
}

impl LoadWaiter<'_> {
    pub async fn wait(mut self, timeout: Duration) -> Result<Value> {
        if timeout.is_zero() {
            return Err(CdpError::timeout("wait_for_load", 0));
        }
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(event)) => {
                    if event.params["name"].as_str() == Some(self.wait_until.lifecycle_name())
                        && self.frame_matches(&event.params)
                    {
                        return Ok(event.params);
                    }
                }
                Ok(None) => return Err(CdpError::Disconnected),
                Err(_) => {
                    return Err(CdpError::timeout(
                        "wait_for_load",
                        timeout.as_millis() as u64,
                    ))
                }
            }
        }
    }

    /// Explicit frame id must match exactly; with none given the wait is
    /// keyed to the main frame, falling back to any frame while the main
    /// frame id is still unknown.
    fn frame_matches(&self, params: &Value) -> bool {
        let event_frame = params["frameId"].as_str();
        match &self.frame_id {
            Some(want) => event_frame == Some(want.as_str()),
            None => match self.session.state().main_frame_id() {
                Some(main) => event_frame == Some(main.as_str()),
                None => true,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct NetworkIdleOptions {
    pub idle_ms: u64,
    pub timeout_ms: u64,
    pub max_inflight: u64,
}

impl Default for NetworkIdleOptions {
    fn default() -> Self {
        Self {
            idle_ms: 500,
            timeout_ms: 30_000,
            max_inflight: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResponseWaitOptions {
    pub url_substring: Option<String>,
    pub url_regex: Option<String>,
    pub http_method: Option<String>,
    pub status: Option<i64>,
    pub resource_type: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResponseMatch {
    pub request_id: String,
    pub url: String,
    pub status: i64,
    pub headers: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogAction {
    Accept,
    Dismiss,
}

impl DialogAction {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "accept" => Ok(Self::Accept),
            "dismiss" => Ok(Self::Dismiss),
            other => Err(CdpError::BadArguments(format!(
                "action must be \"accept\" or \"dismiss\", got {other:?}"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DialogWaitOptions {
    pub timeout_ms: u64,
    pub auto_handle: bool,
    pub action: DialogAction,
    pub prompt_text: Option<String>,
}

impl Default for DialogWaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            auto_handle: false,
            action: DialogAction::Accept,
            prompt_text: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DialogInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub url: String,
    pub default_prompt: String,
    pub has_browser_handler: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FileChooserInfo {
    pub frame_id: String,
    pub mode: String,
    pub backend_node_id: Option<i64>,
}

/// Inflight bookkeeping for network idle. Long-lived WebSocket connections
/// never count; without this rule idle would be unreachable on many pages.
/// Returns whether the counter was touched.
pub(crate) fn apply_network_event(inflight: &mut u64, event: &EventRecord) -> bool {
    match event.method.as_str() {
        "Network.requestWillBeSent" => {
            if event.params["type"].as_str() == Some("WebSocket") {
                false
            } else {
                *inflight += 1;
                true
            }
        }
        "Network.loadingFinished" | "Network.loadingFailed" => {
            *inflight = inflight.saturating_sub(1);
            true
        }
        _ => false,
    }
}

impl CdpSession {
    pub fn load_waiter(&self, wait_until: WaitUntil, frame_id: Option<String>) -> LoadWaiter<'_> {
        let (sub, rx) = self.events().subscribe("Page.lifecycleEvent");
        LoadWaiter {
            session: self,
            _sub: sub,
            rx,
            wait_until,
            frame_id,
        }
    }

    pub async fn wait_for_load(
        &self,
        wait_until: WaitUntil,
        frame_id: Option<String>,
        timeout: Duration,
    ) -> Result<Value> {
        self.load_waiter(wait_until, frame_id).wait(timeout).await
    }

    /// Resolves once at most `max_inflight` requests have been in flight for
    /// `idle_ms`. Invocations are independent; nothing is shared between
    /// concurrent callers.
    pub async fn wait_for_network_idle(&self, options: NetworkIdleOptions) -> Result<()> {
        if options.timeout_ms == 0 {
            return Err(CdpError::timeout("wait_for_network_idle", 0));
        }
        let (_sub, mut rx) = self.events().subscribe(WILDCARD);
        let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);
        let mut inflight: u64 = 0;

        loop {
            if inflight <= options.max_inflight {
                let idle = tokio::time::sleep(Duration::from_millis(options.idle_ms));
                tokio::pin!(idle);
                loop {
                    tokio::select! {
                        _ = &mut idle => return Ok(()),
                        _ = tokio::time::sleep_until(deadline) => {
                            return Err(CdpError::timeout(
                                "wait_for_network_idle",
                                options.timeout_ms,
                            ));
                        }
                        event = rx.recv() => match event {
                            Some(event) => {
                                if apply_network_event(&mut inflight, &event) {
                                    break;
                                }
                            }
                            None => return Err(CdpError::Disconnected),
                        },
                    }
                }
            } else {
                match tokio::time::timeout_at(deadline, rx.recv()).await {
                    Ok(Some(event)) => {
                        apply_network_event(&mut inflight, &event);
                    }
                    Ok(None) => return Err(CdpError::Disconnected),
                    Err(_) => {
                        return Err(CdpError::timeout(
                            "wait_for_network_idle",
                            options.timeout_ms,
                        ))
                    }
                }
            }
        }
    }

    /// First `Network.responseReceived` on which every supplied predicate
    /// holds. The regex compiles up front; the HTTP method is resolved
    /// through the request registry and an untracked request never matches.
    pub async fn wait_for_response(&self, options: ResponseWaitOptions) -> Result<ResponseMatch> {
        let pattern = options
            .url_regex
            .as_deref()
            .map(|raw| Regex::new(raw).map_err(|err| CdpError::BadPattern(err.to_string())))
            .transpose()?;
        let timeout = Duration::from_millis(options.timeout_ms.unwrap_or(30_000));
        let state = self.state();

        let event = self
            .events()
            .wait_for_event("Network.responseReceived", timeout, |params| {
                let response = &params["response"];
                let url = response["url"].as_str().unwrap_or_default();
                if let Some(needle) = &options.url_substring {
                    if !url.contains(needle.as_str()) {
                        return false;
                    }
                }
                if let Some(pattern) = &pattern {
                    if !pattern.is_match(url) {
                        return false;
                    }
                }
                if let Some(status) = options.status {
                    if response["status"].as_i64() != Some(status) {
                        return false;
                    }
                }
                if let Some(resource_type) = &options.resource_type {
                    let observed = params["type"].as_str().unwrap_or_default();
                    if !observed.eq_ignore_ascii_case(resource_type) {
                        return false;
                    }
                }
                if let Some(method) = &options.http_method {
                    let request_id = params["requestId"].as_str().unwrap_or_default();
                    match state.request(request_id) {
                        Some(record) => {
                            if !record.method.eq_ignore_ascii_case(method) {
                                return false;
                            }
                        }
                        None => return false,
                    }
                }
                true
            })
            .await?;

        let response = &event.params["response"];
        Ok(ResponseMatch {
            request_id: event.params["requestId"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            url: response["url"].as_str().unwrap_or_default().to_string(),
            status: response["status"].as_i64().unwrap_or_default(),
            headers: response["headers"].clone(),
        })
    }

    /// Await `Page.javascriptDialogOpening`, optionally answering it in the
    /// same step. `prompt_text` is forwarded only to prompt dialogs.
    pub async fn wait_for_dialog(&self, options: DialogWaitOptions) -> Result<DialogInfo> {
        let event = self
            .events()
            .wait_for_event(
                "Page.javascriptDialogOpening",
                Duration::from_millis(options.timeout_ms),
                |_| true,
            )
            .await?;
        let params = event.params;
        let kind = params["type"].as_str().unwrap_or_default().to_string();

        if options.auto_handle {
            let mut handle = json!({
                "accept": options.action == DialogAction::Accept,
            });
            if kind == "prompt" {
                if let Some(text) = &options.prompt_text {
                    handle["promptText"] = json!(text);
                }
            }
            self.send("Page.handleJavaScriptDialog", handle).await?;
        }

        Ok(DialogInfo {
            kind,
            message: params["message"].as_str().unwrap_or_default().to_string(),
            url: params["url"].as_str().unwrap_or_default().to_string(),
            default_prompt: params["defaultPrompt"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            has_browser_handler: params["hasBrowserHandler"].as_bool().unwrap_or(false),
        })
    }

    /// Intercept the next file chooser. The subscription goes in before the
    /// (idempotent) interception enable so the opening cannot be missed.
    pub async fn wait_for_file_chooser(&self, timeout: Duration) -> Result<FileChooserInfo> {
        let (_sub, mut rx) = self.events().subscribe("Page.fileChooserOpened");
        self.send(
            "Page.setInterceptFileChooserDialog",
            json!({ "enabled": true }),
        )
        .await?;

        let deadline = Instant::now() + timeout;
        let event = match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => return Err(CdpError::Disconnected),
            Err(_) => {
                return Err(CdpError::timeout(
                    "wait_for_file_chooser",
                    timeout.as_millis() as u64,
                ))
            }
        };

        Ok(FileChooserInfo {
            frame_id: event.params["frameId"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            mode: event.params["mode"].as_str().unwrap_or_default().to_string(),
            backend_node_id: event.params["backendNodeId"].as_i64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(method: &str, params: Value) -> EventRecord {
        EventRecord {
            method: method.to_string(),
            params,
            ts_ms: 0,
        }
    }

    #[test]
    fn websocket_requests_do_not_count_toward_inflight() {
        let mut inflight = 0u64;
        let touched = apply_network_event(
            &mut inflight,
            &event(
                "Network.requestWillBeSent",
                json!({ "requestId": "ws-1", "type": "WebSocket" }),
            ),
        );
        assert!(!touched);
        assert_eq!(inflight, 0);

        apply_network_event(
            &mut inflight,
            &event(
                "Network.requestWillBeSent",
                json!({ "requestId": "r-1", "type": "XHR" }),
            ),
        );
        assert_eq!(inflight, 1);
    }

    #[test]
    fn finish_events_saturate_at_zero() {
        let mut inflight = 0u64;
        apply_network_event(
            &mut inflight,
            &event("Network.loadingFailed", json!({ "requestId": "ws-1" })),
        );
        assert_eq!(inflight, 0);
    }

    #[test]
    fn unrelated_events_leave_the_counter_alone() {
        let mut inflight = 3u64;
        let touched = apply_network_event(
            &mut inflight,
            &event("Network.responseReceived", json!({ "requestId": "r-1" })),
        );
        assert!(!touched);
        assert_eq!(inflight, 3);
    }

    #[test]
    fn wait_until_parsing() {
        assert_eq!(WaitUntil::parse("load").unwrap(), WaitUntil::Load);
        assert_eq!(
            WaitUntil::parse("domcontentloaded").unwrap(),
            WaitUntil::DomContentLoaded
        );
        assert!(matches!(
            WaitUntil::parse("networkidle"),
            Err(CdpError::BadArguments(_))
        ));
    }
}
