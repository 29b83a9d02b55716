//! Derived page state, maintained purely by observing events.
//!
//! Two concerns live here: the document version (which invalidates cached
//! node ids) and the network request registry (the only reliable source of a
//! request's HTTP verb — `Network.responseReceived` carries the resource
//! type, not the method).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

/// Request registry capacity; eviction is FIFO by insertion order.
pub const NETWORK_REQUEST_CAPACITY: usize = 500;

/// Lifecycle of one network request, keyed by its CDP request id.
#[derive(Clone, Debug, Serialize)]
pub struct RequestRecord {
    pub url: String,
    pub method: String,
    pub sent_at_ms: i64,
    pub finished_at_ms: Option<i64>,
}

#[derive(Default)]
struct DocState {
    version: u64,
    root_node_id: Option<i64>,
    main_frame_id: Option<String>,
}

#[derive(Default)]
struct RequestLog {
    entries: HashMap<String, RequestRecord>,
    order: VecDeque<String>,
}

/// State tracker for one session. The document fields share a single lock so
/// a version bump and the root-node invalidation are one step to observers.
pub struct PageState {
    doc: Mutex<DocState>,
    requests: Mutex<RequestLog>,
}

impl PageState {
    pub fn new() -> Self {
        Self {
            doc: Mutex::new(DocState::default()),
            requests: Mutex::new(RequestLog::default()),
        }
    }

    /// Feed one inbound event through the tracker.
    pub fn observe(&self, method: &str, params: &Value, ts_ms: i64) {
        match method {
            "DOM.documentUpdated" => self.bump_doc_version(),
            "Page.frameNavigated" => {
                let frame = &params["frame"];
                // Only a main-frame navigation (no parent id) tears down the
                // document the cached node ids belong to.
                if frame["parentId"].as_str().is_none() {
                    let mut doc = self.doc.lock().expect("doc state poisoned");
                    doc.version += 1;
                    doc.root_node_id = None;
                    if let Some(id) = frame["id"].as_str() {
                        doc.main_frame_id = Some(id.to_string());
                    }
                }
            }
            "Network.requestWillBeSent" => {
                let Some(request_id) = params["requestId"].as_str() else {
                    return;
                };
                let record = RequestRecord {
                    url: params["request"]["url"].as_str().unwrap_or_default().to_string(),
                    method: params["request"]["method"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    sent_at_ms: ts_ms,
                    finished_at_ms: None,
                };
                self.insert_request(request_id.to_string(), record);
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                if let Some(request_id) = params["requestId"].as_str() {
                    let mut log = self.requests.lock().expect("request log poisoned");
                    if let Some(entry) = log.entries.get_mut(request_id) {
                        entry.finished_at_ms = Some(ts_ms);
                    }
                }
            }
            _ => {}
        }
    }

    fn bump_doc_version(&self) {
        let mut doc = self.doc.lock().expect("doc state poisoned");
        doc.version += 1;
        doc.root_node_id = None;
    }

    fn insert_request(&self, request_id: String, record: RequestRecord) {
        let mut log = self.requests.lock().expect("request log poisoned");
        if !log.entries.contains_key(&request_id) {
            if log.order.len() == NETWORK_REQUEST_CAPACITY {
                if let Some(oldest) = log.order.pop_front() {
                    log.entries.remove(&oldest);
                }
            }
            log.order.push_back(request_id.clone());
        }
        log.entries.insert(request_id, record);
    }

    pub fn doc_version(&self) -> u64 {
        self.doc.lock().expect("doc state poisoned").version
    }

    pub fn root_node_id(&self) -> Option<i64> {
        self.doc.lock().expect("doc state poisoned").root_node_id
    }

    pub fn main_frame_id(&self) -> Option<String> {
        self.doc
            .lock()
            .expect("doc state poisoned")
            .main_frame_id
            .clone()
    }

    /// Store a freshly fetched root node id, unless the document moved on
    /// while the fetch was in flight.
    pub fn cache_root(&self, node_id: i64, version_at_fetch: u64) -> bool {
        let mut doc = self.doc.lock().expect("doc state poisoned");
        if doc.version == version_at_fetch {
            doc.root_node_id = Some(node_id);
            true
        } else {
            false
        }
    }

    pub fn request(&self, request_id: &str) -> Option<RequestRecord> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .entries
            .get(request_id)
            .cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("request log poisoned").order.len()
    }

    /// Wipe everything; used when the session socket goes away.
    pub fn reset(&self) {
        *self.doc.lock().expect("doc state poisoned") = DocState::default();
        *self.requests.lock().expect("request log poisoned") = RequestLog::default();
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_event(id: &str, method: &str, url: &str) -> Value {
        json!({
            "requestId": id,
            "request": { "url": url, "method": method },
            "type": "Fetch",
        })
    }

    #[test]
    fn document_updated_bumps_version_and_drops_root() {
        let state = PageState::new();
        assert!(state.cache_root(7, 0));
        assert_eq!(state.root_node_id(), Some(7));

        state.observe("DOM.documentUpdated", &json!({}), 1);
        assert_eq!(state.doc_version(), 1);
        assert_eq!(state.root_node_id(), None);
    }

    #[test]
    fn only_main_frame_navigation_advances_version() {
        let state = PageState::new();

        state.observe(
            "Page.frameNavigated",
            &json!({ "frame": { "id": "child", "parentId": "main" } }),
            1,
        );
        assert_eq!(state.doc_version(), 0);

        state.observe(
            "Page.frameNavigated",
            &json!({ "frame": { "id": "main", "url": "https://example.com" } }),
            2,
        );
        assert_eq!(state.doc_version(), 1);
        assert_eq!(state.main_frame_id().as_deref(), Some("main"));
    }

    #[test]
    fn stale_root_fetch_is_not_cached() {
        let state = PageState::new();
        let version_before = state.doc_version();
        state.observe("DOM.documentUpdated", &json!({}), 1);

        assert!(!state.cache_root(42, version_before));
        assert_eq!(state.root_node_id(), None);
    }

    #[test]
    fn request_registry_records_method_from_request_will_be_sent() {
        let state = PageState::new();
        state.observe(
            "Network.requestWillBeSent",
            &request_event("req-1", "POST", "https://api.example/items"),
            100,
        );
        state.observe("Network.loadingFinished", &json!({ "requestId": "req-1" }), 150);

        let record = state.request("req-1").unwrap();
        assert_eq!(record.method, "POST");
        assert_eq!(record.finished_at_ms, Some(150));
    }

    #[test]
    fn request_registry_evicts_fifo_at_capacity() {
        let state = PageState::new();
        for i in 0..NETWORK_REQUEST_CAPACITY {
            state.observe(
                "Network.requestWillBeSent",
                &request_event(&format!("req-{i}"), "GET", "https://example.com"),
                i as i64,
            );
        }
        assert_eq!(state.request_count(), NETWORK_REQUEST_CAPACITY);

        // Touching an existing entry is an update, not a new insertion.
        state.observe(
            "Network.requestWillBeSent",
            &request_event("req-0", "GET", "https://example.com/redirect"),
            9999,
        );
        assert_eq!(state.request_count(), NETWORK_REQUEST_CAPACITY);
        assert!(state.request("req-0").is_some());

        state.observe(
            "Network.requestWillBeSent",
            &request_event("req-new", "GET", "https://example.com/new"),
            10_000,
        );
        assert_eq!(state.request_count(), NETWORK_REQUEST_CAPACITY);
        assert!(state.request("req-0").is_none(), "oldest insertion evicted");
        assert!(state.request("req-new").is_some());
    }
}
