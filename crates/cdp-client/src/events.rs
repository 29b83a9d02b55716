//! In-process fan-out of protocol events.
//!
//! Subscribers register an unbounded channel under an event method (or the
//! `"*"` wildcard) and receive every matching event in browser-emission
//! order. A bounded ring of recent events backs pull-style consumers such as
//! console-message retrieval.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{CdpError, Result};

/// Ring capacity; oldest events are evicted first on overflow.
pub const EVENT_RING_CAPACITY: usize = 1000;

/// Method that matches every event.
pub const WILDCARD: &str = "*";

/// One observed protocol event.
#[derive(Clone, Debug, Serialize)]
pub struct EventRecord {
    pub method: String,
    pub params: Value,
    pub ts_ms: i64,
}

struct HubInner {
    next_token: AtomicU64,
    subscribers: DashMap<String, HashMap<u64, mpsc::UnboundedSender<EventRecord>>>,
    ring: Mutex<VecDeque<EventRecord>>,
    published: AtomicU64,
    evicted: AtomicU64,
}

/// Lifetime counters for the ring: how much arrived, and how much aged out
/// before any pull-style consumer saw it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub published: u64,
    pub evicted: u64,
    pub buffered: usize,
}

/// Publish/subscribe hub owned by one session.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

/// Removing the subscriber happens on revoke or drop, atomically with
/// respect to future dispatches.
pub struct Subscription {
    inner: Arc<HubInner>,
    method: String,
    token: u64,
}

impl Subscription {
    pub fn revoke(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut entry) = self.inner.subscribers.get_mut(&self.method) {
            entry.remove(&self.token);
        }
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                next_token: AtomicU64::new(1),
                subscribers: DashMap::new(),
                ring: Mutex::new(VecDeque::with_capacity(EVENT_RING_CAPACITY)),
                published: AtomicU64::new(0),
                evicted: AtomicU64::new(0),
            }),
        }
    }

    /// Register a subscriber for `method` (or [`WILDCARD`]).
    pub fn subscribe(&self, method: &str) -> (Subscription, mpsc::UnboundedReceiver<EventRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .entry(method.to_string())
            .or_default()
            .insert(token, tx);
        (
            Subscription {
                inner: Arc::clone(&self.inner),
                method: method.to_string(),
                token,
            },
            rx,
        )
    }

    /// Append to the ring and deliver to exact-method and wildcard
    /// subscribers. A subscriber whose receiver is gone is pruned here.
    pub fn publish(&self, method: &str, params: Value, ts_ms: i64) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        let record = EventRecord {
            method: method.to_string(),
            params,
            ts_ms,
        };

        {
            let mut ring = self.inner.ring.lock().expect("event ring poisoned");
            if ring.len() == EVENT_RING_CAPACITY {
                ring.pop_front();
                self.inner.evicted.fetch_add(1, Ordering::Relaxed);
            }
            ring.push_back(record.clone());
        }

        for key in [method, WILDCARD] {
            if let Some(mut entry) = self.inner.subscribers.get_mut(key) {
                entry.retain(|_, tx| tx.send(record.clone()).is_ok());
            }
        }
    }

    /// First event for which `filter` holds, within `timeout`. The
    /// subscriber is installed before this returns a pending future, so a
    /// caller that subscribes first and acts second cannot lose the event.
    /// A zero timeout rejects without consuming anything.
    pub async fn wait_for_event<F>(
        &self,
        method: &str,
        timeout: Duration,
        filter: F,
    ) -> Result<EventRecord>
    where
        F: Fn(&Value) -> bool,
    {
        if timeout.is_zero() {
            return Err(CdpError::timeout(method, 0));
        }
        let (_sub, mut rx) = self.subscribe(method);
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => {
                    if filter(&event.params) {
                        return Ok(event);
                    }
                }
                Ok(None) => return Err(CdpError::Disconnected),
                Err(_) => return Err(CdpError::timeout(method, timeout.as_millis() as u64)),
            }
        }
    }

    /// Slice of the ring, optionally narrowed to one method and a lower
    /// timestamp bound.
    pub fn buffered_events(&self, method: Option<&str>, since_ts_ms: i64) -> Vec<EventRecord> {
        let ring = self.inner.ring.lock().expect("event ring poisoned");
        ring.iter()
            .filter(|event| event.ts_ms >= since_ts_ms)
            .filter(|event| method.map_or(true, |m| event.method == m))
            .cloned()
            .collect()
    }

    pub fn ring_len(&self) -> usize {
        self.inner.ring.lock().expect("event ring poisoned").len()
    }

    pub fn ring_stats(&self) -> RingStats {
        RingStats {
            published: self.inner.published.load(Ordering::Relaxed),
            evicted: self.inner.evicted.load(Ordering::Relaxed),
            buffered: self.ring_len(),
        }
    }

    pub fn clear_ring(&self) {
        self.inner.ring.lock().expect("event ring poisoned").clear();
    }

    /// Teardown on disconnect: drops every subscriber sender (waiters see a
    /// closed channel) and empties the ring.
    pub fn clear_all(&self) {
        self.inner.subscribers.clear();
        self.clear_ring();
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn publish_n(hub: &EventHub, n: usize) {
        for i in 0..n {
            hub.publish("Network.requestWillBeSent", json!({ "seq": i }), i as i64);
        }
    }

    #[test]
    fn ring_evicts_oldest_at_capacity() {
        let hub = EventHub::new();
        publish_n(&hub, EVENT_RING_CAPACITY);
        assert_eq!(hub.ring_len(), EVENT_RING_CAPACITY);

        hub.publish("Network.requestWillBeSent", json!({ "seq": "last" }), 99_999);
        assert_eq!(hub.ring_len(), EVENT_RING_CAPACITY);

        let events = hub.buffered_events(None, 0);
        assert_eq!(events.first().unwrap().params["seq"], json!(1));
        assert_eq!(events.last().unwrap().params["seq"], json!("last"));

        let stats = hub.ring_stats();
        assert_eq!(stats.published, EVENT_RING_CAPACITY as u64 + 1);
        assert_eq!(stats.evicted, 1);
        assert_eq!(stats.buffered, EVENT_RING_CAPACITY);
    }

    #[test]
    fn buffered_events_filters_method_and_timestamp() {
        let hub = EventHub::new();
        hub.publish("Page.lifecycleEvent", json!({ "name": "load" }), 10);
        hub.publish("Runtime.consoleAPICalled", json!({ "type": "log" }), 20);
        hub.publish("Runtime.consoleAPICalled", json!({ "type": "error" }), 30);

        let console = hub.buffered_events(Some("Runtime.consoleAPICalled"), 25);
        assert_eq!(console.len(), 1);
        assert_eq!(console[0].params["type"], json!("error"));
    }

    #[test]
    fn clear_ring_leaves_subscribers_in_place() {
        let hub = EventHub::new();
        let (_sub, mut rx) = hub.subscribe("Page.loadEventFired");
        hub.publish("Page.loadEventFired", json!({}), 1);
        hub.clear_ring();
        assert_eq!(hub.ring_len(), 0);

        hub.publish("Page.loadEventFired", json!({}), 2);
        assert_eq!(rx.try_recv().unwrap().ts_ms, 1);
        assert_eq!(rx.try_recv().unwrap().ts_ms, 2);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let hub = EventHub::new();
        let (sub, mut rx) = hub.subscribe("DOM.documentUpdated");
        hub.publish("DOM.documentUpdated", json!({}), 1);
        sub.revoke();
        hub.publish("DOM.documentUpdated", json!({}), 2);

        assert_eq!(rx.try_recv().unwrap().ts_ms, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn wildcard_sees_every_method() {
        let hub = EventHub::new();
        let (_sub, mut rx) = hub.subscribe(WILDCARD);
        hub.publish("Page.lifecycleEvent", json!({}), 1);
        hub.publish("Network.loadingFinished", json!({}), 2);

        assert_eq!(rx.try_recv().unwrap().method, "Page.lifecycleEvent");
        assert_eq!(rx.try_recv().unwrap().method, "Network.loadingFinished");
    }

    #[tokio::test]
    async fn zero_timeout_rejects_without_consuming() {
        let hub = EventHub::new();
        let (_sub, mut rx) = hub.subscribe("Page.loadEventFired");
        hub.publish("Page.loadEventFired", json!({}), 1);

        let result = hub
            .wait_for_event("Page.loadEventFired", Duration::ZERO, |_| true)
            .await;
        assert!(matches!(result, Err(CdpError::Timeout { .. })));

        // The queued event is still there for the standing subscriber.
        assert_eq!(rx.try_recv().unwrap().ts_ms, 1);
    }

    #[tokio::test]
    async fn wait_for_event_applies_filter() {
        let hub = EventHub::new();
        let waiter = {
            let hub = hub.clone();
            tokio::spawn(async move {
                hub.wait_for_event("Page.lifecycleEvent", Duration::from_secs(2), |params| {
                    params["name"] == json!("load")
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        hub.publish("Page.lifecycleEvent", json!({ "name": "init" }), 1);
        hub.publish("Page.lifecycleEvent", json!({ "name": "load" }), 2);

        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.ts_ms, 2);
    }
}
