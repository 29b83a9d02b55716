//! Contract tests against a live Chromium instance. Ignored by default:
//! they need a browser already listening on the debug port
//! (`chrome --remote-debugging-port=9222`) and
//! `CHROMELINK_CDP_CONTRACT=1` in the environment.

use std::env;
use std::time::Duration;

use serde_json::json;

use cdp_client::{
    CdpSession, NetworkIdleOptions, SessionOptions, TargetRef, TargetRegistry, WaitUntil,
};

fn contract_enabled() -> bool {
    env::var("CHROMELINK_CDP_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

async fn connect_first_page() -> CdpSession {
    let registry = TargetRegistry::new("127.0.0.1", 9222);
    let target = registry
        .resolve(&TargetRef::Default)
        .await
        .expect("a page target");
    CdpSession::connect(target, SessionOptions::default())
        .await
        .expect("session connect")
}

#[tokio::test]
#[ignore = "requires Chrome listening on 9222; set CHROMELINK_CDP_CONTRACT=1"]
async fn contract_navigate_and_wait_for_load() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (CHROMELINK_CDP_CONTRACT not enabled)");
        return;
    }

    let session = connect_first_page().await;
    let waiter = session.load_waiter(WaitUntil::Load, None);
    session
        .send("Page.navigate", json!({ "url": "https://example.com" }))
        .await
        .expect("navigate");
    waiter
        .wait(Duration::from_secs(15))
        .await
        .expect("load event");

    session
        .wait_for_network_idle(NetworkIdleOptions::default())
        .await
        .expect("network idle");

    let node = session.query("h1", None).await.expect("h1 present");
    let html = session.outer_html(&node).await.expect("outer html");
    assert!(html.contains("Example"));
    session.close();
}

#[tokio::test]
#[ignore = "requires Chrome listening on 9222; set CHROMELINK_CDP_CONTRACT=1"]
async fn contract_tab_index_stability() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (CHROMELINK_CDP_CONTRACT not enabled)");
        return;
    }

    let registry = TargetRegistry::new("127.0.0.1", 9222);
    let first = registry.list().await.expect("list");
    let second = registry.list().await.expect("list again");
    let ids_first: Vec<_> = first.iter().map(|t| t.id.clone()).collect();
    let ids_second: Vec<_> = second.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids_first, ids_second, "sorted target order is stable");
}
