//! Navigation and page-level wait tools.

use std::time::Duration;

use serde_json::{json, Value};

use cdp_client::{NetworkIdleOptions, WaitUntil};

use crate::errors::BridgeResult;
use crate::tools::{opt_bool, opt_str, opt_u64, require_str, session, ToolContext, ToolOutput};

const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// `Page.navigate`, then (unless `wait_until: "none"`) the matching
/// lifecycle wait. The lifecycle subscription goes in before the command so
/// a fast navigation cannot slip past it.
pub async fn navigate(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let url = require_str(args, "url")?;
    let wait_until = match opt_str(args, "wait_until") {
        None => Some(WaitUntil::Load),
        Some("none") => None,
        Some(raw) => Some(WaitUntil::parse(raw)?),
    };
    let timeout = Duration::from_millis(opt_u64(args, "timeout_ms").unwrap_or(DEFAULT_WAIT_TIMEOUT_MS));

    let waiter = wait_until.map(|w| session.load_waiter(w, None));
    let result = session.send("Page.navigate", json!({ "url": url })).await?;

    let mut output = json!({
        "url": url,
        "frame_id": result["frameId"],
    });
    if let Some(error_text) = result["errorText"].as_str().filter(|s| !s.is_empty()) {
        output["error_text"] = json!(error_text);
        return Ok(ToolOutput::Json(output));
    }
    if let Some(waiter) = waiter {
        waiter.wait(timeout).await?;
        output["loaded"] = json!(true);
    }
    Ok(ToolOutput::Json(output))
}

pub async fn page_reload(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let ignore_cache = opt_bool(args, "ignore_cache").unwrap_or(false);
    session
        .send("Page.reload", json!({ "ignoreCache": ignore_cache }))
        .await?;
    Ok(ToolOutput::Json(json!({ "reloaded": true })))
}

pub async fn page_wait_for_load(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let wait_until = WaitUntil::parse(opt_str(args, "wait_until").unwrap_or("load"))?;
    let frame_id = opt_str(args, "frame_id").map(str::to_string);
    let timeout = Duration::from_millis(opt_u64(args, "timeout_ms").unwrap_or(DEFAULT_WAIT_TIMEOUT_MS));
    let params = session.wait_for_load(wait_until, frame_id, timeout).await?;
    Ok(ToolOutput::Json(params))
}

pub async fn page_wait_for_network_idle(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let defaults = NetworkIdleOptions::default();
    let options = NetworkIdleOptions {
        idle_ms: opt_u64(args, "idle_ms").unwrap_or(defaults.idle_ms),
        timeout_ms: opt_u64(args, "timeout_ms").unwrap_or(defaults.timeout_ms),
        max_inflight: opt_u64(args, "max_inflight").unwrap_or(defaults.max_inflight),
    };
    session.wait_for_network_idle(options).await?;
    Ok(ToolOutput::Json(json!({ "idle": true })))
}

pub async fn page_layout_metrics(ctx: &ToolContext) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let metrics = session.layout_metrics().await?;
    Ok(ToolOutput::Json(metrics))
}
