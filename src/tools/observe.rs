//! Console retrieval and performance metrics.
//!
//! Console messages are served pull-style out of the session's event ring;
//! nothing here blocks on a live subscription.

use serde_json::{json, Value};

use cdp_client::EventRecord;

use crate::errors::BridgeResult;
use crate::tools::{session, ToolContext, ToolOutput};

pub async fn console_enable(ctx: &ToolContext) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    session.enable_domain("Runtime", json!({})).await?;
    session.enable_domain("Log", json!({})).await?;
    Ok(ToolOutput::Json(json!({ "enabled": true })))
}

pub async fn console_messages(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let since = args.get("since_ts_ms").and_then(Value::as_i64).unwrap_or(0);
    let hub = session.events();

    let mut messages: Vec<Value> = hub
        .buffered_events(Some("Runtime.consoleAPICalled"), since)
        .iter()
        .map(console_api_entry)
        .chain(
            hub.buffered_events(Some("Log.entryAdded"), since)
                .iter()
                .map(log_entry),
        )
        .collect();
    messages.sort_by_key(|entry| entry["ts_ms"].as_i64().unwrap_or(0));

    Ok(ToolOutput::Json(json!({
        "count": messages.len(),
        "messages": messages,
    })))
}

pub async fn console_clear(ctx: &ToolContext) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    session.events().clear_ring();
    Ok(ToolOutput::Json(json!({ "cleared": true })))
}

/// Browser-side `Performance.getMetrics` plus this session's own command
/// accounting and event-ring counters.
pub async fn performance_metrics(ctx: &ToolContext) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    session.enable_domain("Performance", json!({})).await?;
    let result = session.send("Performance.getMetrics", json!({})).await?;
    let commands = serde_json::to_value(session.metrics())
        .map_err(|err| crate::errors::BridgeError::Internal(format!("serializing metrics: {err}")))?;
    let ring = serde_json::to_value(session.events().ring_stats())
        .map_err(|err| crate::errors::BridgeError::Internal(format!("serializing ring stats: {err}")))?;
    Ok(ToolOutput::Json(json!({
        "metrics": result["metrics"],
        "session": { "commands": commands, "events": ring },
    })))
}

fn console_api_entry(event: &EventRecord) -> Value {
    let text = event.params["args"]
        .as_array()
        .map(|args| {
            args.iter()
                .map(|arg| {
                    arg["value"]
                        .as_str()
                        .map(str::to_string)
                        .or_else(|| arg["value"].as_i64().map(|v| v.to_string()))
                        .or_else(|| arg["description"].as_str().map(str::to_string))
                        .unwrap_or_else(|| arg["value"].to_string())
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    json!({
        "source": "console",
        "level": event.params["type"].as_str().unwrap_or("log"),
        "text": text,
        "ts_ms": event.ts_ms,
    })
}

fn log_entry(event: &EventRecord) -> Value {
    json!({
        "source": event.params["entry"]["source"].as_str().unwrap_or("other"),
        "level": event.params["entry"]["level"].as_str().unwrap_or("info"),
        "text": event.params["entry"]["text"].as_str().unwrap_or_default(),
        "ts_ms": event.ts_ms,
    })
}
