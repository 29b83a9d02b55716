//! Tab enumeration, creation, and whole-page reads.

use serde_json::{json, Value};

use crate::errors::{BridgeError, BridgeResult};
use crate::tools::{opt_str, opt_u64, session, ToolContext, ToolOutput};

const READ_PAGE_SCRIPT: &str = include_str!("scripts/read_page.js");
const DEFAULT_READ_LIMIT: u64 = 100_000;

/// Enumerate page targets in their stable index order.
pub async fn tabs_context(ctx: &ToolContext) -> BridgeResult<ToolOutput> {
    let targets = ctx.hub.registry().list().await?;
    let tabs: Vec<Value> = targets
        .iter()
        .filter(|target| target.is_page())
        .enumerate()
        .map(|(index, target)| {
            json!({
                "index": index,
                "id": target.id,
                "title": target.title,
                "url": target.url,
            })
        })
        .collect();
    Ok(ToolOutput::Json(json!({ "count": tabs.len(), "tabs": tabs })))
}

pub async fn tabs_create(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let target = ctx.hub.registry().create(opt_str(args, "url")).await?;
    Ok(ToolOutput::Json(json!({
        "id": target.id,
        "title": target.title,
        "url": target.url,
    })))
}

/// Url, title, and visible text of the bound page in one call.
pub async fn read_page(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let limit = opt_u64(args, "max_length").unwrap_or(DEFAULT_READ_LIMIT);
    let expression = format!("({READ_PAGE_SCRIPT})({limit})");
    let result = session
        .send(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        )
        .await?;
    if let Some(details) = result.get("exceptionDetails") {
        let text = details["text"].as_str().unwrap_or("uncaught exception");
        return Err(BridgeError::Internal(format!("read_page script failed: {text}")));
    }
    Ok(ToolOutput::Json(result["result"]["value"].clone()))
}
