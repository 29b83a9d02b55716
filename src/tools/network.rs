//! Cookie, header, cache, blocking, and response-wait tools.

use serde_json::{json, Map, Value};

use cdp_client::ResponseWaitOptions;

use crate::errors::{BridgeError, BridgeResult};
use crate::tools::{opt_str, opt_u64, require_bool, require_str, session, ToolContext, ToolOutput};

pub async fn cookies_get(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let mut params = json!({});
    if let Some(urls) = args.get("urls").filter(|v| v.is_array()) {
        params["urls"] = urls.clone();
    }
    let result = session.send("Network.getCookies", params).await?;
    Ok(ToolOutput::Json(json!({ "cookies": result["cookies"] })))
}

pub async fn cookies_set(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let cookies = args
        .get("cookies")
        .and_then(Value::as_array)
        .ok_or_else(|| BridgeError::bad_arguments("cookies_set requires a \"cookies\" array"))?;
    for cookie in cookies {
        if cookie["name"].as_str().is_none() || cookie["value"].as_str().is_none() {
            return Err(BridgeError::bad_arguments(
                "every cookie needs string \"name\" and \"value\" fields",
            ));
        }
    }
    session
        .send("Network.setCookies", json!({ "cookies": cookies }))
        .await?;
    Ok(ToolOutput::Json(json!({ "set": cookies.len() })))
}

pub async fn cookies_delete(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let name = require_str(args, "name")?;
    let mut params = json!({ "name": name });
    for key in ["url", "domain", "path"] {
        if let Some(value) = opt_str(args, key) {
            params[key] = json!(value);
        }
    }
    session.send("Network.deleteCookies", params).await?;
    Ok(ToolOutput::Json(json!({ "deleted": name })))
}

pub async fn cookies_clear(ctx: &ToolContext) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    session.send("Network.clearBrowserCookies", json!({})).await?;
    Ok(ToolOutput::Json(json!({ "cleared": true })))
}

/// Extra request headers. An empty (or absent) map replaces prior headers
/// with none; there is no merge.
pub async fn network_headers(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let headers = match args.get("headers") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(_) => {
            return Err(BridgeError::bad_arguments(
                "headers must be an object of header name to value",
            ))
        }
    };
    let count = headers.as_object().map(Map::len).unwrap_or(0);
    session
        .send("Network.setExtraHTTPHeaders", json!({ "headers": headers }))
        .await?;
    Ok(ToolOutput::Json(json!({ "headers_set": count })))
}

pub async fn network_cache(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let disabled = require_bool(args, "disabled")?;
    session
        .send("Network.setCacheDisabled", json!({ "cacheDisabled": disabled }))
        .await?;
    Ok(ToolOutput::Json(json!({ "cache_disabled": disabled })))
}

pub async fn network_block(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let urls = args
        .get("urls")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    session
        .send("Network.setBlockedURLs", json!({ "urls": urls }))
        .await?;
    Ok(ToolOutput::Json(json!({ "blocked_patterns": urls.len() })))
}

pub async fn network_wait_for_response(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let options = ResponseWaitOptions {
        url_substring: opt_str(args, "url_substring").map(str::to_string),
        url_regex: opt_str(args, "url_regex").map(str::to_string),
        http_method: opt_str(args, "method").map(str::to_string),
        status: args.get("status").and_then(Value::as_i64),
        resource_type: opt_str(args, "resource_type").map(str::to_string),
        timeout_ms: opt_u64(args, "timeout_ms"),
    };
    let matched = session.wait_for_response(options).await?;
    let value = serde_json::to_value(matched)
        .map_err(|err| BridgeError::Internal(format!("serializing response match: {err}")))?;
    Ok(ToolOutput::Json(value))
}
