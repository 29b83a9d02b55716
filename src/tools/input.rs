//! Input synthesis, page text, element location, and script evaluation.

use std::time::Duration;

use serde_json::{json, Value};

use cdp_client::CdpSession;

use crate::errors::{BridgeError, BridgeResult};
use crate::tools::{
    opt_f64, opt_str, opt_u64, require_f64, require_str, session, ToolContext, ToolOutput,
};

const FIND_ELEMENTS_SCRIPT: &str = include_str!("scripts/find_elements.js");
const MAX_SYNTHETIC_WAIT_MS: u64 = 30_000;

/// The grab-bag input tool: one `action` argument selects the gesture.
pub async fn computer(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let action = require_str(args, "action")?;
    match action {
        "screenshot" => screenshot(session, args).await,
        "left_click" => click(session, args, 1).await,
        "double_click" => click(session, args, 2).await,
        "type" => {
            let text = require_str(args, "text")?;
            session
                .send("Input.insertText", json!({ "text": text }))
                .await?;
            Ok(ToolOutput::Json(json!({ "typed": text.chars().count() })))
        }
        "key" => press_key(session, require_str(args, "key")?).await,
        "scroll" => scroll(session, args).await,
        "wait" => {
            let ms = opt_u64(args, "duration_ms")
                .unwrap_or(1_000)
                .min(MAX_SYNTHETIC_WAIT_MS);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ToolOutput::Json(json!({ "waited_ms": ms })))
        }
        other => Err(BridgeError::bad_arguments(format!(
            "unsupported computer action {other:?}"
        ))),
    }
}

async fn screenshot(session: &CdpSession, args: &Value) -> BridgeResult<ToolOutput> {
    let format = match opt_str(args, "format") {
        None | Some("png") => "png",
        Some("jpeg") => "jpeg",
        Some(other) => {
            return Err(BridgeError::bad_arguments(format!(
                "screenshot format must be \"png\" or \"jpeg\", got {other:?}"
            )))
        }
    };
    let result = session
        .send("Page.captureScreenshot", json!({ "format": format }))
        .await?;
    let data = result["data"]
        .as_str()
        .ok_or_else(|| BridgeError::Internal("captureScreenshot returned no data".into()))?;
    Ok(ToolOutput::Image {
        data: data.to_string(),
        media_type: format!("image/{format}"),
    })
}

async fn click(session: &CdpSession, args: &Value, click_count: u32) -> BridgeResult<ToolOutput> {
    let x = require_f64(args, "x")?;
    let y = require_f64(args, "y")?;
    for kind in ["mousePressed", "mouseReleased"] {
        session
            .send(
                "Input.dispatchMouseEvent",
                json!({
                    "type": kind,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": click_count,
                }),
            )
            .await?;
    }
    Ok(ToolOutput::Json(json!({ "clicked": { "x": x, "y": y } })))
}

async fn scroll(session: &CdpSession, args: &Value) -> BridgeResult<ToolOutput> {
    let x = opt_f64(args, "x").unwrap_or(0.0);
    let y = opt_f64(args, "y").unwrap_or(0.0);
    let delta_x = opt_f64(args, "delta_x").unwrap_or(0.0);
    let delta_y = opt_f64(args, "delta_y").unwrap_or(0.0);
    session
        .send(
            "Input.dispatchMouseEvent",
            json!({
                "type": "mouseWheel",
                "x": x,
                "y": y,
                "deltaX": delta_x,
                "deltaY": delta_y,
            }),
        )
        .await?;
    Ok(ToolOutput::Json(json!({ "scrolled": { "delta_x": delta_x, "delta_y": delta_y } })))
}

async fn press_key(session: &CdpSession, key: &str) -> BridgeResult<ToolOutput> {
    let stroke = KeyStroke::resolve(key);
    session
        .send("Input.dispatchKeyEvent", stroke.down_event())
        .await?;
    session
        .send("Input.dispatchKeyEvent", stroke.up_event())
        .await?;
    Ok(ToolOutput::Json(json!({ "key": stroke.key })))
}

/// One entry per named key this tool set drives, carrying the
/// `Input.dispatchKeyEvent` fields Chrome keys autocomplete, focus
/// traversal, and editing behaviour off: the DOM `key`, the physical
/// `code`, the Windows virtual-key code, and the text payload (only
/// printable keys have one).
struct KeyStroke {
    key: String,
    code: Option<&'static str>,
    virtual_key: Option<i64>,
    text: Option<String>,
}

const NAMED_KEYS: &[(&str, &str, i64, Option<&str>)] = &[
    // DOM key, physical code, windowsVirtualKeyCode, text
    ("Enter", "Enter", 0x0D, Some("\r")),
    ("Tab", "Tab", 0x09, Some("\t")),
    ("Escape", "Escape", 0x1B, None),
    ("Backspace", "Backspace", 0x08, None),
    ("Delete", "Delete", 0x2E, None),
    ("ArrowUp", "ArrowUp", 0x26, None),
    ("ArrowDown", "ArrowDown", 0x28, None),
    ("ArrowLeft", "ArrowLeft", 0x25, None),
    ("ArrowRight", "ArrowRight", 0x27, None),
    ("Home", "Home", 0x24, None),
    ("End", "End", 0x23, None),
    ("PageUp", "PageUp", 0x21, None),
    ("PageDown", "PageDown", 0x22, None),
    (" ", "Space", 0x20, Some(" ")),
];

impl KeyStroke {
    /// Accepts the DOM key name in any casing, the arrow keys without their
    /// `Arrow` prefix, and a handful of colloquial names. Anything not in
    /// the table is treated as a printable character sequence.
    fn resolve(raw: &str) -> Self {
        let folded = raw.to_ascii_lowercase();
        let wanted = match folded.as_str() {
            "return" => "enter",
            "esc" => "escape",
            "space" | "spacebar" => " ",
            "up" | "down" | "left" | "right" => return Self::resolve(&format!("arrow{folded}")),
            other => other,
        };
        for (key, code, virtual_key, text) in NAMED_KEYS {
            if key.eq_ignore_ascii_case(wanted) {
                return Self {
                    key: (*key).to_string(),
                    code: Some(code),
                    virtual_key: Some(*virtual_key),
                    text: text.map(str::to_string),
                };
            }
        }
        Self {
            key: raw.to_string(),
            code: None,
            virtual_key: None,
            text: Some(raw.to_string()),
        }
    }

    fn down_event(&self) -> Value {
        let mut event = json!({ "type": "keyDown", "key": self.key });
        if let Some(code) = self.code {
            event["code"] = json!(code);
        }
        if let Some(virtual_key) = self.virtual_key {
            event["windowsVirtualKeyCode"] = json!(virtual_key);
        }
        if let Some(text) = &self.text {
            event["text"] = json!(text);
        }
        event
    }

    fn up_event(&self) -> Value {
        let mut event = json!({ "type": "keyUp", "key": self.key });
        if let Some(code) = self.code {
            event["code"] = json!(code);
        }
        if let Some(virtual_key) = self.virtual_key {
            event["windowsVirtualKeyCode"] = json!(virtual_key);
        }
        event
    }
}

/// Locate visible elements by text. Runs an injected script and returns
/// match candidates with coordinates and suggested selectors.
pub async fn find(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let query = require_str(args, "query")?;
    let max_results = opt_u64(args, "max_results").unwrap_or(10);
    let expression = format!(
        "({FIND_ELEMENTS_SCRIPT})({}, {max_results})",
        encode_literal(query)?
    );
    let matches = evaluate(session, &expression, true).await?;
    Ok(ToolOutput::Json(json!({ "matches": matches })))
}

/// Set a form control's value the way a user would leave it: focused, value
/// replaced, `input`/`change` dispatched.
pub async fn form_input(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let selector = require_str(args, "selector")?;
    let value = require_str(args, "value")?;
    let expression = format!(
        r#"(() => {{
            const el = document.querySelector({selector});
            if (!el) return false;
            el.focus();
            el.value = {value};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        selector = encode_literal(selector)?,
        value = encode_literal(value)?,
    );
    let filled = evaluate(session, &expression, true).await?;
    if filled.as_bool() != Some(true) {
        return Err(BridgeError::Cdp(cdp_client::CdpError::NotFound(format!(
            "no element matches selector {selector:?}"
        ))));
    }
    Ok(ToolOutput::Json(json!({ "filled": true })))
}

pub async fn get_page_text(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let expression = match opt_str(args, "selector") {
        Some(selector) => format!(
            r#"(() => {{
                const el = document.querySelector({});
                return el ? el.innerText : null;
            }})()"#,
            encode_literal(selector)?
        ),
        None => "document.body ? document.body.innerText : ''".to_string(),
    };
    let text = evaluate(session, &expression, true).await?;
    match text {
        Value::String(text) => Ok(ToolOutput::Json(json!({ "text": text }))),
        Value::Null => Err(BridgeError::Cdp(cdp_client::CdpError::NotFound(
            "selector matched no element".into(),
        ))),
        other => Ok(ToolOutput::Json(json!({ "text": other.to_string() }))),
    }
}

/// Raw `Runtime.evaluate`. Page exceptions come back in the result rather
/// than as transport errors so the caller can inspect them.
pub async fn javascript_tool(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let code = require_str(args, "code")?;
    let await_promise = args
        .get("await_promise")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let result = session
        .send(
            "Runtime.evaluate",
            json!({
                "expression": code,
                "returnByValue": true,
                "awaitPromise": await_promise,
            }),
        )
        .await?;

    let mut output = json!({ "result": result["result"]["value"] });
    if let Some(details) = result.get("exceptionDetails") {
        let text = details["exception"]["description"]
            .as_str()
            .or_else(|| details["text"].as_str())
            .unwrap_or("uncaught exception");
        output["exception"] = json!(text);
    }
    Ok(ToolOutput::Json(output))
}

/// JSON-encode a string for safe embedding in an injected script.
fn encode_literal(raw: &str) -> BridgeResult<String> {
    serde_json::to_string(raw)
        .map_err(|err| BridgeError::Internal(format!("encoding script literal: {err}")))
}

/// Evaluate an expression by value, surfacing page exceptions as errors.
async fn evaluate(session: &CdpSession, expression: &str, by_value: bool) -> BridgeResult<Value> {
    let result = session
        .send(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": by_value,
                "awaitPromise": true,
            }),
        )
        .await?;
    if let Some(details) = result.get("exceptionDetails") {
        let text = details["exception"]["description"]
            .as_str()
            .or_else(|| details["text"].as_str())
            .unwrap_or("uncaught exception");
        return Err(BridgeError::Internal(format!("injected script failed: {text}")));
    }
    Ok(result["result"]["value"].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_carry_full_dispatch_fields() {
        let enter = KeyStroke::resolve("enter");
        let down = enter.down_event();
        assert_eq!(down["key"], json!("Enter"));
        assert_eq!(down["code"], json!("Enter"));
        assert_eq!(down["windowsVirtualKeyCode"], json!(0x0D));
        assert_eq!(down["text"], json!("\r"));
        // keyUp never carries text.
        assert!(enter.up_event().get("text").is_none());
    }

    #[test]
    fn arrow_keys_resolve_with_and_without_prefix() {
        for raw in ["up", "ArrowUp", "arrowup"] {
            let stroke = KeyStroke::resolve(raw);
            assert_eq!(stroke.key, "ArrowUp");
            assert_eq!(stroke.virtual_key, Some(0x26));
            assert!(stroke.text.is_none(), "navigation keys are not printable");
        }
    }

    #[test]
    fn unlisted_keys_fall_back_to_printable_text() {
        let stroke = KeyStroke::resolve("a");
        assert_eq!(stroke.key, "a");
        assert_eq!(stroke.code, None);
        assert_eq!(stroke.down_event()["text"], json!("a"));
    }
}
