//! JavaScript dialogs and file-chooser interception.

use std::time::Duration;

use serde_json::{json, Value};

use cdp_client::{CdpSession, DialogAction, DialogWaitOptions, NodeRef};

use crate::errors::{BridgeError, BridgeResult};
use crate::paths::translate_client_path;
use crate::tools::{opt_bool, opt_str, opt_u64, require_bool, session, ToolContext, ToolOutput};

pub async fn dialog_wait(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let defaults = DialogWaitOptions::default();
    let options = DialogWaitOptions {
        timeout_ms: opt_u64(args, "timeout_ms").unwrap_or(defaults.timeout_ms),
        auto_handle: opt_bool(args, "auto_handle").unwrap_or(false),
        action: match opt_str(args, "action") {
            Some(raw) => DialogAction::parse(raw)?,
            None => defaults.action,
        },
        prompt_text: opt_str(args, "prompt_text").map(str::to_string),
    };
    let info = session.wait_for_dialog(options).await?;
    let value = serde_json::to_value(info)
        .map_err(|err| BridgeError::Internal(format!("serializing dialog info: {err}")))?;
    Ok(ToolOutput::Json(value))
}

/// Answer a dialog that is already showing.
pub async fn dialog_handle(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let accept = require_bool(args, "accept")?;
    let mut params = json!({ "accept": accept });
    if let Some(text) = opt_str(args, "prompt_text") {
        params["promptText"] = json!(text);
    }
    session.send("Page.handleJavaScriptDialog", params).await?;
    Ok(ToolOutput::Json(json!({ "handled": true, "accepted": accept })))
}

pub async fn file_chooser_wait(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let timeout = Duration::from_millis(opt_u64(args, "timeout_ms").unwrap_or(30_000));
    let info = session.wait_for_file_chooser(timeout).await?;
    let value = serde_json::to_value(info)
        .map_err(|err| BridgeError::Internal(format!("serializing chooser info: {err}")))?;
    Ok(ToolOutput::Json(value))
}

/// Hand files to a file input. Paths arrive in the client's POSIX form and
/// are translated to native paths before the browser sees them.
pub async fn file_upload(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let files: Vec<String> = args
        .get("files")
        .and_then(Value::as_array)
        .ok_or_else(|| BridgeError::bad_arguments("file_upload requires a \"files\" array"))?
        .iter()
        .map(|file| {
            file.as_str()
                .map(translate_client_path)
                .ok_or_else(|| BridgeError::bad_arguments("every file entry must be a string path"))
        })
        .collect::<BridgeResult<_>>()?;

    let backend_node_id = args.get("backend_node_id").and_then(Value::as_i64);
    let node = node_arg(session, args);
    session
        .set_file_input(&files, node.as_ref(), backend_node_id)
        .await?;
    Ok(ToolOutput::Json(json!({ "files": files })))
}

fn node_arg(session: &CdpSession, args: &Value) -> Option<NodeRef> {
    let node_id = args.get("node_id").and_then(Value::as_i64)?;
    Some(NodeRef {
        node_id,
        selector: None,
        doc_version: args
            .get("doc_version")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| session.state().doc_version()),
    })
}
