//! Element-level tools. Node ids are returned together with the document
//! version they were resolved against; a later call presenting an id from an
//! older document fails `StaleNode` rather than being re-queried behind the
//! caller's back.

use serde_json::{json, Value};

use cdp_client::{CdpSession, NodeRef};

use crate::errors::{BridgeError, BridgeResult};
use crate::tools::{opt_str, require_str, session, ToolContext, ToolOutput};

/// Rebuild a node reference from tool arguments. Callers that carried the
/// `doc_version` from the original query get full staleness checking; one
/// omitting it is checked against the current document only.
fn node_from_args(session: &CdpSession, args: &Value) -> BridgeResult<NodeRef> {
    let node_id = args
        .get("node_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument \"node_id\""))?;
    let doc_version = args
        .get("doc_version")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| session.state().doc_version());
    Ok(NodeRef {
        node_id,
        selector: opt_str(args, "selector").map(str::to_string),
        doc_version,
    })
}

fn node_json(node: &NodeRef) -> Value {
    json!({
        "node_id": node.node_id,
        "selector": node.selector,
        "doc_version": node.doc_version,
    })
}

pub async fn element_query(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let selector = require_str(args, "selector")?;
    let node = session.query(selector, None).await?;
    Ok(ToolOutput::Json(node_json(&node)))
}

pub async fn element_query_all(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let selector = require_str(args, "selector")?;
    let nodes = session.query_all(selector, None).await?;
    Ok(ToolOutput::Json(json!({
        "count": nodes.len(),
        "nodes": nodes.iter().map(node_json).collect::<Vec<_>>(),
    })))
}

pub async fn element_scroll_into_view(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let node = node_from_args(session, args)?;
    session.scroll_into_view(&node).await?;
    Ok(ToolOutput::Json(json!({ "scrolled": true })))
}

pub async fn element_box_model(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let node = node_from_args(session, args)?;
    let model = session.box_model(&node).await?;
    Ok(ToolOutput::Json(json!({ "model": model })))
}

pub async fn element_focus(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let node = node_from_args(session, args)?;
    session.focus(&node).await?;
    Ok(ToolOutput::Json(json!({ "focused": true })))
}

pub async fn element_html(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let node = node_from_args(session, args)?;
    let html = session.outer_html(&node).await?;
    Ok(ToolOutput::Json(json!({ "outer_html": html })))
}
