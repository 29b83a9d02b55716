//! The tool catalogue exposed to clients, keyed by tool name.

mod dialogs;
mod dom;
mod emulation;
mod input;
mod navigation;
mod network;
mod observe;
mod tabs;

use std::sync::Arc;

use serde_json::{json, Value};

use cdp_client::CdpSession;

use crate::errors::{BridgeError, BridgeResult};
use crate::sessions::SessionHub;

/// Everything a handler may need: the bound session (present whenever the
/// tool requires one) and the hub for target-level operations.
pub struct ToolContext {
    pub session: Option<Arc<CdpSession>>,
    pub hub: Arc<SessionHub>,
}

/// Handler result; images travel as base64 with an explicit media type, the
/// client proxy turns them into files.
pub enum ToolOutput {
    Json(Value),
    Image { data: String, media_type: String },
}

impl ToolOutput {
    pub fn into_payload(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Image { data, media_type } => json!({
                "type": "image",
                "data": data,
                "media_type": media_type,
            }),
        }
    }
}

pub struct ToolSpec {
    pub name: &'static str,
    pub requires_target: bool,
}

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec { name: "navigate", requires_target: true },
    ToolSpec { name: "page_reload", requires_target: true },
    ToolSpec { name: "page_wait_for_load", requires_target: true },
    ToolSpec { name: "page_wait_for_network_idle", requires_target: true },
    ToolSpec { name: "page_layout_metrics", requires_target: true },
    ToolSpec { name: "cookies_get", requires_target: true },
    ToolSpec { name: "cookies_set", requires_target: true },
    ToolSpec { name: "cookies_delete", requires_target: true },
    ToolSpec { name: "cookies_clear", requires_target: true },
    ToolSpec { name: "network_headers", requires_target: true },
    ToolSpec { name: "network_cache", requires_target: true },
    ToolSpec { name: "network_block", requires_target: true },
    ToolSpec { name: "network_wait_for_response", requires_target: true },
    ToolSpec { name: "element_query", requires_target: true },
    ToolSpec { name: "element_query_all", requires_target: true },
    ToolSpec { name: "element_scroll_into_view", requires_target: true },
    ToolSpec { name: "element_box_model", requires_target: true },
    ToolSpec { name: "element_focus", requires_target: true },
    ToolSpec { name: "element_html", requires_target: true },
    ToolSpec { name: "computer", requires_target: true },
    ToolSpec { name: "find", requires_target: true },
    ToolSpec { name: "form_input", requires_target: true },
    ToolSpec { name: "get_page_text", requires_target: true },
    ToolSpec { name: "javascript_tool", requires_target: true },
    ToolSpec { name: "dialog_handle", requires_target: true },
    ToolSpec { name: "dialog_wait", requires_target: true },
    ToolSpec { name: "file_upload", requires_target: true },
    ToolSpec { name: "file_chooser_wait", requires_target: true },
    ToolSpec { name: "emulate_device", requires_target: true },
    ToolSpec { name: "emulate_geolocation", requires_target: true },
    ToolSpec { name: "emulate_timezone", requires_target: true },
    ToolSpec { name: "emulate_user_agent", requires_target: true },
    ToolSpec { name: "console_enable", requires_target: true },
    ToolSpec { name: "console_messages", requires_target: true },
    ToolSpec { name: "console_clear", requires_target: true },
    ToolSpec { name: "performance_metrics", requires_target: true },
    ToolSpec { name: "tabs_context_mcp", requires_target: false },
    ToolSpec { name: "tabs_create_mcp", requires_target: false },
    ToolSpec { name: "read_page", requires_target: true },
];

pub fn spec(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

pub async fn invoke(ctx: &ToolContext, name: &str, args: &Value) -> BridgeResult<ToolOutput> {
    match name {
        "navigate" => navigation::navigate(ctx, args).await,
        "page_reload" => navigation::page_reload(ctx, args).await,
        "page_wait_for_load" => navigation::page_wait_for_load(ctx, args).await,
        "page_wait_for_network_idle" => navigation::page_wait_for_network_idle(ctx, args).await,
        "page_layout_metrics" => navigation::page_layout_metrics(ctx).await,
        "cookies_get" => network::cookies_get(ctx, args).await,
        "cookies_set" => network::cookies_set(ctx, args).await,
        "cookies_delete" => network::cookies_delete(ctx, args).await,
        "cookies_clear" => network::cookies_clear(ctx).await,
        "network_headers" => network::network_headers(ctx, args).await,
        "network_cache" => network::network_cache(ctx, args).await,
        "network_block" => network::network_block(ctx, args).await,
        "network_wait_for_response" => network::network_wait_for_response(ctx, args).await,
        "element_query" => dom::element_query(ctx, args).await,
        "element_query_all" => dom::element_query_all(ctx, args).await,
        "element_scroll_into_view" => dom::element_scroll_into_view(ctx, args).await,
        "element_box_model" => dom::element_box_model(ctx, args).await,
        "element_focus" => dom::element_focus(ctx, args).await,
        "element_html" => dom::element_html(ctx, args).await,
        "computer" => input::computer(ctx, args).await,
        "find" => input::find(ctx, args).await,
        "form_input" => input::form_input(ctx, args).await,
        "get_page_text" => input::get_page_text(ctx, args).await,
        "javascript_tool" => input::javascript_tool(ctx, args).await,
        "dialog_handle" => dialogs::dialog_handle(ctx, args).await,
        "dialog_wait" => dialogs::dialog_wait(ctx, args).await,
        "file_upload" => dialogs::file_upload(ctx, args).await,
        "file_chooser_wait" => dialogs::file_chooser_wait(ctx, args).await,
        "emulate_device" => emulation::emulate_device(ctx, args).await,
        "emulate_geolocation" => emulation::emulate_geolocation(ctx, args).await,
        "emulate_timezone" => emulation::emulate_timezone(ctx, args).await,
        "emulate_user_agent" => emulation::emulate_user_agent(ctx, args).await,
        "console_enable" => observe::console_enable(ctx).await,
        "console_messages" => observe::console_messages(ctx, args).await,
        "console_clear" => observe::console_clear(ctx).await,
        "performance_metrics" => observe::performance_metrics(ctx).await,
        "tabs_context_mcp" => tabs::tabs_context(ctx).await,
        "tabs_create_mcp" => tabs::tabs_create(ctx, args).await,
        "read_page" => tabs::read_page(ctx, args).await,
        other => Err(BridgeError::UnknownTool(other.to_string())),
    }
}

pub(crate) fn session(ctx: &ToolContext) -> BridgeResult<&Arc<CdpSession>> {
    ctx.session
        .as_ref()
        .ok_or_else(|| BridgeError::Internal("tool invoked without a bound session".into()))
}

pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> BridgeResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::bad_arguments(format!("missing required argument {key:?}")))
}

pub(crate) fn require_f64(args: &Value, key: &str) -> BridgeResult<f64> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| BridgeError::bad_arguments(format!("missing required argument {key:?}")))
}

pub(crate) fn require_u64(args: &Value, key: &str) -> BridgeResult<u64> {
    args.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| BridgeError::bad_arguments(format!("missing required argument {key:?}")))
}

pub(crate) fn require_bool(args: &Value, key: &str) -> BridgeResult<bool> {
    args.get(key)
        .and_then(Value::as_bool)
        .ok_or_else(|| BridgeError::bad_arguments(format!("missing required argument {key:?}")))
}

pub(crate) fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn opt_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

pub(crate) fn opt_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

pub(crate) fn opt_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_name_is_unique() {
        for (i, tool) in TOOLS.iter().enumerate() {
            assert!(
                TOOLS[i + 1..].iter().all(|other| other.name != tool.name),
                "duplicate tool name {}",
                tool.name
            );
        }
    }

    #[test]
    fn only_tab_level_tools_skip_target_binding() {
        let unbound: Vec<_> = TOOLS
            .iter()
            .filter(|tool| !tool.requires_target)
            .map(|tool| tool.name)
            .collect();
        assert_eq!(unbound, vec!["tabs_context_mcp", "tabs_create_mcp"]);
    }
}
