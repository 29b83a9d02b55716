//! Device, geolocation, timezone, and user-agent emulation tools.

use serde_json::{json, Value};

use crate::errors::{BridgeError, BridgeResult};
use crate::tools::{opt_bool, opt_f64, require_f64, require_str, session, ToolContext, ToolOutput};

/// Apply or clear a device metrics override. Clearing also turns touch
/// emulation back off so the default viewport is fully restored.
pub async fn emulate_device(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    if opt_bool(args, "clear").unwrap_or(false) {
        session.clear_device_metrics().await?;
        session.set_touch_emulation(false).await?;
        return Ok(ToolOutput::Json(json!({ "cleared": true })));
    }

    let width = args
        .get("width")
        .and_then(Value::as_u64)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument \"width\""))? as u32;
    let height = args
        .get("height")
        .and_then(Value::as_u64)
        .ok_or_else(|| BridgeError::bad_arguments("missing required argument \"height\""))? as u32;
    let scale = opt_f64(args, "device_scale_factor").unwrap_or(1.0);
    let mobile = opt_bool(args, "mobile").unwrap_or(false);

    session.set_device_metrics(width, height, scale, mobile).await?;
    if let Some(touch) = opt_bool(args, "touch") {
        session.set_touch_emulation(touch).await?;
    }
    Ok(ToolOutput::Json(json!({
        "width": width,
        "height": height,
        "device_scale_factor": scale,
        "mobile": mobile,
    })))
}

pub async fn emulate_geolocation(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    if opt_bool(args, "clear").unwrap_or(false) {
        session.clear_geolocation().await?;
        return Ok(ToolOutput::Json(json!({ "cleared": true })));
    }
    let latitude = require_f64(args, "latitude")?;
    let longitude = require_f64(args, "longitude")?;
    session
        .set_geolocation(latitude, longitude, opt_f64(args, "accuracy"))
        .await?;
    Ok(ToolOutput::Json(json!({ "latitude": latitude, "longitude": longitude })))
}

pub async fn emulate_timezone(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let timezone_id = require_str(args, "timezone_id")?;
    session.set_timezone(timezone_id).await?;
    Ok(ToolOutput::Json(json!({ "timezone_id": timezone_id })))
}

pub async fn emulate_user_agent(ctx: &ToolContext, args: &Value) -> BridgeResult<ToolOutput> {
    let session = session(ctx)?;
    let user_agent = require_str(args, "user_agent")?;
    session
        .set_user_agent(
            user_agent,
            args.get("accept_language").and_then(Value::as_str),
            args.get("platform").and_then(Value::as_str),
        )
        .await?;
    Ok(ToolOutput::Json(json!({ "user_agent": user_agent })))
}
