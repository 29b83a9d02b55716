//! The duplex envelope carried between tool-calling clients and this host.
//!
//! Inbound messages wrap a JSON-RPC `tools/call` payload; outbound messages
//! reuse the wrapper with `direction: "from-chrome"` and a
//! `{requestId, result | error}` payload.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::BridgeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "to-chrome")]
    ToChrome,
    #[serde(rename = "from-chrome")]
    FromChrome,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub direction: Direction,
    pub timestamp: i64,
    pub payload: Value,
}

/// The JSON-RPC body of an inbound tool call.
#[derive(Clone, Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl Envelope {
    /// Response envelope carrying a result for `request_id`.
    pub fn result(request_id: &str, result: Value) -> Self {
        Self {
            id: request_id.to_string(),
            direction: Direction::FromChrome,
            timestamp: Utc::now().timestamp_millis(),
            payload: json!({ "requestId": request_id, "result": result }),
        }
    }

    /// Response envelope carrying a structured error for `request_id`.
    pub fn error(request_id: &str, code: &str, message: &str) -> Self {
        Self {
            id: request_id.to_string(),
            direction: Direction::FromChrome,
            timestamp: Utc::now().timestamp_millis(),
            payload: json!({
                "requestId": request_id,
                "error": { "code": code, "message": message },
            }),
        }
    }

    /// Extract the tool call from an inbound envelope.
    pub fn tool_call(&self) -> Result<ToolCall, BridgeError> {
        let method = self.payload["method"].as_str().unwrap_or_default();
        if method != "tools/call" {
            return Err(BridgeError::bad_arguments(format!(
                "unsupported payload method {method:?}"
            )));
        }
        serde_json::from_value(self.payload["params"].clone())
            .map_err(|err| BridgeError::bad_arguments(format!("malformed tool call: {err}")))
    }

    /// Tool name without full validation, for routing bookkeeping.
    pub fn tool_name(&self) -> Option<&str> {
        self.payload["params"]["name"].as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_envelope() -> Value {
        json!({
            "id": "env-7",
            "direction": "to-chrome",
            "timestamp": 1700000000000i64,
            "payload": {
                "jsonrpc": "2.0",
                "method": "tools/call",
                "params": { "name": "cookies_get", "arguments": { "tab_id": 0 } },
                "id": 7,
            },
        })
    }

    #[test]
    fn inbound_envelope_round_trips() {
        let envelope: Envelope = serde_json::from_value(call_envelope()).unwrap();
        assert_eq!(envelope.id, "env-7");
        assert_eq!(envelope.direction, Direction::ToChrome);

        let call = envelope.tool_call().unwrap();
        assert_eq!(call.name, "cookies_get");
        assert_eq!(call.arguments["tab_id"], json!(0));
    }

    #[test]
    fn non_tool_call_payloads_are_rejected() {
        let mut raw = call_envelope();
        raw["payload"]["method"] = json!("tools/list");
        let envelope: Envelope = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            envelope.tool_call(),
            Err(BridgeError::BadArguments(_))
        ));
    }

    #[test]
    fn responses_carry_the_request_id_in_both_places() {
        let response = Envelope::result("env-7", json!({ "cookies": [] }));
        assert_eq!(response.id, "env-7");
        assert_eq!(response.direction, Direction::FromChrome);
        assert_eq!(response.payload["requestId"], json!("env-7"));

        let failure = Envelope::error("env-8", "Timeout", "navigate timed out");
        assert_eq!(failure.payload["error"]["code"], json!("Timeout"));
    }
}
