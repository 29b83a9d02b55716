//! The host's single active CDP session and the rules for reusing it.
//!
//! Tool calls share one connection slot: a session already bound to the
//! requested target (exact id match, or no target requested) is reused as-is
//! — domains are not re-enabled. Asking for a different target closes the
//! previous session first. A `tab_id` naming a closed tab fails fast with
//! `NotFound`; no silent rebinding.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use cdp_client::{CdpError, CdpSession, SessionOptions, Target, TargetRef, TargetRegistry};

use crate::config::BridgeConfig;
use crate::errors::{BridgeError, BridgeResult};

pub struct SessionHub {
    registry: TargetRegistry,
    options: SessionOptions,
    active: Mutex<Option<Arc<CdpSession>>>,
}

impl SessionHub {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            registry: TargetRegistry::new(&config.chrome_host, config.debug_port),
            options: SessionOptions {
                auto_enable: config.auto_enable_domains,
                command_timeout: config.command_timeout(),
            },
            active: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Session bound to `tab` (or the first page target when absent),
    /// reusing the current connection when it already points there.
    pub async fn bind(&self, tab: Option<TargetRef>) -> Result<Arc<CdpSession>, CdpError> {
        let mut active = self.active.lock().await;

        let requested: Option<Target> = match &tab {
            None => None,
            Some(target_ref) => Some(self.registry.resolve(target_ref).await?),
        };

        if let Some(session) = active.as_ref() {
            if session.is_connected() {
                let reusable = match &requested {
                    None => true,
                    Some(target) => target.id == session.target().id,
                };
                if reusable {
                    return Ok(Arc::clone(session));
                }
            }
        }

        if let Some(previous) = active.take() {
            previous.close();
        }

        let target = match requested {
            Some(target) => target,
            None => self.registry.resolve(&TargetRef::Default).await?,
        };
        info!(target: "sessions", id = %target.id, url = %target.url, "binding cdp session");
        let session = Arc::new(CdpSession::connect(target, self.options.clone()).await?);
        *active = Some(Arc::clone(&session));
        Ok(session)
    }
}

/// `tab_id` argument: absent → default target, integer → index among page
/// targets, string → exact target id.
pub fn tab_ref_from_args(args: &Value) -> BridgeResult<Option<TargetRef>> {
    match args.get("tab_id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(|index| Some(TargetRef::Index(index as usize)))
            .ok_or_else(|| BridgeError::bad_arguments("tab_id index must be a non-negative integer")),
        Some(Value::String(id)) => Ok(Some(TargetRef::Id(id.clone()))),
        Some(other) => Err(BridgeError::bad_arguments(format!(
            "tab_id must be an index or target id, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tab_ref_parsing_covers_all_shapes() {
        assert_eq!(tab_ref_from_args(&json!({})).unwrap(), None);
        assert_eq!(tab_ref_from_args(&json!({ "tab_id": null })).unwrap(), None);
        assert_eq!(
            tab_ref_from_args(&json!({ "tab_id": 2 })).unwrap(),
            Some(TargetRef::Index(2))
        );
        assert_eq!(
            tab_ref_from_args(&json!({ "tab_id": "ABCD1234" })).unwrap(),
            Some(TargetRef::Id("ABCD1234".into()))
        );
        assert!(tab_ref_from_args(&json!({ "tab_id": -1 })).is_err());
        assert!(tab_ref_from_args(&json!({ "tab_id": [] })).is_err());
    }
}
