//! Target discovery against the browser's HTTP debugging endpoint.
//!
//! The `/json/list` endpoint is documented as unordered, but callers address
//! tabs by numeric index; the registry sorts by target id locally so indices
//! stay stable across calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CdpError, Result};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// One debuggable entity as reported by `/json/list`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: Option<String>,
}

impl Target {
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

/// How a caller names a target: nothing, a position, or an exact id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetRef {
    Default,
    Index(usize),
    Id(String),
}

/// Enumerates and manipulates targets over the discovery endpoint.
pub struct TargetRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl TargetRegistry {
    pub fn new(host: &str, port: u16) -> Self {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: format!("http://{host}:{port}"),
        }
    }

    /// All targets, stably sorted by id ascending.
    pub async fn list(&self) -> Result<Vec<Target>> {
        let url = format!("{}/json/list", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| CdpError::BrowserUnavailable(err.to_string()))?;
        let mut targets: Vec<Target> = response
            .json()
            .await
            .map_err(|err| CdpError::BrowserUnavailable(err.to_string()))?;
        targets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(targets)
    }

    pub async fn resolve(&self, target: &TargetRef) -> Result<Target> {
        let targets = self.list().await?;
        resolve_in(&targets, target)
    }

    /// Open a new tab via `/json/new`; Chrome requires PUT for this endpoint.
    pub async fn create(&self, url: Option<&str>) -> Result<Target> {
        let endpoint = match url {
            Some(url) => format!("{}/json/new?{}", self.base_url, url),
            None => format!("{}/json/new", self.base_url),
        };
        let response = self
            .http
            .put(&endpoint)
            .send()
            .await
            .map_err(|err| CdpError::BrowserUnavailable(err.to_string()))?;
        let target: Target = response
            .json()
            .await
            .map_err(|err| CdpError::BrowserUnavailable(err.to_string()))?;
        debug!(target: "cdp-targets", id = %target.id, "created tab");
        Ok(target)
    }

    pub async fn close(&self, id: &str) -> Result<()> {
        let endpoint = format!("{}/json/close/{id}", self.base_url);
        self.http
            .get(&endpoint)
            .send()
            .await
            .map_err(|err| CdpError::BrowserUnavailable(err.to_string()))?;
        Ok(())
    }
}

/// Resolution over an already-sorted target list. Numeric references count
/// page targets only.
pub fn resolve_in(targets: &[Target], target: &TargetRef) -> Result<Target> {
    match target {
        TargetRef::Default => targets
            .iter()
            .find(|t| t.is_page())
            .cloned()
            .ok_or_else(|| CdpError::NotFound("no page targets available".into())),
        TargetRef::Index(index) => {
            let pages: Vec<&Target> = targets.iter().filter(|t| t.is_page()).collect();
            pages
                .get(*index)
                .map(|t| (*t).clone())
                .ok_or(CdpError::IndexOutOfRange {
                    index: *index,
                    available: pages.len(),
                })
        }
        TargetRef::Id(id) => targets
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| CdpError::NotFound(format!("no target with id {id}"))),
    }
}
