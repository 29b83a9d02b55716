//! DOM queries with explicit node-id lifecycle.
//!
//! A node id is only meaningful within the document version it was resolved
//! against. Staleness is surfaced, never papered over with a re-query — a
//! re-query could land on a different element than the caller meant.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CdpError, Result};
use crate::session::CdpSession;

/// A resolved DOM node plus the document version it belongs to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRef {
    pub node_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub doc_version: u64,
}

impl NodeRef {
    pub fn is_stale(&self, current_doc_version: u64) -> bool {
        self.doc_version < current_doc_version
    }
}

impl CdpSession {
    /// Root node id, fetching `DOM.getDocument` when the cached one was
    /// invalidated by a navigation or `DOM.documentUpdated`.
    pub async fn ensure_root(&self) -> Result<i64> {
        if let Some(root) = self.state().root_node_id() {
            return Ok(root);
        }
        let version_before = self.state().doc_version();
        let result = self
            .send("DOM.getDocument", json!({ "depth": -1, "pierce": true }))
            .await?;
        let root = result["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| CdpError::internal("DOM.getDocument returned no root node id"))?;
        // Cached only when the document did not move on mid-fetch; the id is
        // still returned either way and staleness surfaces on first use.
        self.state().cache_root(root, version_before);
        Ok(root)
    }

    /// Fail with `StaleNode` when the reference predates the current
    /// document.
    pub fn ensure_fresh(&self, node: &NodeRef) -> Result<()> {
        if node.is_stale(self.state().doc_version()) {
            return Err(CdpError::StaleNode {
                node_id: node.node_id,
            });
        }
        Ok(())
    }

    /// Resolve the first match for `selector`, scoped to `scope` or to the
    /// document root.
    pub async fn query(&self, selector: &str, scope: Option<&NodeRef>) -> Result<NodeRef> {
        // Version is snapshotted before any command; a navigation racing the
        // query makes the returned reference stale, never falsely fresh.
        let doc_version = self.state().doc_version();
        let scope_id = match scope {
            Some(node) => {
                self.ensure_fresh(node)?;
                node.node_id
            }
            None => self.ensure_root().await?,
        };
        let result = self
            .send(
                "DOM.querySelector",
                json!({ "nodeId": scope_id, "selector": selector }),
            )
            .await?;
        let node_id = result["nodeId"].as_i64().unwrap_or(0);
        if node_id == 0 {
            return Err(CdpError::NotFound(format!(
                "no element matches selector {selector:?}"
            )));
        }
        Ok(NodeRef {
            node_id,
            selector: Some(selector.to_string()),
            doc_version,
        })
    }

    /// All matches for `selector` under the same scoping rules.
    pub async fn query_all(&self, selector: &str, scope: Option<&NodeRef>) -> Result<Vec<NodeRef>> {
        let doc_version = self.state().doc_version();
        let scope_id = match scope {
            Some(node) => {
                self.ensure_fresh(node)?;
                node.node_id
            }
            None => self.ensure_root().await?,
        };
        let result = self
            .send(
                "DOM.querySelectorAll",
                json!({ "nodeId": scope_id, "selector": selector }),
            )
            .await?;
        let nodes = result["nodeIds"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_i64)
                    .filter(|id| *id != 0)
                    .map(|node_id| NodeRef {
                        node_id,
                        selector: Some(selector.to_string()),
                        doc_version,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(nodes)
    }

    pub async fn scroll_into_view(&self, node: &NodeRef) -> Result<()> {
        self.ensure_fresh(node)?;
        self.send(
            "DOM.scrollIntoViewIfNeeded",
            json!({ "nodeId": node.node_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn box_model(&self, node: &NodeRef) -> Result<Value> {
        self.ensure_fresh(node)?;
        let result = self
            .send("DOM.getBoxModel", json!({ "nodeId": node.node_id }))
            .await?;
        Ok(result["model"].clone())
    }

    pub async fn focus(&self, node: &NodeRef) -> Result<()> {
        self.ensure_fresh(node)?;
        self.send("DOM.focus", json!({ "nodeId": node.node_id }))
            .await?;
        Ok(())
    }

    pub async fn outer_html(&self, node: &NodeRef) -> Result<String> {
        self.ensure_fresh(node)?;
        let result = self
            .send("DOM.getOuterHTML", json!({ "nodeId": node.node_id }))
            .await?;
        Ok(result["outerHTML"].as_str().unwrap_or_default().to_string())
    }

    /// `DOM.setFileInputFiles` keyed by a backend node id (from a file
    /// chooser interception) or by a regular node reference.
    pub async fn set_file_input(
        &self,
        files: &[String],
        node: Option<&NodeRef>,
        backend_node_id: Option<i64>,
    ) -> Result<()> {
        let mut params = json!({ "files": files });
        match (node, backend_node_id) {
            (_, Some(backend)) => params["backendNodeId"] = json!(backend),
            (Some(node), None) => {
                self.ensure_fresh(node)?;
                params["nodeId"] = json!(node.node_id);
            }
            (None, None) => {
                return Err(CdpError::BadArguments(
                    "file input requires node_id or backend_node_id".into(),
                ))
            }
        }
        self.send("DOM.setFileInputFiles", params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_is_strictly_older_than_current() {
        let node = NodeRef {
            node_id: 12,
            selector: Some("#login".into()),
            doc_version: 3,
        };
        assert!(!node.is_stale(3));
        assert!(node.is_stale(4));
        assert!(!node.is_stale(2));
    }
}
