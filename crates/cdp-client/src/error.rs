//! Error taxonomy surfaced by the session layer.

use thiserror::Error;

/// Errors produced by target discovery, the session, and the primitives
/// built on top of them.
#[derive(Clone, Debug, Error)]
pub enum CdpError {
    /// The browser's discovery endpoint or debugger socket was unreachable.
    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    /// The session socket is not open; the command was never written.
    #[error("not connected to a debugging target")]
    NotConnected,

    /// The socket closed while the operation was outstanding.
    #[error("disconnected from debugging target")]
    Disconnected,

    /// A command or wait exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The browser answered with a protocol-level error, passed on verbatim.
    #[error("cdp error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// A node reference predates the current document version.
    #[error("stale node {node_id}: document changed since it was resolved")]
    StaleNode { node_id: i64 },

    /// Numeric target reference past the end of the page-target list.
    #[error("tab index {index} out of range ({available} page targets)")]
    IndexOutOfRange { index: usize, available: usize },

    /// No target (or DOM node) matched the given reference.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied regex failed to compile.
    #[error("invalid pattern: {0}")]
    BadPattern(String),

    /// Required argument missing or of the wrong shape.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Anything that should not happen; details belong in the log.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CdpError {
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable wire code reported inside tool-call error payloads.
    pub fn code_name(&self) -> &'static str {
        match self {
            Self::BrowserUnavailable(_) => "BrowserUnavailable",
            Self::NotConnected => "NotConnected",
            Self::Disconnected => "Disconnected",
            Self::Timeout { .. } => "Timeout",
            Self::Protocol { .. } => "CdpError",
            Self::StaleNode { .. } => "StaleNode",
            Self::IndexOutOfRange { .. } => "IndexOutOfRange",
            Self::NotFound(_) => "NotFound",
            Self::BadPattern(_) => "BadPattern",
            Self::BadArguments(_) => "BadArguments",
            Self::Internal(_) => "Internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, CdpError>;
