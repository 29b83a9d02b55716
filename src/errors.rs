//! Host-side error shape and its mapping to envelope error payloads.

use cdp_client::CdpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Cdp(#[from] CdpError),

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("unknown tool {0:?}")]
    UnknownTool(String),

    /// Unexpected failure inside a handler; the client gets a generic
    /// message, the log gets the details.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn bad_arguments(message: impl Into<String>) -> Self {
        Self::BadArguments(message.into())
    }

    /// Wire code placed in the envelope's `error.code` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cdp(err) => err.code_name(),
            Self::BadArguments(_) => "BadArguments",
            Self::UnknownTool(_) => "NotFound",
            Self::Internal(_) => "Internal",
        }
    }

    /// Message safe to hand to clients.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdp_errors_keep_their_wire_code() {
        let err = BridgeError::from(CdpError::NotConnected);
        assert_eq!(err.code(), "NotConnected");

        let err = BridgeError::from(CdpError::Protocol {
            code: -32000,
            message: "boom".into(),
        });
        assert_eq!(err.code(), "CdpError");
        assert!(err.public_message().contains("boom"));
    }

    #[test]
    fn internal_details_stay_out_of_the_public_message() {
        let err = BridgeError::Internal("secret stack trace".into());
        assert_eq!(err.public_message(), "internal error");
        assert_eq!(err.code(), "Internal");
    }
}
