//! Error types for payload validation and the backend boundary.
//!
//! Payload errors describe data the engine refuses to ingest. Backend errors
//! describe why a call to the backing service did not produce a result. Both
//! are `Clone` so they can travel inside engine events and actions.

use thiserror::Error;

/// A wire payload that cannot become a domain value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Message payload without a (non-empty) id.
    #[error("message payload has no id")]
    MissingId,

    /// None of the channel/group/dm fields is populated.
    #[error("message payload names no conversation")]
    NoConversation,

    /// More than one of the channel/group/dm fields is populated.
    #[error("message payload names {count} conversations, expected exactly one")]
    AmbiguousConversation {
        /// Number of populated conversation fields
        count: usize,
    },

    /// Bytes that are not a valid payload at all.
    #[error("undecodable payload: {0}")]
    Decode(String),

    /// Notification deep link that does not follow `type=..&id=..`.
    #[error("invalid deep link: {0}")]
    InvalidDeepLink(String),
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Failure of a call to the backing service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Network or transport failure (connection reset, DNS, closed socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered and refused the request.
    #[error("rejected with status {status}: {reason}")]
    Rejected {
        /// Status code reported by the service
        status: u16,
        /// Human-readable reason
        reason: String,
    },

    /// The transport gave up waiting.
    #[error("request timed out")]
    Timeout,

    /// The service answered with something that is not a valid payload.
    #[error("invalid response payload: {0}")]
    Payload(#[from] PayloadError),
}

impl BackendError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Rejections with a 5xx status count as transient; any other rejection
    /// and any malformed payload will fail the same way next time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::Payload(_) => false,
        }
    }
}
