use std::time::Duration;

use thiserror::Error;

/// Failure of a single logical upstream request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("metadata API credential is not configured")]
    MissingCredential,
    #[error("invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("upstream responded with {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("upstream request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        Self::Status {
            status,
            reason: reason.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether another attempt may succeed.
    ///
    /// Configuration problems fail on the first attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::MissingCredential | UpstreamError::InvalidUrl(_) => false,
            UpstreamError::Status { .. }
            | UpstreamError::Network(_)
            | UpstreamError::Timeout(_)
            | UpstreamError::Decode(_) => true,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            UpstreamError::MissingCredential | UpstreamError::InvalidUrl(_)
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
