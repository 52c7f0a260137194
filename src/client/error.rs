use crate::session::StoreError;
use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of error body characters carried in `UnexpectedStatus`.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Connectivity, DNS, or timeout failure. Never retried by the client.
    #[error("unable to reach the server: {0}")]
    Transport(#[from] reqwest::Error),

    /// No session could be established or re-established. Callers should
    /// clear local state and sign in again.
    #[error("not authenticated")]
    Unauthenticated,

    /// The server answered with a status the operation did not expect.
    #[error("request failed ({status}): {message}")]
    UnexpectedStatus { status: StatusCode, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid request path: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Caller input rejected before any request was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    pub(crate) fn unexpected(status: StatusCode, body: &[u8]) -> Self {
        Self::UnexpectedStatus {
            status,
            message: sanitize_body(body),
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Unauthenticated => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_timeout())
    }

    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}

/// Trims and truncates an error body for display.
fn sanitize_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
