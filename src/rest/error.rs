use thiserror::Error;

/// Classified outcome of a single REST attempt.
///
/// The client never retries: `send_message` is not idempotent at the
/// transport level, so retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },
    #[error("network failure: {0}")]
    NetworkFailure(String),
}

impl ApiError {
    /// Whether re-invoking the same operation may plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkFailure(_) | ApiError::ServerError { .. }
        )
    }
}
