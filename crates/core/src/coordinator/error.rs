//! Coordinator errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    /// The tracker asked us to slow down.
    #[error("Rate limited by coordinator")]
    RateLimited,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Coordinator does not support {0}")]
    Unsupported(&'static str),
}

impl CoordinatorError {
    /// Whether waiting and asking again is reasonable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::Timeout | Self::RateLimited
        )
    }
}

impl From<reqwest::Error> for CoordinatorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::ConnectionFailed(e.to_string())
        } else {
            Self::ApiError(e.to_string())
        }
    }
}
