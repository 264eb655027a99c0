//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status == 408 || *status >= 500,
            LlmError::Network(_) => true,
            LlmError::InvalidResponse(_) | LlmError::Config(_) | LlmError::Json(_) => false,
        }
    }

    /// True when the service itself could not be reached or refused the call,
    /// as opposed to answering with content we could not use
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::ApiError { .. } | LlmError::Network(_) | LlmError::Config(_)
        )
    }
}
