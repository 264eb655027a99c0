//! LLM Client module for Tasky
//!
//! Provides completion requests against Gemini or OpenAI, selected by config.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};

pub mod client;
mod error;
mod gemini;
mod openai;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage, ToolDefinition, to_gemini_schema,
};

use crate::config::LlmConfig;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Longest wait between two attempts
const MAX_BACKOFF_MS: u64 = 60_000;

/// Exponential delay before retry number `attempt` (1-based)
fn backoff(attempt: u32) -> Duration {
    let ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

/// Create an LLM client based on the provider specified in config
///
/// Supports "gemini" and "openai" providers.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "gemini" => {
            debug!("create_client: creating Gemini client");
            Ok(Arc::new(GeminiClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: gemini, openai",
                other
            )))
        }
    }
}

/// Send a request, retrying transient failures up to `max_retries` times
///
/// `build` is called once per attempt. Non-success responses become
/// `LlmError::ApiError` (or `RateLimited` for 429); `LlmError::is_retryable`
/// decides whether another attempt is made.
pub(crate) async fn send_with_retry<F>(max_retries: u32, build: F) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let error = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => error_from_response(response).await,
            Err(e) => LlmError::Network(e),
        };

        if attempt >= max_retries || !error.is_retryable() {
            debug!(attempt, error = %error, "send_with_retry: giving up");
            return Err(error);
        }

        attempt += 1;
        let delay = match &error {
            LlmError::RateLimited { retry_after } => *retry_after,
            _ => backoff(attempt),
        };
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "send_with_retry: retrying after transient error"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Turn a non-success response into the matching error
async fn error_from_response(response: Response) -> LlmError {
    let status = response.status().as_u16();
    if status == 429 {
        debug!("error_from_response: rate limited (429)");
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        };
    }
    debug!(%status, "error_from_response: API error");
    let message = response.text().await.unwrap_or_default();
    LlmError::ApiError { status, message }
}
