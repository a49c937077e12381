//! Provider trait definitions for LLM API clients

use async_trait::async_trait;
use serde_json::Value;

use crate::records::TokenUsage;

/// Undecoded provider reply, kept as-is so text and usage can be extracted
/// independently (and either may be absent)
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// A single JSON body
    Single(Value),
    /// Every JSON chunk of a streamed reply, in arrival order
    Stream(Vec<Value>),
}

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Uniform request/response interface over one LLM backend.
///
/// `issue` never panics on transport problems: every failure comes back as a
/// `ProviderError` so callers can count it against a retry budget.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Provider name as configured (e.g. "together", "gemini")
    fn name(&self) -> &str;

    /// Model used when the caller does not pick one
    fn default_model(&self) -> &str;

    /// Whether `issue(.., streaming = true)` actually streams
    fn supports_streaming(&self) -> bool;

    /// Whether replies carry token usage
    fn supports_usage(&self) -> bool;

    /// Send one single-turn prompt
    async fn issue(&self, prompt: &str, model: &str, streaming: bool)
        -> ProviderResult<RawResponse>;

    /// Response text, or `None` when the reply carries no text
    fn extract_text(&self, raw: &RawResponse) -> Option<String>;

    /// Token usage, or [`TokenUsage::UNKNOWN`] when unavailable
    fn extract_usage(&self, raw: &RawResponse) -> TokenUsage;
}

/// Read an integer field, accepting only non-negative values
pub(crate) fn usage_field(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64).filter(|v| *v >= 0)
}
