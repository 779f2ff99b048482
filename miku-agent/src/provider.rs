//! Provider trait for completion backends.
//!
//! Defines the interface the orchestrator uses to turn a conversation
//! into the next assistant turn.

use crate::session::Turn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Full conversation, system turn first
    pub messages: Vec<Turn>,
    /// Maximum tokens to generate
    pub max_tokens: i64,
    /// Sampling temperature
    pub temperature: f64,
}

/// Chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text of the first choice
    pub content: String,
    /// Token usage, when reported
    pub usage: TokenUsage,
    /// Finish reason of the first choice
    pub finish_reason: Option<String>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

/// Error from a provider.
///
/// Transport failures, non-success statuses and malformed bodies all
/// collapse into this one kind.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{provider}:{model}] {message}")]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status_code: Option<u16>,
}

/// Completion backend.
///
/// Implementations handle authentication, request formatting,
/// and response parsing for a specific API.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name (e.g., "deepseek").
    fn name(&self) -> &str;

    /// Generate the next assistant turn for `request.messages`.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl CompletionProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            let last = request
                .messages
                .last()
                .map(|t| t.content.clone())
                .unwrap_or_default();
            Ok(CompletionResponse {
                content: format!("Echo: {last}"),
                usage: TokenUsage::default(),
                finish_reason: Some("stop".into()),
                latency_ms: 0,
            })
        }
    }

    #[tokio::test]
    async fn echo_provider_works() {
        let provider = EchoProvider;
        assert_eq!(provider.name(), "echo");

        let response = provider
            .complete(CompletionRequest {
                model: "test".into(),
                messages: vec![Turn::system("persona"), Turn::user("Hello")],
                max_tokens: 1000,
                temperature: 0.8,
            })
            .await
            .unwrap();
        assert_eq!(response.content, "Echo: Hello");
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError {
            provider: "deepseek".into(),
            model: "deepseek-chat".into(),
            message: "API error (401): unauthorized".into(),
            status_code: Some(401),
        };
        assert_eq!(
            err.to_string(),
            "[deepseek:deepseek-chat] API error (401): unauthorized"
        );
    }
}
