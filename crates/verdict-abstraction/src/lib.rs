//! Model abstraction layer for Verdict.
//!
//! This crate defines the core trait and types the orchestration layer uses to talk to
//! large language models, independent of any particular provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when interacting with an AI model.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred during the API request (e.g., network issues, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The model returned an error (e.g., invalid input, server failure).
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The model provider is not supported or configured.
    #[error("Unsupported Model Provider: {0}")]
    UnsupportedModelProvider(String),

    /// Provider quota exceeded or rate limit hit.
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "openai", "googleai").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The call was abandoned because its cancellation token fired.
    #[error("Model call cancelled")]
    Cancelled,

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

impl ModelError {
    /// Returns true when the provider rejected the call for quota or rate-limit reasons.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Represents a message in a conversation with a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender ("user", "assistant" or "system").
    pub role: String,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// What sampling temperature to use, between 0 and 2.
    pub temperature: Option<f32>,

    /// Nucleus sampling probability mass.
    pub top_p: Option<f32>,

    /// The maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sequences where the API will stop generating further tokens.
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self { temperature: Some(0.2), top_p: Some(1.0), max_tokens: Some(4096), stop_sequences: None }
    }
}

/// The response from a chat completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated content.
    pub content: String,

    /// Optional: The ID of the model used to generate the response.
    pub model_id: Option<String>,

    /// Optional: Usage statistics for the request.
    pub usage: Option<ModelUsage>,
}

/// Usage statistics for a model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// A trait for interacting with different AI models.
///
/// All models must be `Send + Sync` so a single instance can serve concurrent tasks.
#[async_trait]
pub trait Model: Send + Sync {
    /// Generates a chat completion based on the given conversation history.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError>;

    /// Generates a completion for a single prompt.
    ///
    /// The default implementation wraps the prompt in one user message.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        self.generate_chat_completion(&[ChatMessage::user(prompt)], parameters).await
    }

    /// Returns the ID of the model.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel;

    #[async_trait]
    impl Model for EchoModel {
        async fn generate_chat_completion(
            &self,
            messages: &[ChatMessage],
            _parameters: Option<ModelParameters>,
        ) -> Result<ModelResponse, ModelError> {
            let content = messages.iter().map(|m| format!("{}:{}", m.role, m.content)).collect();
            Ok(ModelResponse { content, model_id: Some("echo".to_string()), usage: None })
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_generate_text_wraps_prompt_as_user_message() {
        let response = EchoModel.generate_text("hello", None).await.unwrap();
        assert_eq!(response.content, "user:hello");
    }

    #[test]
    fn test_quota_error_display() {
        let with_message =
            ModelError::QuotaExceeded { provider: "openai".to_string(), message: Some("slow down".to_string()) };
        assert_eq!(with_message.to_string(), "Provider 'openai' quota exceeded: slow down");
        assert!(with_message.is_quota_exceeded());

        let bare = ModelError::QuotaExceeded { provider: "anthropic".to_string(), message: None };
        assert_eq!(bare.to_string(), "Provider 'anthropic' quota exceeded");
    }

    #[test]
    fn test_error_serializes_round_trip() {
        let err = ModelError::RequestError("connection reset".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: ModelError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
