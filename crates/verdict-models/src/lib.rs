//! Model implementations and candidate discovery for Verdict.
//!
//! This crate provides concrete implementations of the `Model` trait and the registry
//! that decides which of them an orchestration run may use.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and offline runs
//! - **Gemini**: Google's Gemini models (API key required)
//! - **OpenAI**: OpenAI's GPT models (API key required)
//! - **Claude**: Anthropic's Claude models (API key required)
//! - **Azure OpenAI**: OpenAI deployments hosted on Azure (key + endpoint required)
//! - **Ollama**: Local models via Ollama's OpenAI-compatible endpoint

pub mod claude;
pub mod factory;
pub mod gemini;
pub mod openai;
pub mod registry;

use async_trait::async_trait;
use reqwest::StatusCode;
use verdict_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage};
use tracing::debug;

pub use claude::ClaudeModel;
pub use factory::ModelFactory;
pub use gemini::GeminiModel;
pub use openai::OpenAIModel;
pub use registry::{
    DEFAULT_CANDIDATE, ModelCandidate, Provider, Purpose, RegistryConfig, apply_preferences,
    candidate_names, discover_candidates,
};

/// Scripted behaviour of a [`MockModel`].
#[derive(Debug, Clone, Default)]
enum MockBehavior {
    /// Echo the last user message back inside a JSON object.
    #[default]
    Echo,
    /// Always reply with this content.
    Fixed(String),
    /// Always fail with this error.
    Fail(ModelError),
}

/// A mock implementation of the `Model` trait for testing and offline runs.
///
/// By default it replies with `{"mockModel": <id>, "input": <last user message>}`, parsing
/// the user message as JSON when possible, so structured-output callers get valid JSON.
#[derive(Debug, Clone, Default)]
pub struct MockModel {
    id: String,
    behavior: MockBehavior,
}

impl MockModel {
    /// Creates a new echoing `MockModel` with the given ID.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self { id, behavior: MockBehavior::Echo }
    }

    /// Creates a `MockModel` that always replies with `content`.
    #[must_use]
    pub fn with_response(id: String, content: impl Into<String>) -> Self {
        Self { id, behavior: MockBehavior::Fixed(content.into()) }
    }

    /// Creates a `MockModel` that always fails with `error`.
    #[must_use]
    pub fn failing(id: String, error: ModelError) -> Self {
        Self { id, behavior: MockBehavior::Fail(error) }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );

        let content = match &self.behavior {
            MockBehavior::Fail(error) => return Err(error.clone()),
            MockBehavior::Fixed(content) => content.clone(),
            MockBehavior::Echo => {
                let last_user = messages.iter().rev().find(|m| m.role == "user");
                let input = last_user.map_or(serde_json::Value::Null, |m| {
                    serde_json::from_str(&m.content)
                        .unwrap_or_else(|_| serde_json::Value::String(m.content.clone()))
                });
                serde_json::json!({ "mockModel": self.id, "input": input }).to_string()
            }
        };

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum::<u32>();
        let completion_tokens = count_tokens(&content);

        Ok(ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Maps a non-success HTTP status from a provider into a `ModelError`.
///
/// 402 and 429 are quota / rate-limit rejections; everything else is a response error.
pub(crate) fn error_for_status(provider: &str, status: StatusCode, body: String) -> ModelError {
    if status == StatusCode::PAYMENT_REQUIRED || status == StatusCode::TOO_MANY_REQUESTS {
        return ModelError::QuotaExceeded { provider: provider.to_string(), message: Some(body) };
    }
    ModelError::ModelResponseError(format!("API error ({status}): {body}"))
}
