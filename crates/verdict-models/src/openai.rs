//! OpenAI model implementation.
//!
//! This module provides an implementation of the `Model` trait for the OpenAI Chat
//! Completions API. The same wire format is spoken by Azure OpenAI deployments and by
//! Ollama's OpenAI-compatible endpoint, so one client covers all three; only the URL
//! layout and the authentication header differ.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use verdict_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage};

use crate::error_for_status;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Azure OpenAI REST API version.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";

/// How requests are authenticated and routed.
#[derive(Debug, Clone)]
enum Endpoint {
    /// `{base_url}/chat/completions` with a bearer token.
    OpenAi { api_key: String },
    /// `{endpoint}/openai/deployments/{deployment}/chat/completions` with an `api-key` header.
    Azure { api_key: String, api_version: String },
    /// `{base_url}/chat/completions` without authentication.
    Unauthenticated,
}

/// OpenAI-compatible chat model.
#[derive(Debug, Clone)]
pub struct OpenAIModel {
    /// The model ID (or Azure deployment name).
    model_id: String,
    /// The base URL of the API.
    base_url: String,
    /// Provider label used in quota errors.
    provider: &'static str,
    /// Routing and authentication.
    endpoint: Endpoint,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAIModel {
    /// Creates a model talking to api.openai.com with the given API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            base_url: OPENAI_BASE_URL.to_string(),
            provider: "openai",
            endpoint: Endpoint::OpenAi { api_key },
            client: Client::new(),
        }
    }

    /// Creates a model for an Azure OpenAI deployment.
    ///
    /// # Arguments
    /// * `deployment` - The deployment name (used in place of the model ID)
    /// * `endpoint` - The resource endpoint, e.g. `https://my-resource.openai.azure.com`
    /// * `api_key` - The resource key
    /// * `api_version` - REST API version, defaults to [`DEFAULT_AZURE_API_VERSION`]
    #[must_use]
    pub fn azure(deployment: String, endpoint: &str, api_key: String, api_version: Option<String>) -> Self {
        Self {
            model_id: deployment,
            base_url: endpoint.trim_end_matches('/').to_string(),
            provider: "azureopenai",
            endpoint: Endpoint::Azure {
                api_key,
                api_version: api_version.unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            },
            client: Client::new(),
        }
    }

    /// Creates a model for an unauthenticated OpenAI-compatible server (e.g. Ollama).
    ///
    /// # Arguments
    /// * `model_id` - The model name known to the server
    /// * `base_url` - The API root, e.g. `http://localhost:11434/v1`
    #[must_use]
    pub fn compatible(model_id: String, base_url: &str, provider: &'static str) -> Self {
        Self {
            model_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider,
            endpoint: Endpoint::Unauthenticated,
            client: Client::new(),
        }
    }

    /// Overrides the base URL (useful for proxies and tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Returns the chat completions URL for this endpoint.
    fn completions_url(&self) -> String {
        match &self.endpoint {
            Endpoint::Azure { api_version, .. } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.base_url, self.model_id, api_version
            ),
            Endpoint::OpenAi { .. } | Endpoint::Unauthenticated => {
                format!("{}/chat/completions", self.base_url)
            }
        }
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            provider = self.provider,
            message_count = messages.len(),
            parameters = ?parameters,
            "OpenAIModel generating chat completion"
        );

        let params = parameters.unwrap_or_default();
        let request_body = OpenAIRequest {
            model: self.model_id.clone(),
            messages: messages
                .iter()
                .map(|msg| OpenAIMessage { role: msg.role.clone(), content: Some(msg.content.clone()) })
                .collect(),
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stop: params.stop_sequences,
        };

        let mut request = self.client.post(self.completions_url()).json(&request_body);
        request = match &self.endpoint {
            Endpoint::OpenAi { api_key } => request.bearer_auth(api_key),
            Endpoint::Azure { api_key, .. } => request.header("api-key", api_key),
            Endpoint::Unauthenticated => request,
        };

        let response = request.send().await.map_err(|e| {
            error!(error = %e, provider = self.provider, "Failed to send chat completion request");
            ModelError::RequestError(format!("Network error: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, provider = self.provider, "API returned error status");
            return Err(error_for_status(self.provider, status, error_text));
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse chat completion response");
            ModelError::SerializationError(format!("Failed to parse response: {e}"))
        })?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelError::ModelResponseError("No content in API response".to_string()))?;

        let usage = openai_response.usage.map(|u| ModelUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ModelResponse { content, model_id: Some(self.model_id.clone()), usage })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
