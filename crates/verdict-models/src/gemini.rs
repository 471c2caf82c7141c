//! Gemini model implementation.
//!
//! Talks to the Generative Language API `generateContent` endpoint. Gemini uses the role
//! name "model" for assistant turns and a dedicated `systemInstruction` field for system
//! prompts.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use verdict_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage};

use crate::error_for_status;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini model implementation.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    /// The model ID (e.g., "gemini-1.5-pro").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the Gemini API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl GeminiModel {
    /// Creates a new `GeminiModel` with the given API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: GEMINI_BASE_URL.to_string(), client: Client::new() }
    }

    /// Overrides the base URL (useful for proxies and tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn role_to_gemini(role: &str) -> &'static str {
        if role == "assistant" { "model" } else { "user" }
    }

    fn extract_system_messages(messages: &[ChatMessage]) -> Option<String> {
        let parts: Vec<&str> =
            messages.iter().filter(|m| m.role == "system").map(|m| m.content.as_str()).collect();
        if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
    }

    fn build_request(messages: &[ChatMessage], params: ModelParameters) -> GeminiRequest {
        GeminiRequest {
            contents: messages
                .iter()
                .filter(|m| m.role != "system")
                .map(|m| GeminiContent {
                    role: Some(Self::role_to_gemini(&m.role).to_string()),
                    parts: vec![GeminiPart { text: m.content.clone() }],
                })
                .collect(),
            system_instruction: Self::extract_system_messages(messages)
                .map(|text| GeminiContent { role: None, parts: vec![GeminiPart { text }] }),
            generation_config: Some(GeminiGenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                max_output_tokens: params.max_tokens,
                stop_sequences: params.stop_sequences,
            }),
        }
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            parameters = ?parameters,
            "GeminiModel generating chat completion"
        );

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);
        let request_body = Self::build_request(messages, parameters.unwrap_or_default());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Gemini API");
                ModelError::RequestError(format!("Network error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini API returned error status");
            return Err(error_for_status("googleai", status, error_text));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini API response");
            ModelError::SerializationError(format!("Failed to parse response: {e}"))
        })?;

        let content: String = gemini_response
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ModelError::ModelResponseError("No content in API response".to_string()));
        }

        let usage = gemini_response.usage_metadata.map(|u| ModelUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ModelResponse { content, model_id: Some(self.model_id.clone()), usage })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_field_names)] // Matches API naming
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_conversion() {
        assert_eq!(GeminiModel::role_to_gemini("user"), "user");
        assert_eq!(GeminiModel::role_to_gemini("assistant"), "model");
    }

    #[test]
    fn test_request_moves_system_messages_to_instruction() {
        let messages = vec![ChatMessage::system("Reply in JSON."), ChatMessage::user("Analyze Acme")];
        let request = GeminiModel::build_request(&messages, ModelParameters::default());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Reply in JSON.");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
    }
}
