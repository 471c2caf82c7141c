//! Model factory for creating model instances from candidate names.
//!
//! Candidate names have the form `<provider>/<model>`. The factory resolves the provider
//! prefix and pulls the matching credentials out of a [`RegistryConfig`].

use crate::registry::{ModelCandidate, Provider, RegistryConfig};
use crate::{ClaudeModel, GeminiModel, MockModel, OpenAIModel};
use std::sync::Arc;
use tracing::{debug, error};
use verdict_abstraction::{Model, ModelError};

const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Short Anthropic candidate names and the API model ids they resolve to.
const ANTHROPIC_ALIASES: &[(&str, &str)] = &[
    ("claude-3-5-sonnet", "claude-3-5-sonnet-latest"),
    ("claude-3-5-haiku", "claude-3-5-haiku-latest"),
    ("claude-3-7-sonnet", "claude-3-7-sonnet-latest"),
    ("claude-3-opus", "claude-3-opus-latest"),
];

/// Factory for creating model instances.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates a model instance for a fully qualified candidate name.
    ///
    /// The `mock/` prefix yields an echoing [`MockModel`] and needs no credentials.
    ///
    /// # Arguments
    /// * `name` - Candidate name, e.g. "openai/gpt-4o"
    /// * `config` - Provider credentials
    ///
    /// # Errors
    /// Returns `ModelError::UnsupportedModelProvider` when the name has no provider prefix,
    /// the provider is unknown, or its credentials are missing.
    pub fn create(name: &str, config: &RegistryConfig) -> Result<Arc<dyn Model>, ModelError> {
        let Some((prefix, model_id)) = name.split_once('/') else {
            return Err(ModelError::UnsupportedModelProvider(format!(
                "Model name '{name}' has no provider prefix"
            )));
        };
        if model_id.is_empty() {
            return Err(ModelError::UnsupportedModelProvider(format!("Model name '{name}' has no model id")));
        }

        debug!(provider = prefix, model_id = model_id, "Creating model instance");

        if prefix.eq_ignore_ascii_case("mock") {
            return Ok(Arc::new(MockModel::new(model_id.to_string())));
        }

        let provider: Provider = prefix.parse().map_err(|()| {
            error!(provider = prefix, "Unknown model provider");
            ModelError::UnsupportedModelProvider(format!("Unknown provider '{prefix}'"))
        })?;

        Self::build(provider, model_id, config)
    }

    /// Creates a model instance for a discovered candidate.
    ///
    /// # Errors
    /// Same as [`ModelFactory::create`].
    pub fn create_for(candidate: &ModelCandidate, config: &RegistryConfig) -> Result<Arc<dyn Model>, ModelError> {
        Self::create(&candidate.name, config)
    }

    /// Resolves the model id sent to the provider API for a candidate's model part.
    ///
    /// Anthropic only accepts dated ids or `-latest` aliases, so short names such as
    /// `claude-3-5-sonnet` are mapped. Other ids pass through unchanged.
    pub fn provider_model_id(provider: Provider, model_id: &str) -> &str {
        match provider {
            Provider::Anthropic => ANTHROPIC_ALIASES
                .iter()
                .find(|(alias, _)| *alias == model_id)
                .map_or(model_id, |&(_, resolved)| resolved),
            _ => model_id,
        }
    }

    fn build(provider: Provider, model_id: &str, config: &RegistryConfig) -> Result<Arc<dyn Model>, ModelError> {
        let model_id = Self::provider_model_id(provider, model_id).to_string();
        match provider {
            Provider::GoogleAi => {
                let api_key = require(config.google_api_key.as_ref(), provider, "GOOGLE_GENAI_API_KEY")?;
                Ok(Arc::new(GeminiModel::with_api_key(model_id, api_key)))
            }
            Provider::OpenAi => {
                let api_key = require(config.openai_api_key.as_ref(), provider, "OPENAI_API_KEY")?;
                Ok(Arc::new(OpenAIModel::with_api_key(model_id, api_key)))
            }
            Provider::Anthropic => {
                let api_key = require(config.anthropic_api_key.as_ref(), provider, "ANTHROPIC_API_KEY")?;
                Ok(Arc::new(ClaudeModel::with_api_key(model_id, api_key)))
            }
            Provider::AzureOpenAi => {
                let api_key = require(config.azure_openai_api_key.as_ref(), provider, "AZURE_OPENAI_API_KEY")?;
                let endpoint = require(config.azure_openai_endpoint.as_ref(), provider, "AZURE_OPENAI_ENDPOINT")?;
                Ok(Arc::new(OpenAIModel::azure(
                    model_id,
                    &endpoint,
                    api_key,
                    config.azure_openai_api_version.clone(),
                )))
            }
            Provider::Ollama => {
                let host = require(config.ollama_host.as_ref(), provider, "OLLAMA_HOST")?;
                let base_url = ollama_base_url(&host);
                Ok(Arc::new(OpenAIModel::compatible(model_id, &base_url, "ollama")))
            }
            Provider::Other => Err(ModelError::UnsupportedModelProvider(format!(
                "No model backend for provider '{provider}'"
            ))),
        }
    }
}

fn require(value: Option<&String>, provider: Provider, var: &str) -> Result<String, ModelError> {
    value.cloned().ok_or_else(|| {
        error!(provider = %provider, var = var, "Missing provider credential");
        ModelError::UnsupportedModelProvider(format!("{provider} is not configured: {var} is not set"))
    })
}

/// Builds the OpenAI-compatible API root for an Ollama host.
///
/// Accepts `host`, `host:port` or a full URL; adds `http://` when no scheme is given and the
/// default port when none is given at all.
pub fn ollama_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let with_scheme = if host.contains("://") { host.to_string() } else { format!("http://{host}") };
    let authority = with_scheme.split_once("://").map_or("", |(_, rest)| rest);
    if authority.contains(':') {
        format!("{with_scheme}/v1")
    } else {
        format!("{with_scheme}:{DEFAULT_OLLAMA_PORT}/v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> RegistryConfig {
        RegistryConfig::from_vars([
            ("GOOGLE_API_KEY", "g"),
            ("OPENAI_API_KEY", "o"),
            ("ANTHROPIC_API_KEY", "a"),
            ("AZURE_OPENAI_API_KEY", "z"),
            ("AZURE_OPENAI_ENDPOINT", "https://acme.openai.azure.com"),
            ("OLLAMA_HOST", "localhost:11434"),
        ])
    }

    #[test]
    fn test_create_each_configured_provider() {
        let config = full_config();
        for name in [
            "googleai/gemini-1.5-pro",
            "openai/gpt-4o",
            "anthropic/claude-3-5-haiku-20241022",
            "azureopenai/gpt-4o",
            "ollama/llama3.1:8b",
        ] {
            let model = ModelFactory::create(name, &config).unwrap();
            assert_eq!(model.model_id(), name.split_once('/').unwrap().1);
        }
    }

    #[test]
    fn test_anthropic_short_names_resolve_to_api_ids() {
        let config = full_config();
        let sonnet = ModelFactory::create("anthropic/claude-3-5-sonnet", &config).unwrap();
        assert_eq!(sonnet.model_id(), "claude-3-5-sonnet-latest");
        let haiku = ModelFactory::create("anthropic/claude-3-5-haiku", &config).unwrap();
        assert_eq!(haiku.model_id(), "claude-3-5-haiku-latest");

        assert_eq!(ModelFactory::provider_model_id(Provider::Anthropic, "claude-opus-4-1"), "claude-opus-4-1");
        assert_eq!(ModelFactory::provider_model_id(Provider::OpenAi, "claude-3-5-sonnet"), "claude-3-5-sonnet");
    }

    #[test]
    fn test_discovered_anthropic_candidates_resolve() {
        let config = full_config();
        for candidate in crate::discover_candidates(&config).iter().filter(|c| c.provider == Provider::Anthropic) {
            let model = ModelFactory::create_for(candidate, &config).unwrap();
            assert!(model.model_id().ends_with("-latest"), "{} -> {}", candidate.name, model.model_id());
        }
    }

    #[test]
    fn test_mock_needs_no_credentials() {
        let model = ModelFactory::create("mock/echo", &RegistryConfig::default()).unwrap();
        assert_eq!(model.model_id(), "echo");
    }

    #[test]
    fn test_missing_credential_is_unsupported_provider() {
        let Err(err) = ModelFactory::create("openai/gpt-4o", &RegistryConfig::default()) else {
            panic!("expected missing credential error");
        };
        assert!(matches!(err, ModelError::UnsupportedModelProvider(ref m) if m.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_malformed_and_unknown_names() {
        let config = full_config();
        assert!(ModelFactory::create("gpt-4o", &config).is_err());
        assert!(ModelFactory::create("openai/", &config).is_err());
        assert!(ModelFactory::create("bedrock/titan", &config).is_err());
        assert!(ModelFactory::create("other/custom", &config).is_err());
    }

    #[test]
    fn test_ollama_base_url_normalisation() {
        assert_eq!(ollama_base_url("localhost:11434"), "http://localhost:11434/v1");
        assert_eq!(ollama_base_url("ollama.internal"), "http://ollama.internal:11434/v1");
        assert_eq!(ollama_base_url("https://gpu-box:8443/"), "https://gpu-box:8443/v1");
    }
}
