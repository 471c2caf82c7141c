//! Model candidate discovery.
//!
//! The registry turns provider credentials into an ordered list of model candidates.
//! List order is the fallback trial order used by the orchestrator, so everything in
//! here is about producing a stable, deterministic ordering.
//!
//! Credentials are read once into a [`RegistryConfig`] at the process boundary; the
//! discovery function itself never touches the environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Candidate used when no provider credentials are configured.
pub const DEFAULT_CANDIDATE: &str = "googleai/gemini-1.5-flash";

/// Comma-separated list of name substrings that should be tried first.
pub const MODEL_PREFERENCE_VAR: &str = "MODEL_PREFERENCE";

const GOOGLE_GENAI_API_KEY_VAR: &str = "GOOGLE_GENAI_API_KEY";
const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";
const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
const AZURE_OPENAI_API_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";
const AZURE_OPENAI_ENDPOINT_VAR: &str = "AZURE_OPENAI_ENDPOINT";
const AZURE_OPENAI_API_VERSION_VAR: &str = "AZURE_OPENAI_API_VERSION";
const OLLAMA_HOST_VAR: &str = "OLLAMA_HOST";

/// Model provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini via the Generative Language API.
    GoogleAi,
    /// OpenAI.
    OpenAi,
    /// Anthropic Claude.
    Anthropic,
    /// Azure-hosted OpenAI deployments.
    AzureOpenAi,
    /// Local models served by Ollama.
    Ollama,
    /// Anything else (mock models, custom backends).
    Other,
}

impl Provider {
    /// Returns the name prefix used in candidate names (`<prefix>/<model>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GoogleAi => "googleai",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::AzureOpenAi => "azureopenai",
            Provider::Ollama => "ollama",
            Provider::Other => "other",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "googleai" | "google" | "gemini" => Ok(Self::GoogleAi),
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "azureopenai" | "azure" => Ok(Self::AzureOpenAi),
            "ollama" => Ok(Self::Ollama),
            "other" | "mock" => Ok(Self::Other),
            _ => Err(()),
        }
    }
}

/// Hint describing what a model is best used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// Balanced, general-purpose model.
    General,
    /// Low-latency, low-cost model.
    Fast,
    /// Model tuned for open-ended generation.
    Creative,
    /// Model tuned for multi-step reasoning.
    Reasoning,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::General => write!(f, "general"),
            Purpose::Fast => write!(f, "fast"),
            Purpose::Creative => write!(f, "creative"),
            Purpose::Reasoning => write!(f, "reasoning"),
        }
    }
}

/// One named model eligible to service an analysis task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCandidate {
    /// Fully qualified name, `<provider>/<model>` (e.g. "openai/gpt-4o").
    pub name: String,
    /// Provider family.
    pub provider: Provider,
    /// Optional purpose hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<Purpose>,
}

impl ModelCandidate {
    /// Creates a new candidate.
    pub fn new(name: impl Into<String>, provider: Provider, purpose: Option<Purpose>) -> Self {
        Self { name: name.into(), provider, purpose }
    }

    /// Creates a mock candidate (`mock/<id>`), served by [`crate::MockModel`].
    pub fn mock(id: &str) -> Self {
        Self::new(format!("mock/{id}"), Provider::Other, None)
    }

    /// Returns the provider-local model identifier (the part after the first `/`).
    pub fn model_id(&self) -> &str {
        self.name.split_once('/').map_or(self.name.as_str(), |(_, id)| id)
    }
}

/// Provider credentials and ordering preferences consumed by the registry.
///
/// Every credential is stored trimmed; blank values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Google Generative Language API key.
    pub google_api_key: Option<String>,
    /// OpenAI API key.
    pub openai_api_key: Option<String>,
    /// Anthropic API key.
    pub anthropic_api_key: Option<String>,
    /// Azure OpenAI API key.
    pub azure_openai_api_key: Option<String>,
    /// Azure OpenAI resource endpoint.
    pub azure_openai_endpoint: Option<String>,
    /// Azure OpenAI API version override.
    pub azure_openai_api_version: Option<String>,
    /// Ollama server address.
    pub ollama_host: Option<String>,
    /// Name substrings that should sort first, in priority order.
    pub preferences: Vec<String>,
}

impl RegistryConfig {
    /// Reads the registry configuration from the process environment.
    ///
    /// Variables whose name or value is not valid Unicode are ignored.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Builds the configuration from arbitrary key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: HashMap<String, String> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let mut take = |key: &str| vars.remove(key).and_then(non_blank);

        let google_genai = take(GOOGLE_GENAI_API_KEY_VAR);
        let google = take(GOOGLE_API_KEY_VAR);

        Self {
            google_api_key: google_genai.or(google),
            openai_api_key: take(OPENAI_API_KEY_VAR),
            anthropic_api_key: take(ANTHROPIC_API_KEY_VAR),
            azure_openai_api_key: take(AZURE_OPENAI_API_KEY_VAR),
            azure_openai_endpoint: take(AZURE_OPENAI_ENDPOINT_VAR),
            azure_openai_api_version: take(AZURE_OPENAI_API_VERSION_VAR),
            ollama_host: take(OLLAMA_HOST_VAR),
            preferences: take(MODEL_PREFERENCE_VAR)
                .map(|csv| parse_preferences(&csv))
                .unwrap_or_default(),
        }
    }

    /// Replaces the ordering preferences.
    #[must_use]
    pub fn with_preferences<I, S>(mut self, preferences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferences = preferences
            .into_iter()
            .map(Into::<String>::into)
            .filter(|p| !p.trim().is_empty())
            .collect();
        self
    }

    /// Returns true when both Azure credentials are present.
    pub fn has_azure(&self) -> bool {
        self.azure_openai_api_key.is_some() && self.azure_openai_endpoint.is_some()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Splits a comma-separated preference list, trimming entries and dropping blanks.
pub fn parse_preferences(csv: &str) -> Vec<String> {
    csv.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

/// Discovers the ordered model candidate list for the given configuration.
///
/// Never returns an empty list: with no credentials at all the result is the single
/// [`DEFAULT_CANDIDATE`].
pub fn discover_candidates(config: &RegistryConfig) -> Vec<ModelCandidate> {
    use Provider::{Anthropic, AzureOpenAi, GoogleAi, Ollama, OpenAi};
    use Purpose::{Creative, Fast, General};

    let mut candidates = Vec::new();

    if config.google_api_key.is_some() {
        candidates.push(ModelCandidate::new("googleai/gemini-1.5-pro", GoogleAi, Some(General)));
        candidates.push(ModelCandidate::new("googleai/gemini-1.5-flash", GoogleAi, Some(Fast)));
    }

    if config.openai_api_key.is_some() {
        candidates.push(ModelCandidate::new("openai/gpt-4.1", OpenAi, Some(General)));
        candidates.push(ModelCandidate::new("openai/gpt-4o", OpenAi, Some(Creative)));
        candidates.push(ModelCandidate::new("openai/gpt-4o-mini", OpenAi, Some(Fast)));
    }

    if config.anthropic_api_key.is_some() {
        candidates.push(ModelCandidate::new("anthropic/claude-3-5-sonnet", Anthropic, Some(General)));
        candidates.push(ModelCandidate::new("anthropic/claude-3-5-haiku", Anthropic, Some(Fast)));
    }

    if config.has_azure() {
        candidates.push(ModelCandidate::new("azureopenai/gpt-4o", AzureOpenAi, Some(General)));
    }

    if config.ollama_host.is_some() {
        candidates.push(ModelCandidate::new("ollama/llama3.1:70b", Ollama, Some(General)));
        candidates.push(ModelCandidate::new("ollama/llama3.1:8b", Ollama, Some(Fast)));
    }

    apply_preferences(&mut candidates, &config.preferences);

    if candidates.is_empty() {
        debug!(default = DEFAULT_CANDIDATE, "No provider credentials found, using default candidate");
        candidates.push(ModelCandidate::new(DEFAULT_CANDIDATE, GoogleAi, Some(Fast)));
    }

    candidates
}

/// Stable-sorts candidates by the first preference substring their name contains.
///
/// Candidates matching no preference keep their relative order after all matches.
pub fn apply_preferences(candidates: &mut [ModelCandidate], preferences: &[String]) {
    if preferences.is_empty() {
        return;
    }
    candidates.sort_by_key(|candidate| {
        preferences
            .iter()
            .position(|p| candidate.name.contains(p.as_str()))
            .unwrap_or(usize::MAX)
    });
}

/// Returns the names of the given candidates, in order.
pub fn candidate_names(candidates: &[ModelCandidate]) -> Vec<String> {
    candidates.iter().map(|c| c.name.clone()).collect()
}
