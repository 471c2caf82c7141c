//! Bridge between analysis tasks and models.
//!
//! An [`AnalysisFlow`] turns (task, model name, input) into a structured JSON result. The
//! orchestrator only ever sees this trait; [`ModelFlow`] is the default implementation on
//! top of the provider clients.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use verdict_abstraction::{ChatMessage, ModelError, ModelParameters};
use verdict_models::{ModelFactory, RegistryConfig};

use crate::task::TaskKind;

/// Runs one analysis task against one named model.
#[async_trait]
pub trait AnalysisFlow: Send + Sync {
    /// Produces the task's structured output using `model`.
    ///
    /// # Arguments
    /// * `task` - Which analysis module to run
    /// * `model` - Candidate name, e.g. "openai/gpt-4o"
    /// * `input` - The task's input payload, if the request had one
    /// * `cancel` - Fires when the attempt times out or the run is cancelled
    ///
    /// # Errors
    /// Returns a `ModelError` when the model cannot be reached or its reply is unusable.
    async fn run(
        &self,
        task: TaskKind,
        model: &str,
        input: Option<&Value>,
        cancel: CancellationToken,
    ) -> Result<Value, ModelError>;
}

/// Flow that asks a chat model for a JSON object.
#[derive(Debug, Clone)]
pub struct ModelFlow {
    registry: RegistryConfig,
    parameters: ModelParameters,
}

impl ModelFlow {
    /// Creates a flow resolving models with the given credentials.
    pub fn new(registry: RegistryConfig) -> Self {
        Self { registry, parameters: ModelParameters::default() }
    }

    /// Overrides the generation parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    fn messages(task: TaskKind, input: Option<&Value>) -> Result<Vec<ChatMessage>, ModelError> {
        let system = format!(
            "You are the {} module of a startup evaluation system. \
             Respond with a single JSON object and nothing else.",
            task.title()
        );
        let payload = serde_json::to_string_pretty(input.unwrap_or(&Value::Null))
            .map_err(|e| ModelError::SerializationError(format!("Failed to encode input: {e}")))?;
        Ok(vec![ChatMessage::system(system), ChatMessage::user(payload)])
    }
}

#[async_trait]
impl AnalysisFlow for ModelFlow {
    async fn run(
        &self,
        task: TaskKind,
        model: &str,
        input: Option<&Value>,
        cancel: CancellationToken,
    ) -> Result<Value, ModelError> {
        let client = ModelFactory::create(model, &self.registry)?;
        let messages = Self::messages(task, input)?;
        debug!(task = %task, model = model, "Running analysis flow");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ModelError::Cancelled),
            response = client.generate_chat_completion(&messages, Some(self.parameters.clone())) => response?,
        };

        parse_json_reply(&response.content)
    }
}

/// Parses a model reply as JSON, tolerating a surrounding Markdown code fence.
///
/// # Errors
/// Returns `ModelError::SerializationError` when the reply is not valid JSON.
pub fn parse_json_reply(content: &str) -> Result<Value, ModelError> {
    serde_json::from_str(strip_code_fence(content))
        .map_err(|e| ModelError::SerializationError(format!("Model reply is not valid JSON: {e}")))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
