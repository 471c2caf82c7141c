// Error types for orchestration

use thiserror::Error;

use crate::fallback::CandidateFailure;
use crate::resilience::TimeoutError;

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Orchestration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    /// A single attempt exceeded its time limit
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// Model error
    #[error("Model error: {0}")]
    Model(#[from] verdict_abstraction::ModelError),

    /// Every candidate model was tried and none succeeded
    #[error("All candidate models failed. Details: {}", describe_failures(.0))]
    AllCandidatesFailed(Vec<CandidateFailure>),

    /// Orchestration cancelled
    #[error("Orchestration cancelled")]
    Cancelled,

    /// Other error
    #[error("Orchestration error: {0}")]
    Other(String),
}

impl OrchestrationError {
    /// Returns true for cancellation, whether raised here or by the model layer.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Model(verdict_abstraction::ModelError::Cancelled))
    }
}

fn describe_failures(failures: &[CandidateFailure]) -> String {
    if failures.is_empty() {
        return "no candidate models were available".to_string();
    }
    failures.iter().map(|f| format!("{}: {}", f.model, f.error)).collect::<Vec<_>>().join(" | ")
}
