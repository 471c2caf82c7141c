//! Model-fallback executor.
//!
//! Walks an ordered candidate list, retrying each model under a [`RetryPolicy`], and
//! returns the first success together with the bookkeeping the diagnostics need.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use verdict_models::ModelCandidate;

use crate::error::{OrchestrationError, Result};
use crate::resilience::{RetryPolicy, with_retry_notify};

/// A candidate that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFailure {
    /// Candidate name.
    pub model: String,
    /// Message of the candidate's final attempt.
    pub error: String,
    /// Calls made to this candidate.
    pub attempts: u32,
}

/// Result of a successful fallback run.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome<T> {
    /// The successful result.
    pub value: T,
    /// Name of the candidate that produced it.
    pub model_used: String,
    /// Candidates tried, including the successful one.
    pub attempts: u32,
    /// Total invocations across all candidates.
    pub calls: u32,
    /// Candidates that failed before the successful one, in trial order.
    pub failures: Vec<CandidateFailure>,
}

/// Tries `work` against each candidate in order until one succeeds.
///
/// Every candidate runs through the retry loop with `policy`. `work` receives the candidate
/// name and the attempt's cancellation token.
///
/// # Arguments
/// * `candidates` - Ordered candidate list (trial order)
/// * `policy` - Retry policy applied to each candidate
/// * `cancel` - Parent cancellation token
/// * `work` - Produces one attempt against the named model
///
/// # Errors
/// Returns `OrchestrationError::AllCandidatesFailed` with one entry per candidate when
/// none succeeds (an empty list fails immediately), or `OrchestrationError::Cancelled`
/// when `cancel` fires.
pub async fn run_with_fallback<T, F, Fut>(
    candidates: &[ModelCandidate],
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    work: F,
) -> Result<FallbackOutcome<T>>
where
    F: Fn(String, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if candidates.is_empty() {
        warn!("No candidate models available");
    }

    let mut failures: Vec<CandidateFailure> = Vec::new();
    let mut calls = 0u32;

    for candidate in candidates {
        let name = candidate.name.as_str();
        let mut invoked = 0u32;

        debug!(model = name, "Trying candidate model");
        let result = with_retry_notify(
            policy,
            cancel,
            |token| {
                invoked += 1;
                work(name.to_string(), token)
            },
            |err, attempt| warn!(model = name, attempt = attempt, error = %err, "Retrying model call"),
        )
        .await;
        calls += invoked;

        match result {
            Ok(value) => {
                return Ok(FallbackOutcome {
                    value,
                    model_used: name.to_string(),
                    attempts: failures.len() as u32 + 1,
                    calls,
                    failures,
                });
            }
            Err(retry_error) if retry_error.cancelled => return Err(OrchestrationError::Cancelled),
            Err(retry_error) => {
                error!(model = name, attempts = invoked, error = %retry_error, "Model failed after retries");
                failures.push(CandidateFailure {
                    model: name.to_string(),
                    error: retry_error.to_string(),
                    attempts: invoked,
                });
            }
        }
    }

    Err(OrchestrationError::AllCandidatesFailed(failures))
}
