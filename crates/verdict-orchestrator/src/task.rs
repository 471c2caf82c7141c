//! Analysis tasks and the per-task runner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use verdict_models::ModelCandidate;

use crate::error::Result;
use crate::fallback::{CandidateFailure, run_with_fallback};
use crate::resilience::RetryPolicy;

/// The nine analysis modules, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Weighted startup scorecard.
    Scorecard,
    /// Risk flags.
    Risk,
    /// Alignment with macro trends.
    MacroTrend,
    /// Benchmarking against peers.
    Benchmark,
    /// Growth classification.
    Growth,
    /// Gap analysis.
    Gap,
    /// Founder fit.
    FounderFit,
    /// Team assessment.
    Team,
    /// Strategic fit with the investor.
    StrategicFit,
}

impl TaskKind {
    /// Every task, in report order.
    pub const ALL: [TaskKind; 9] = [
        TaskKind::Scorecard,
        TaskKind::Risk,
        TaskKind::MacroTrend,
        TaskKind::Benchmark,
        TaskKind::Growth,
        TaskKind::Gap,
        TaskKind::FounderFit,
        TaskKind::Team,
        TaskKind::StrategicFit,
    ];

    /// Stable label used in diagnostics and configuration.
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Scorecard => "scorecard",
            TaskKind::Risk => "risk",
            TaskKind::MacroTrend => "macro-trend",
            TaskKind::Benchmark => "benchmark",
            TaskKind::Growth => "growth",
            TaskKind::Gap => "gap",
            TaskKind::FounderFit => "founder-fit",
            TaskKind::Team => "team",
            TaskKind::StrategicFit => "strategic-fit",
        }
    }

    /// Human-readable module name.
    pub fn title(self) -> &'static str {
        match self {
            TaskKind::Scorecard => "startup scorecard",
            TaskKind::Risk => "risk flags",
            TaskKind::MacroTrend => "macro-trend alignment",
            TaskKind::Benchmark => "benchmarking",
            TaskKind::Growth => "growth classification",
            TaskKind::Gap => "gap analysis",
            TaskKind::FounderFit => "founder fit",
            TaskKind::Team => "team assessment",
            TaskKind::StrategicFit => "strategic fit",
        }
    }

    /// Whether the request schema allows this task's input to be absent.
    ///
    /// The first four tasks have required inputs.
    pub fn is_optional(self) -> bool {
        !matches!(self, TaskKind::Scorecard | TaskKind::Risk | TaskKind::MacroTrend | TaskKind::Benchmark)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|task| task.label() == s)
            .ok_or_else(|| format!("Unknown task '{s}'"))
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Per-task record attached to every report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDiagnostic {
    /// Which task this describes.
    pub task: TaskKind,
    /// Candidate that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// Candidates tried, including the successful one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Wall-clock time spent on the task.
    pub elapsed_ms: u64,
    /// Whether the task produced data.
    pub succeeded: bool,
    /// The task was not run because its optional input was absent.
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipped: bool,
    /// Aggregate error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Candidates that failed before the successful one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_failures: Option<Vec<CandidateFailure>>,
}

/// Data and diagnostic produced by one task run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome<T> {
    /// Result payload, `None` exactly when the task did not succeed.
    pub data: Option<T>,
    /// Diagnostic record.
    pub diagnostic: TaskDiagnostic,
}

impl<T> TaskOutcome<T> {
    /// Outcome for a task that was skipped without calling any model.
    pub fn skipped(task: TaskKind) -> Self {
        Self {
            data: None,
            diagnostic: TaskDiagnostic {
                task,
                model_used: None,
                attempts: None,
                elapsed_ms: 0,
                succeeded: false,
                skipped: true,
                error: None,
                prior_failures: None,
            },
        }
    }
}

/// Runs one analysis task across the candidate list.
///
/// Never fails: every outcome, including total failure, becomes a [`TaskDiagnostic`].
pub async fn run_task<T, F, Fut>(
    task: TaskKind,
    candidates: &[ModelCandidate],
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    work: F,
) -> TaskOutcome<T>
where
    F: Fn(String, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = run_with_fallback(candidates, policy, cancel, work).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) => {
            info!(
                task = %task,
                model = %outcome.model_used,
                attempts = outcome.attempts,
                calls = outcome.calls,
                elapsed_ms = elapsed_ms,
                "Task completed"
            );
            TaskOutcome {
                data: Some(outcome.value),
                diagnostic: TaskDiagnostic {
                    task,
                    model_used: Some(outcome.model_used),
                    attempts: Some(outcome.attempts),
                    elapsed_ms,
                    succeeded: true,
                    skipped: false,
                    error: None,
                    prior_failures: Some(outcome.failures),
                },
            }
        }
        Err(err) => {
            error!(task = %task, elapsed_ms = elapsed_ms, error = %err, "Task failed");
            TaskOutcome {
                data: None,
                diagnostic: TaskDiagnostic {
                    task,
                    model_used: None,
                    attempts: None,
                    elapsed_ms,
                    succeeded: false,
                    skipped: false,
                    error: Some(err.to_string()),
                    prior_failures: None,
                },
            }
        }
    }
}
