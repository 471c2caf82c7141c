//! Multi-model analysis orchestration for Verdict.
//!
//! Runs the nine startup-analysis tasks concurrently, each with per-attempt timeouts,
//! exponential-backoff retries and fallback across the discovered model pool, and merges
//! whatever succeeded into one report with diagnostics.

pub mod config;
pub mod error;
pub mod fallback;
pub mod flow;
pub mod orchestrator;
pub mod resilience;
pub mod task;

pub use config::{AnalysisConfig, ConfigError, ConfigLoader, RetrySettings};
pub use error::OrchestrationError;
pub use fallback::{CandidateFailure, FallbackOutcome, run_with_fallback};
pub use flow::{AnalysisFlow, ModelFlow, parse_json_reply};
pub use orchestrator::{AnalysisOrchestrator, AnalysisReport, AnalysisRequest, Diagnostics};
pub use resilience::{
    AttemptFailure, RetryError, RetryPolicy, TimeoutError, compute_backoff, delay, delay_or_cancel,
    with_retry, with_retry_notify, with_timeout,
};
pub use task::{TaskDiagnostic, TaskKind, TaskOutcome, run_task};
