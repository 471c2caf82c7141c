//! Comprehensive analysis orchestrator.
//!
//! Discovers the model pool once, runs all nine analysis tasks concurrently and merges
//! their results into one [`AnalysisReport`]. Individual task failures never abort the
//! run; they show up as `null` data plus a failed diagnostic.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use verdict_models::{ModelCandidate, RegistryConfig, candidate_names, discover_candidates};

use crate::config::AnalysisConfig;
use crate::error::OrchestrationError;
use crate::flow::{AnalysisFlow, ModelFlow};
use crate::task::{TaskDiagnostic, TaskKind, TaskOutcome, run_task};

/// Inputs for one comprehensive analysis. Every field is optional on the wire.
///
/// The scorecard and macro-trend inputs travel as `tcaInput` and `macroInput`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(rename = "tcaInput", alias = "scorecardInput", default, skip_serializing_if = "Option::is_none")]
    pub scorecard_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_input: Option<Value>,
    #[serde(rename = "macroInput", alias = "macroTrendInput", default, skip_serializing_if = "Option::is_none")]
    pub macro_trend_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founder_fit_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_fit_input: Option<Value>,
}

impl AnalysisRequest {
    /// Returns the input for `task`.
    pub fn input(&self, task: TaskKind) -> Option<&Value> {
        match task {
            TaskKind::Scorecard => self.scorecard_input.as_ref(),
            TaskKind::Risk => self.risk_input.as_ref(),
            TaskKind::MacroTrend => self.macro_trend_input.as_ref(),
            TaskKind::Benchmark => self.benchmark_input.as_ref(),
            TaskKind::Growth => self.growth_input.as_ref(),
            TaskKind::Gap => self.gap_input.as_ref(),
            TaskKind::FounderFit => self.founder_fit_input.as_ref(),
            TaskKind::Team => self.team_input.as_ref(),
            TaskKind::StrategicFit => self.strategic_fit_input.as_ref(),
        }
    }

    fn slot(&mut self, task: TaskKind) -> &mut Option<Value> {
        match task {
            TaskKind::Scorecard => &mut self.scorecard_input,
            TaskKind::Risk => &mut self.risk_input,
            TaskKind::MacroTrend => &mut self.macro_trend_input,
            TaskKind::Benchmark => &mut self.benchmark_input,
            TaskKind::Growth => &mut self.growth_input,
            TaskKind::Gap => &mut self.gap_input,
            TaskKind::FounderFit => &mut self.founder_fit_input,
            TaskKind::Team => &mut self.team_input,
            TaskKind::StrategicFit => &mut self.strategic_fit_input,
        }
    }

    /// Sets the input for `task`.
    #[must_use]
    pub fn with_input(mut self, task: TaskKind, input: Value) -> Self {
        *self.slot(task) = Some(input);
        self
    }

    /// Tasks whose input is missing although the schema requires it.
    pub fn missing_required(&self) -> Vec<TaskKind> {
        TaskKind::ALL.into_iter().filter(|t| !t.is_optional() && self.input(*t).is_none()).collect()
    }
}

/// Per-run diagnostics bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per task, in [`TaskKind::ALL`] order.
    pub tasks: Vec<TaskDiagnostic>,
    /// Candidate names available to this run, in trial order.
    pub model_pool: Vec<String>,
}

/// Merged output of all nine tasks. Data fields are `null` for tasks that did not succeed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[serde(rename = "tcaData", alias = "scorecardData", default)]
    pub scorecard_data: Option<Value>,
    #[serde(default)]
    pub risk_data: Option<Value>,
    #[serde(rename = "macroData", alias = "macroTrendData", default)]
    pub macro_trend_data: Option<Value>,
    #[serde(default)]
    pub benchmark_data: Option<Value>,
    #[serde(default)]
    pub growth_data: Option<Value>,
    #[serde(default)]
    pub gap_data: Option<Value>,
    #[serde(default)]
    pub founder_fit_data: Option<Value>,
    #[serde(default)]
    pub team_data: Option<Value>,
    #[serde(default)]
    pub strategic_fit_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl AnalysisReport {
    /// Returns the data produced for `task`.
    pub fn data(&self, task: TaskKind) -> Option<&Value> {
        match task {
            TaskKind::Scorecard => self.scorecard_data.as_ref(),
            TaskKind::Risk => self.risk_data.as_ref(),
            TaskKind::MacroTrend => self.macro_trend_data.as_ref(),
            TaskKind::Benchmark => self.benchmark_data.as_ref(),
            TaskKind::Growth => self.growth_data.as_ref(),
            TaskKind::Gap => self.gap_data.as_ref(),
            TaskKind::FounderFit => self.founder_fit_data.as_ref(),
            TaskKind::Team => self.team_data.as_ref(),
            TaskKind::StrategicFit => self.strategic_fit_data.as_ref(),
        }
    }

    fn slot(&mut self, task: TaskKind) -> &mut Option<Value> {
        match task {
            TaskKind::Scorecard => &mut self.scorecard_data,
            TaskKind::Risk => &mut self.risk_data,
            TaskKind::MacroTrend => &mut self.macro_trend_data,
            TaskKind::Benchmark => &mut self.benchmark_data,
            TaskKind::Growth => &mut self.growth_data,
            TaskKind::Gap => &mut self.gap_data,
            TaskKind::FounderFit => &mut self.founder_fit_data,
            TaskKind::Team => &mut self.team_data,
            TaskKind::StrategicFit => &mut self.strategic_fit_data,
        }
    }

    /// Diagnostics of the tasks that did not succeed.
    pub fn failed_tasks(&self) -> Vec<&TaskDiagnostic> {
        self.diagnostics.iter().flat_map(|d| d.tasks.iter()).filter(|t| !t.succeeded).collect()
    }
}

/// Runs the nine analysis tasks against the discovered model pool.
pub struct AnalysisOrchestrator {
    flow: Arc<dyn AnalysisFlow>,
    registry: RegistryConfig,
    config: AnalysisConfig,
    candidate_override: Option<Vec<ModelCandidate>>,
    cancel: CancellationToken,
}

impl AnalysisOrchestrator {
    /// Creates an orchestrator using `flow` for every task.
    pub fn new(flow: Arc<dyn AnalysisFlow>, registry: RegistryConfig) -> Self {
        Self {
            flow,
            registry,
            config: AnalysisConfig::default(),
            candidate_override: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an orchestrator backed by [`ModelFlow`] with the given credentials.
    pub fn with_model_flow(registry: RegistryConfig) -> Self {
        Self::new(Arc::new(ModelFlow::new(registry.clone())), registry)
    }

    /// Sets the run configuration.
    #[must_use]
    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a fixed candidate list instead of discovering one from the registry.
    #[must_use]
    pub fn with_candidates(mut self, candidates: Vec<ModelCandidate>) -> Self {
        self.candidate_override = Some(candidates);
        self
    }

    /// Token that aborts pending attempts and backoff delays of running analyses.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The candidate list a run would use.
    pub fn candidates(&self) -> Vec<ModelCandidate> {
        self.candidate_override.clone().unwrap_or_else(|| discover_candidates(&self.registry))
    }

    /// Runs every analysis task and merges the results.
    ///
    /// Never fails. Each task's data is `null` in the report exactly when its diagnostic
    /// has `succeeded = false`.
    pub async fn run_comprehensive_analysis(&self, request: &AnalysisRequest) -> AnalysisReport {
        let started_at = Utc::now();
        let candidates = self.candidates();
        let model_pool = candidate_names(&candidates);
        info!(models = ?model_pool, "Starting comprehensive analysis");

        let missing = request.missing_required();
        if !missing.is_empty() {
            debug!(tasks = ?missing, "Request is missing required inputs");
        }

        let outcomes = join_all(TaskKind::ALL.into_iter().map(|task| self.run_one(task, request, &candidates))).await;

        let mut report = AnalysisReport::default();
        let mut tasks = Vec::with_capacity(TaskKind::ALL.len());
        for (task, outcome) in TaskKind::ALL.into_iter().zip(outcomes) {
            *report.slot(task) = outcome.data;
            tasks.push(outcome.diagnostic);
        }

        let failed = tasks.iter().filter(|t| !t.succeeded).count();
        let finished_at = Utc::now();
        info!(
            succeeded = tasks.len() - failed,
            failed = failed,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Comprehensive analysis finished"
        );

        report.diagnostics = Some(Diagnostics { started_at, finished_at, tasks, model_pool });
        report
    }

    async fn run_one(
        &self,
        task: TaskKind,
        request: &AnalysisRequest,
        candidates: &[ModelCandidate],
    ) -> TaskOutcome<Value> {
        let input = request.input(task);
        if input.is_none() && task.is_optional() && self.config.skip_missing_inputs {
            debug!(task = %task, "Skipping task without input");
            return TaskOutcome::skipped(task);
        }

        let policy = self.config.policy_for(task);
        let flow = self.flow.as_ref();
        run_task(task, candidates, &policy, &self.cancel, |model, token| async move {
            flow.run(task, &model, input, token).await.map_err(OrchestrationError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_uses_camel_case_keys() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "tcaInput": { "a": 1 },
            "macroInput": { "b": 2 },
            "strategicFitInput": null
        }))
        .unwrap();

        assert_eq!(request.input(TaskKind::Scorecard), Some(&json!({ "a": 1 })));
        assert_eq!(request.input(TaskKind::MacroTrend), Some(&json!({ "b": 2 })));
        assert_eq!(request.input(TaskKind::StrategicFit), None);
        assert_eq!(request.missing_required(), vec![TaskKind::Risk, TaskKind::Benchmark]);
    }

    #[test]
    fn test_request_accepts_long_form_aliases() {
        let request: AnalysisRequest = serde_json::from_value(json!({
            "scorecardInput": { "a": 1 },
            "macroTrendInput": { "b": 2 }
        }))
        .unwrap();

        assert_eq!(request.input(TaskKind::Scorecard), Some(&json!({ "a": 1 })));
        assert_eq!(request.input(TaskKind::MacroTrend), Some(&json!({ "b": 2 })));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, json!({ "tcaInput": { "a": 1 }, "macroInput": { "b": 2 } }));
    }

    #[test]
    fn test_report_uses_dashboard_keys() {
        let mut report = AnalysisReport::default();
        *report.slot(TaskKind::Scorecard) = Some(json!({ "score": 71 }));
        *report.slot(TaskKind::MacroTrend) = Some(json!({ "aligned": true }));
        let json = serde_json::to_value(&report).unwrap();

        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(keys.contains(&"tcaData"));
        assert!(keys.contains(&"macroData"));
        assert!(!keys.contains(&"scorecardData"));
        assert!(!keys.contains(&"macroTrendData"));
        assert_eq!(json["tcaData"], json!({ "score": 71 }));
        assert_eq!(json["macroData"], json!({ "aligned": true }));
    }

    #[test]
    fn test_report_serializes_every_data_field() {
        let mut report = AnalysisReport::default();
        *report.slot(TaskKind::Team) = Some(json!({ "score": 8 }));
        let json = serde_json::to_value(&report).unwrap();

        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 9);
        assert_eq!(json["teamData"], json!({ "score": 8 }));
        assert!(json["founderFitData"].is_null());
        assert!(object.contains_key("strategicFitData"));
        assert_eq!(report.data(TaskKind::Team), Some(&json!({ "score": 8 })));
    }

    #[test]
    fn test_with_input_targets_the_right_field() {
        let request = AnalysisRequest::default().with_input(TaskKind::FounderFit, json!("x"));
        assert_eq!(request.founder_fit_input, Some(json!("x")));
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({ "founderFitInput": "x" }));
    }
}
