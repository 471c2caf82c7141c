//! Analyze command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::warn;
use verdict_models::{ModelCandidate, RegistryConfig};
use verdict_orchestrator::{
    AnalysisConfig, AnalysisOrchestrator, AnalysisReport, AnalysisRequest, ConfigLoader,
};

/// Options for the analyze command.
#[derive(Debug)]
pub struct AnalyzeOptions {
    pub request: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub mock: bool,
    pub skip_missing: bool,
}

/// Execute the analyze command.
pub async fn execute(options: AnalyzeOptions) -> Result<()> {
    let content = fs::read_to_string(&options.request)
        .with_context(|| format!("Failed to read request file {}", options.request.display()))?;
    let request: AnalysisRequest =
        serde_json::from_str(&content).context("Failed to parse analysis request JSON")?;

    let mut config = match &options.config {
        Some(path) => ConfigLoader::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if options.skip_missing {
        config.skip_missing_inputs = true;
    }

    let mut orchestrator = AnalysisOrchestrator::with_model_flow(RegistryConfig::from_env()).with_config(config);
    if options.mock {
        orchestrator =
            orchestrator.with_candidates(vec![ModelCandidate::mock("primary"), ModelCandidate::mock("secondary")]);
    }

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending analysis tasks");
            cancel.cancel();
        }
    });

    let report = orchestrator.run_comprehensive_analysis(&request).await;
    let rendered = serde_json::to_string_pretty(&report)?;

    match &options.output {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("Failed to write report to {}", path.display()))?;
            print_summary(&report);
            eprintln!("{} {}", "Report written to".dimmed(), path.display());
        }
        None => {
            println!("{rendered}");
            print_summary(&report);
        }
    }

    Ok(())
}

/// Prints a per-task summary to stderr.
fn print_summary(report: &AnalysisReport) {
    let Some(diagnostics) = &report.diagnostics else {
        return;
    };

    eprintln!();
    eprintln!("{}", "Analysis Summary".bold().cyan());
    for task in &diagnostics.tasks {
        let label = format!("{:<14}", task.task.label());
        if task.succeeded {
            let model = task.model_used.as_deref().unwrap_or("-");
            let attempts = task.attempts.unwrap_or(1);
            eprintln!(
                "  {} {} {} {}",
                "✓".green(),
                label,
                model.green(),
                format!("({} candidate(s), {}ms)", attempts, task.elapsed_ms).dimmed()
            );
        } else if task.skipped {
            eprintln!("  {} {} {}", "-".yellow(), label, "skipped (no input)".yellow());
        } else {
            let error = task.error.as_deref().unwrap_or("unknown error");
            eprintln!("  {} {} {}", "✗".red(), label, error.red());
        }
    }

    let failed = report.failed_tasks().len();
    let total = diagnostics.tasks.len();
    eprintln!();
    eprintln!(
        "{}",
        format!("{}/{} tasks succeeded across {} model(s)", total - failed, total, diagnostics.model_pool.len())
            .bold()
    );
}
