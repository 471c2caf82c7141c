//! Verdict CLI - Command-line interface for multi-model startup analysis
//!
//! This CLI provides a `verdict` command for inspecting the model pool and running a
//! comprehensive analysis from a JSON request file.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{analyze, models};

/// Verdict CLI - Multi-model startup analysis
///
/// Runs nine analysis modules concurrently across every configured model provider,
/// retrying and falling back between models, and reports what succeeded.
#[derive(Parser, Debug)]
#[command(name = "verdict", author, version, about = "Verdict - Multi-model startup analysis")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the model pool discovered from the environment
    ///
    /// Candidates are listed in fallback order, after MODEL_PREFERENCE is applied.
    Models {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a comprehensive analysis
    ///
    /// Reads an analysis request (JSON with tcaInput, riskInput, ...) and writes the
    /// report JSON to stdout or the given file.
    Analyze {
        /// Path to the request JSON file
        request: PathBuf,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use offline mock models instead of the discovered pool
        #[arg(long)]
        mock: bool,

        /// Skip optional tasks whose input is absent
        #[arg(long)]
        skip_missing: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays machine-readable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Models { json } => models::execute(json),
        Command::Analyze { request, config, output, mock, skip_missing } => {
            analyze::execute(analyze::AnalyzeOptions { request, config, output, mock, skip_missing }).await
        }
    }
}
