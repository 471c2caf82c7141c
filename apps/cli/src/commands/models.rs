//! Models command implementation.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use verdict_models::{DEFAULT_CANDIDATE, RegistryConfig, discover_candidates};

/// Execute the models command.
pub fn execute(json_output: bool) -> Result<()> {
    let registry = RegistryConfig::from_env();
    let candidates = discover_candidates(&registry);

    if json_output {
        let list: Vec<_> = candidates
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "provider": c.provider,
                    "purpose": c.purpose,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Model Pool ({})", candidates.len()).bold().cyan());
    println!();
    for (index, candidate) in candidates.iter().enumerate() {
        let purpose = candidate.purpose.map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "  {:>2}. {:<32} {:<12} {}",
            index + 1,
            candidate.name.green(),
            candidate.provider.to_string().dimmed(),
            purpose.dimmed()
        );
    }

    if candidates.len() == 1 && candidates[0].name == DEFAULT_CANDIDATE && registry.google_api_key.is_none() {
        println!();
        println!(
            "{}",
            "No provider credentials found; showing the default candidate. Set GOOGLE_GENAI_API_KEY, \
             OPENAI_API_KEY, ANTHROPIC_API_KEY, AZURE_OPENAI_API_KEY + AZURE_OPENAI_ENDPOINT or OLLAMA_HOST."
                .yellow()
        );
    }
    println!();

    Ok(())
}
