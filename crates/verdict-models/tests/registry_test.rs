//! Registry and factory working together.

use verdict_models::{DEFAULT_CANDIDATE, ModelFactory, RegistryConfig, candidate_names, discover_candidates};

#[test]
fn test_every_discovered_candidate_is_constructible() {
    let config = RegistryConfig::from_vars([
        ("GOOGLE_GENAI_API_KEY", "g"),
        ("OPENAI_API_KEY", "o"),
        ("ANTHROPIC_API_KEY", "a"),
        ("AZURE_OPENAI_API_KEY", "z"),
        ("AZURE_OPENAI_ENDPOINT", "https://acme.openai.azure.com"),
        ("OLLAMA_HOST", "127.0.0.1:11434"),
    ]);

    let candidates = discover_candidates(&config);
    assert_eq!(candidates.len(), 10);
    for candidate in &candidates {
        let model = ModelFactory::create_for(candidate, &config)
            .unwrap_or_else(|e| panic!("{} should be constructible: {e}", candidate.name));
        assert_eq!(model.model_id(), candidate.model_id());
    }
}

#[test]
fn test_discovery_is_deterministic() {
    let vars = [("OPENAI_API_KEY", "o"), ("MODEL_PREFERENCE", "4o")];
    let first = candidate_names(&discover_candidates(&RegistryConfig::from_vars(vars)));
    let second = candidate_names(&discover_candidates(&RegistryConfig::from_vars(vars)));

    assert_eq!(first, second);
    assert_eq!(first, vec!["openai/gpt-4o", "openai/gpt-4o-mini", "openai/gpt-4.1"]);
}

#[test]
fn test_default_candidate_without_credentials_is_not_constructible() {
    let config = RegistryConfig::default();
    let candidates = discover_candidates(&config);
    assert_eq!(candidate_names(&candidates), vec![DEFAULT_CANDIDATE.to_string()]);
    assert!(ModelFactory::create_for(&candidates[0], &config).is_err());
}
