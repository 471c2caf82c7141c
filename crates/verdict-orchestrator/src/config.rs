//! TOML configuration for analysis runs.
//!
//! ```toml
//! skip_missing_inputs = false
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 400
//! max_delay_ms = 5000
//! jitter = true
//! attempt_timeout_ms = 60000
//!
//! [tasks.risk]
//! max_attempts = 5
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::resilience::RetryPolicy;
use crate::task::TaskKind;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Retry settings as written in the file. Absent fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts per candidate.
    pub max_attempts: Option<u32>,
    /// Delay after the first failed attempt.
    pub base_delay_ms: Option<u64>,
    /// Cap on a single delay; 0 removes the cap.
    pub max_delay_ms: Option<u64>,
    /// Randomize delays.
    pub jitter: Option<bool>,
    /// Per-attempt time limit; 0 disables it.
    pub attempt_timeout_ms: Option<u64>,
}

impl RetrySettings {
    /// Overlays these settings on `base`.
    pub fn apply(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            base_delay: self.base_delay_ms.map_or(base.base_delay, Duration::from_millis),
            max_delay: match self.max_delay_ms {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => base.max_delay,
            },
            jitter: self.jitter.unwrap_or(base.jitter),
            attempt_timeout: match self.attempt_timeout_ms {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => base.attempt_timeout,
            },
        }
    }
}

/// Analysis run configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Skip optional tasks whose input is absent instead of running them with no input.
    #[serde(default)]
    pub skip_missing_inputs: bool,

    /// Settings applied to every task.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Per-task overrides keyed by task label.
    #[serde(default)]
    pub tasks: BTreeMap<String, RetrySettings>,
}

impl AnalysisConfig {
    /// Policy used by tasks without an override.
    pub fn default_policy(&self) -> RetryPolicy {
        self.retry.apply(RetryPolicy::default())
    }

    /// Effective policy for `task`.
    pub fn policy_for(&self, task: TaskKind) -> RetryPolicy {
        let policy = self.default_policy();
        match self.tasks.get(task.label()) {
            Some(overrides) => overrides.apply(policy),
            None => policy,
        }
    }
}

/// Configuration loader for analysis settings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads analysis configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<AnalysisConfig> {
        debug!(path = %path.display(), "Loading analysis configuration");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or invalid.
    pub fn parse(content: &str) -> Result<AnalysisConfig> {
        let config: AnalysisConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates analysis configuration.
    ///
    /// # Errors
    /// Returns error if configuration is invalid.
    pub fn validate(config: &AnalysisConfig) -> Result<()> {
        Self::validate_policy("retry", &config.default_policy())?;

        for label in config.tasks.keys() {
            let task: TaskKind = label.parse().map_err(|_| {
                let valid: Vec<&str> = TaskKind::ALL.iter().map(|t| t.label()).collect();
                ConfigError::Validation(format!(
                    "Unknown task '{label}' in [tasks]. Valid options: {}",
                    valid.join(", ")
                ))
            })?;
            Self::validate_policy(&format!("tasks.{label}"), &config.policy_for(task))?;
        }

        Ok(())
    }

    fn validate_policy(section: &str, policy: &RetryPolicy) -> Result<()> {
        if policy.max_attempts == 0 {
            return Err(ConfigError::Validation(format!("[{section}] max_attempts must be at least 1")));
        }
        if let Some(max_delay) = policy.max_delay.filter(|max| *max < policy.base_delay) {
            return Err(ConfigError::Validation(format!(
                "[{section}] max_delay_ms ({}) must not be less than base_delay_ms ({}); set max_delay_ms = 0 for no cap",
                max_delay.as_millis(),
                policy.base_delay.as_millis()
            )));
        }
        Ok(())
    }
}
