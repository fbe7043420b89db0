//! Configuration loading and validation for Skyhook.
//!
//! Loads configuration from a TOML file (`skyhook.toml` next to the binary
//! by default) with environment variable overrides. The Gemini environment
//! variable names (`GEMINI_API_KEY`, `GEMINI_SMART_MODEL`,
//! `GEMINI_FAST_MODEL`, `GEMINI_MODEL`) take precedence over the file so the
//! tool works in CI and shells without any file at all.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "skyhook.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no API key configured — set GEMINI_API_KEY or add api_key to the config file")]
    MissingApiKey,
}

/// The root configuration structure. Maps directly to `skyhook.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model serving the capable tier.
    #[serde(default = "default_model")]
    pub capable_model: String,

    /// Model serving the fast tier.
    #[serde(default = "default_model")]
    pub fast_model: String,

    /// Rounds per user message before the continuation prompt fires.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Directory the agent may browse; writes are confined to
    /// `<workspace_dir>/AI_Workspace`.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Directory for usage logs and error dumps.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// System instruction for the orchestrator.
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_max_iterations() -> u32 {
    10
}
fn default_workspace_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_system_instruction() -> String {
    "You are an efficient automation assistant helping the user carry out tasks \
     (file operations, HTTP requests, and more). Respond professionally and accurately."
        .into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            capable_model: default_model(),
            fast_model: default_model(),
            max_iterations: default_max_iterations(),
            workspace_dir: default_workspace_dir(),
            log_dir: default_log_dir(),
            system_instruction: default_system_instruction(),
        }
    }
}

/// Redact the API key in Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("capable_model", &self.capable_model)
            .field("fast_model", &self.fast_model)
            .field("max_iterations", &self.max_iterations)
            .field("workspace_dir", &self.workspace_dir)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration: file first (if present), then environment
    /// overrides. A missing file is not an error — defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `GEMINI_*` environment variables on top of the file values.
    /// `GEMINI_MODEL` fills both tiers unless a tier-specific variable is set.
    fn apply_env_overrides(&mut self) {
        if let Some(key) = env_non_empty("GEMINI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(shared) = env_non_empty("GEMINI_MODEL") {
            self.capable_model = shared.clone();
            self.fast_model = shared;
        }
        if let Some(capable) = env_non_empty("GEMINI_SMART_MODEL") {
            self.capable_model = capable;
        }
        if let Some(fast) = env_non_empty("GEMINI_FAST_MODEL") {
            self.fast_model = fast;
        }
    }

    /// Validate that the config is usable for a live session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    /// Whether the two tiers are actually served by different models.
    /// Tier-dependent extras (e.g., fast-model summarization) are only worth
    /// enabling when they are.
    pub fn has_distinct_fast_model(&self) -> bool {
        self.capable_model != self.fast_model
    }

    /// Write a commented starter config to `path` if nothing is there yet.
    /// Returns `true` when a file was created.
    pub fn write_template(path: &Path) -> std::io::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        let template = r#"# Skyhook configuration
# The GEMINI_API_KEY environment variable overrides api_key below.
api_key = ""

# Models per tier. Leave equal to use a single model for everything.
capable_model = "gemini-2.5-flash"
fast_model = "gemini-2.5-flash"

# Rounds per user message before asking whether to continue.
max_iterations = 10

# Directory the agent may browse. Writes go to <workspace_dir>/AI_Workspace.
workspace_dir = "."

# Usage logs and API error dumps.
log_dir = "logs"
"#;
        std::fs::write(path, template)?;
        Ok(true)
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_file() {
        let config = AppConfig::default();
        assert_eq!(config.capable_model, "gemini-2.5-flash");
        assert_eq!(config.max_iterations, 10);
        assert!(!config.has_distinct_fast_model());
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skyhook.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "api_key = \"k-123\"\ncapable_model = \"gemini-2.5-pro\"\nmax_iterations = 3"
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k-123"));
        assert_eq!(config.capable_model, "gemini-2.5-pro");
        assert_eq!(config.fast_model, "gemini-2.5-flash");
        assert_eq!(config.max_iterations, 3);
        assert!(config.has_distinct_fast_model());
    }

    #[test]
    fn parse_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skyhook.toml");
        std::fs::write(&path, "api_key = [not toml").unwrap();
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn validate_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));

        let config = AppConfig {
            api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("super-secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn template_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skyhook.toml");
        assert!(AppConfig::write_template(&path).unwrap());
        assert!(!AppConfig::write_template(&path).unwrap());
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.max_iterations, 10);
    }
}
