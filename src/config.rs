/// Configuration module for gochunk.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::Glob;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::frontend::project::LoadOptions;
use crate::output::OutputFormat;

/// Config file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "gochunk.json";

// ── Default value functions ──────────────────────────────────────────

fn default_project_dir() -> String {
    ".".to_string()
}

fn default_output_path() -> String {
    "code_chunks.json".to_string()
}

fn default_true() -> bool {
    true
}

// ── Config struct ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_project_dir")]
    pub project_dir: String,

    #[serde(default = "default_output_path")]
    pub output_path: String,

    #[serde(default)]
    pub output_format: OutputFormat,

    /// Also extract declarations from `_test.go` files.
    #[serde(default)]
    pub include_tests: bool,

    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    /// Glob patterns, relative to the project root, of files to leave out.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Module path to use instead of the one declared in `go.mod`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
}

// ── Default impl ─────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            output_path: default_output_path(),
            output_format: OutputFormat::default(),
            include_tests: false,
            respect_gitignore: default_true(),
            exclude_patterns: Vec::new(),
            module_path: None,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_FILE`].
    /// A missing file yields the default config; so does a file that is not
    /// valid JSON, after a warning.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_FILE
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.project_dir.trim().is_empty(),
            "project_dir must not be empty"
        );
        anyhow::ensure!(
            !self.output_path.trim().is_empty(),
            "output_path must not be empty"
        );
        for pattern in &self.exclude_patterns {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {pattern}"))?;
        }
        if let Some(module) = &self.module_path {
            anyhow::ensure!(
                !module.trim().is_empty() && !module.contains(char::is_whitespace),
                "module_path must be a non-empty path without whitespace"
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn project_root(&self) -> PathBuf {
        PathBuf::from(&self.project_dir)
    }

    /// Options for loading the configured project.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            include_tests: self.include_tests,
            respect_gitignore: self.respect_gitignore,
            exclude_patterns: self.exclude_patterns.clone(),
            module_path: self.module_path.clone(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project_dir, ".");
        assert_eq!(config.output_path, "code_chunks.json");
        assert_eq!(config.output_format, OutputFormat::Json);
        assert!(!config.include_tests);
        assert!(config.respect_gitignore);
        assert!(config.exclude_patterns.is_empty());
        assert!(config.module_path.is_none());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"project_dir": "./svc", "output_format": "jsonl", "exclude_patterns": ["gen/**"]}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.project_dir, "./svc");
        assert_eq!(config.output_format, OutputFormat::Jsonl);
        assert_eq!(config.exclude_patterns, vec!["gen/**"]);
        // Other fields should have defaults
        assert_eq!(config.output_path, "code_chunks.json");
        assert!(config.respect_gitignore);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gochunk.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gochunk.json");
        let path = path.to_str().unwrap();

        let config = Config {
            include_tests: true,
            module_path: Some("example.com/app".to_string()),
            ..Config::default()
        };
        config.save(path).unwrap();
        assert_eq!(Config::load(path).unwrap(), config);
    }

    #[test]
    fn test_validate_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_output() {
        let mut config = Config::default();
        config.output_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_pattern() {
        let mut config = Config::default();
        config.exclude_patterns = vec!["a/[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_options() {
        let config = Config {
            include_tests: true,
            respect_gitignore: false,
            exclude_patterns: vec!["internal/gen/*".to_string()],
            ..Config::default()
        };
        let options = config.load_options();
        assert!(options.include_tests);
        assert!(!options.respect_gitignore);
        assert_eq!(options.exclude_patterns, vec!["internal/gen/*"]);
        assert!(options.module_path.is_none());
    }
}
