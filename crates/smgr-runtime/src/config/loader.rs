//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.smgr/config.toml`)
//! 3. Project config (`.smgr/config.toml`)
//! 4. Environment variables (`SMGR_*`)
//!
//! Each layer overrides the previous.

use super::types::ConfigLayer;
use super::{default_config_path, ConfigError, SmgrConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing boolean environment variables.
macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Helper macro for parsing unsigned integer environment variables.
macro_rules! parse_env_u64 {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = val
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid_env_var($var, e.to_string()))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```
/// use smgr_runtime::config::{ConfigLoader, SmgrConfig};
///
/// let config = ConfigLoader::new()
///     .skip_global_config()
///     .skip_project_config()
///     .skip_env_vars()
///     .load()
///     .unwrap();
/// assert_eq!(config, SmgrConfig::default());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.smgr/config.toml).
    global_config_path: Option<PathBuf>,

    /// Project root directory.
    project_root: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,

    /// Skip global config loading.
    skip_global: bool,

    /// Skip project config loading.
    skip_project: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root directory.
    ///
    /// Project config will be loaded from `<project_root>/.smgr/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Skips project config loading.
    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config file exists but cannot be parsed,
    /// or an environment variable holds an invalid value.
    /// Missing config files are silently ignored.
    pub fn load(&self) -> Result<SmgrConfig, ConfigError> {
        let mut config = SmgrConfig::default();

        // Layer 1: Global config
        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_layer) = self.load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.apply_layer(&global_layer);
            }
        }

        // Layer 2: Project config
        if !self.skip_project {
            if let Some(ref project_root) = self.project_root {
                let project_config_path = project_root
                    .join(PROJECT_CONFIG_DIR)
                    .join(PROJECT_CONFIG_FILE);

                if let Some(project_layer) = self.load_file(&project_config_path)? {
                    debug!(
                        path = %project_config_path.display(),
                        project = %project_root.display(),
                        "Loaded project config"
                    );
                    config.apply_layer(&project_layer);
                }
            }
        }

        // Layer 3: Environment variables
        if !self.skip_env {
            self.apply_env_vars(&mut config)?;
        }

        Ok(config)
    }

    /// Loads a config file as a layer, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

        let layer =
            ConfigLayer::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

        Ok(Some(layer))
    }

    /// Applies environment variable overrides.
    fn apply_env_vars(&self, config: &mut SmgrConfig) -> Result<(), ConfigError> {
        parse_env_bool!(config.enabled, "SMGR_ENABLED");
        parse_env_bool!(config.prompt.testing, "SMGR_PROMPT_TESTING");
        parse_env_bool!(config.prompt.testing_allow, "SMGR_PROMPT_TESTING_ALLOW");
        parse_env_u64!(config.accounting.default_quota, "SMGR_DEFAULT_QUOTA");

        Ok(())
    }
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
