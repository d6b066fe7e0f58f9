//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use serde::{Deserialize, Serialize};
use smgr_auth::PromptConfig;

/// Default per-principal quota: 2 GiB.
pub const DEFAULT_QUOTA: u64 = 2 * 1024 * 1024 * 1024;

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
///
/// # Example
///
/// ```
/// use smgr_runtime::config::SmgrConfig;
///
/// let config = SmgrConfig::default();
/// assert!(config.enabled);
/// assert!(!config.prompt.testing);
/// assert!(config.prompt.testing_allow);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmgrConfig {
    /// Whether the storage manager API is available at all.
    pub enabled: bool,

    /// Persistent-storage prompt settings.
    pub prompt: PromptConfig,

    /// Usage accounting settings.
    pub accounting: AccountingConfig,
}

impl Default for SmgrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prompt: PromptConfig::default(),
            accounting: AccountingConfig::default(),
        }
    }
}

impl SmgrConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Applies a file layer on top of this config.
    ///
    /// Every key present in `layer` wins, including keys set back to
    /// their default value. Absent keys keep the lower layer's value.
    pub fn apply_layer(&mut self, layer: &ConfigLayer) {
        if let Some(enabled) = layer.enabled {
            self.enabled = enabled;
        }
        if let Some(testing) = layer.prompt.testing {
            self.prompt.testing = testing;
        }
        if let Some(testing_allow) = layer.prompt.testing_allow {
            self.prompt.testing_allow = testing_allow;
        }
        if let Some(default_quota) = layer.accounting.default_quota {
            self.accounting.default_quota = default_quota;
        }
    }
}

/// One config file as written: only the keys it sets.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigLayer {
    pub enabled: Option<bool>,
    pub prompt: PromptLayer,
    pub accounting: AccountingLayer,
}

impl ConfigLayer {
    /// Deserializes a layer from TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid TOML or a key has the wrong type.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

/// `[prompt]` keys of a [`ConfigLayer`].
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptLayer {
    pub testing: Option<bool>,
    pub testing_allow: Option<bool>,
}

/// `[accounting]` keys of a [`ConfigLayer`].
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccountingLayer {
    pub default_quota: Option<u64>,
}

/// Usage accounting configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccountingConfig {
    /// Quota reported for principals without an override, in bytes.
    pub default_quota: u64,
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            default_quota: DEFAULT_QUOTA,
        }
    }
}
