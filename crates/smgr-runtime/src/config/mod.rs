//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! Configuration is loaded from multiple sources with priority-based merging:
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────┐
//! │  1. ConfigResolver (CLI flags)          │  Programmatic override
//! ├─────────────────────────────────────────┤
//! │  2. Environment Variables (SMGR_*)      │  Runtime override
//! ├─────────────────────────────────────────┤
//! │  3. Project Config (.smgr/config.toml)  │  Project-specific
//! ├─────────────────────────────────────────┤
//! │  4. Global Config (~/.smgr/config.toml) │  User defaults
//! ├─────────────────────────────────────────┤
//! │  5. Default Values (compile-time)       │  Fallback
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `SMGR_ENABLED` | `enabled` | bool |
//! | `SMGR_PROMPT_TESTING` | `prompt.testing` | bool |
//! | `SMGR_PROMPT_TESTING_ALLOW` | `prompt.testing_allow` | bool |
//! | `SMGR_DEFAULT_QUOTA` | `accounting.default_quota` | u64 |
//!
//! # Example Configuration
//!
//! ```toml
//! # ~/.smgr/config.toml
//!
//! enabled = true
//!
//! [prompt]
//! testing = false
//! testing_allow = true
//!
//! [accounting]
//! default_quota = 2147483648
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{
    AccountingConfig, AccountingLayer, ConfigLayer, PromptLayer, SmgrConfig, DEFAULT_QUOTA,
};

pub use smgr_auth::PromptConfig;

/// Default global config directory.
#[must_use]
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".smgr")
}

/// Default global config file path.
#[must_use]
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".smgr";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
