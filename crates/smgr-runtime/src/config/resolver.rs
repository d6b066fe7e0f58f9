//! Configuration resolver trait for layered overrides.
//!
//! # Architecture
//!
//! ```text
//! ConfigLoader.load()  →  SmgrConfig (base)
//!                              │
//!                              ▼
//!                     ConfigResolver.apply()
//!                              │
//!                              ▼
//!                     SmgrConfig (final)
//! ```
//!
//! # Example
//!
//! ```
//! use smgr_runtime::config::{ConfigResolver, SmgrConfig};
//!
//! struct CliOverrides {
//!     testing: Option<bool>,
//! }
//!
//! impl ConfigResolver for CliOverrides {
//!     fn apply(&self, config: &mut SmgrConfig) {
//!         if let Some(t) = self.testing {
//!             config.prompt.testing = t;
//!         }
//!     }
//! }
//!
//! let mut config = SmgrConfig::default();
//! CliOverrides { testing: Some(true) }.apply(&mut config);
//! assert!(config.prompt.testing);
//! ```

use super::SmgrConfig;

/// Trait for applying configuration overrides.
///
/// Applied after all file and environment layers, for CLI flags and
/// programmatic settings.
pub trait ConfigResolver {
    /// Applies overrides to the given configuration.
    ///
    /// Only specified values should be applied, preserving existing values
    /// for unspecified options.
    fn apply(&self, config: &mut SmgrConfig);
}

/// No-op resolver that makes no changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut SmgrConfig) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_resolver_does_nothing() {
        let mut config = SmgrConfig::default();
        let original = config.clone();

        NoOpResolver.apply(&mut config);

        assert_eq!(config, original);
    }

    #[test]
    fn custom_resolver() {
        struct QuotaOverride(Option<u64>);

        impl ConfigResolver for QuotaOverride {
            fn apply(&self, config: &mut SmgrConfig) {
                if let Some(q) = self.0 {
                    config.accounting.default_quota = q;
                }
            }
        }

        let mut config = SmgrConfig::default();
        QuotaOverride(None).apply(&mut config);
        assert_eq!(config, SmgrConfig::default());

        QuotaOverride(Some(7)).apply(&mut config);
        assert_eq!(config.accounting.default_quota, 7);
    }
}
