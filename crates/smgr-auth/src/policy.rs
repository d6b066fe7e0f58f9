//! Fast-path rules for persistent-storage requests.
//!
//! Before anyone is prompted, a request is checked against a small set
//! of pure rules. The first rule that matches decides the outcome and
//! the prompt collaborator is never consulted.
//!
//! | Order | Rule | Outcome |
//! |-------|------|---------|
//! | 1 | principal is [`Principal::System`] | Granted |
//! | 2 | origin scheme is `file` | Granted |
//! | 3 | `prompt.testing` is set | Granted if `prompt.testing_allow`, else Denied |
//! | 4 | none of the above | prompt |

use crate::PersistentStoragePermission;
use serde::{Deserialize, Serialize};
use smgr_types::Principal;

/// Prompt settings consulted by the fast path.
///
/// `testing_allow` defaults to `true`, so turning on `testing` alone
/// auto-grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Bypass the prompt with a deterministic answer.
    pub testing: bool,
    /// The answer used when `testing` is set.
    pub testing_allow: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            testing: false,
            testing_allow: true,
        }
    }
}

/// Which rule produced a fast-path decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPathRule {
    /// The privileged system principal.
    SystemPrincipal,
    /// A local-file origin.
    FileScheme,
    /// The testing override.
    TestingOverride,
}

impl FastPathRule {
    /// Short name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemPrincipal => "system_principal",
            Self::FileScheme => "file_scheme",
            Self::TestingOverride => "testing_override",
        }
    }
}

/// A decision reached without prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastPathDecision {
    /// The terminal permission.
    pub permission: PersistentStoragePermission,
    /// The rule that matched.
    pub rule: FastPathRule,
}

/// Policy deciding whether a persist request can skip the prompt.
///
/// Implementations must be pure: same principal and settings, same answer.
///
/// # Example
///
/// ```
/// use smgr_auth::{DefaultPersistPolicy, PersistPolicy, PersistentStoragePermission, PromptConfig};
/// use smgr_types::Principal;
///
/// let policy = DefaultPersistPolicy::new(PromptConfig::default());
///
/// let decision = policy.evaluate(&Principal::System).unwrap();
/// assert_eq!(decision.permission, PersistentStoragePermission::Granted);
///
/// let site = Principal::origin("https://example.com").unwrap();
/// assert!(policy.evaluate(&site).is_none());
/// ```
pub trait PersistPolicy: Send + Sync {
    /// Returns the fast-path decision, or `None` if the user must be asked.
    fn evaluate(&self, principal: &Principal) -> Option<FastPathDecision>;
}

/// The standard rule set, driven by [`PromptConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPersistPolicy {
    config: PromptConfig,
}

impl DefaultPersistPolicy {
    /// Creates the policy with the given prompt settings.
    #[must_use]
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Returns the prompt settings.
    #[must_use]
    pub fn config(&self) -> &PromptConfig {
        &self.config
    }
}

impl PersistPolicy for DefaultPersistPolicy {
    fn evaluate(&self, principal: &Principal) -> Option<FastPathDecision> {
        let granted = |rule| {
            Some(FastPathDecision {
                permission: PersistentStoragePermission::Granted,
                rule,
            })
        };

        if principal.is_system() {
            return granted(FastPathRule::SystemPrincipal);
        }

        if principal.as_origin().is_some_and(|o| o.is_file()) {
            return granted(FastPathRule::FileScheme);
        }

        if self.config.testing {
            let permission = if self.config.testing_allow {
                PersistentStoragePermission::Granted
            } else {
                PersistentStoragePermission::Denied
            };
            return Some(FastPathDecision {
                permission,
                rule: FastPathRule::TestingOverride,
            });
        }

        None
    }
}
