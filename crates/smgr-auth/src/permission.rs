//! Persistent-storage permission state.
//!
//! ```text
//!            ┌──────────┐
//!            │  Prompt  │  (initial, non-terminal)
//!            └────┬─────┘
//!        allow /  │  \ fast path / store lookup
//!             ▼   │   ▼
//!      ┌─────────┐│┌────────┐
//!      │ Granted │││ Denied │
//!      └─────────┘│└────────┘
//!                 ▼
//!        Prompt (dismissed, no stored decision)
//! ```

use crate::AuthError;
use serde::{Deserialize, Serialize};

/// Permission type string handed to prompt collaborators.
pub const PERSISTENT_STORAGE: &str = "persistent-storage";

/// Persistent-storage permission for a principal.
///
/// # Example
///
/// ```
/// use smgr_auth::PersistentStoragePermission;
///
/// let p: PersistentStoragePermission = "granted".parse().unwrap();
/// assert!(p.is_granted());
/// assert!(p.is_terminal());
/// assert!(!PersistentStoragePermission::Prompt.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistentStoragePermission {
    /// No decision yet; the user would be asked.
    #[default]
    Prompt,
    /// Storage may be persisted.
    Granted,
    /// Storage may not be persisted.
    Denied,
}

impl PersistentStoragePermission {
    /// Returns `true` for `Granted` and `Denied`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Prompt)
    }

    /// Returns `true` if this is [`PersistentStoragePermission::Granted`].
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Returns the lowercase name ("prompt", "granted", "denied").
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

impl std::fmt::Display for PersistentStoragePermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PersistentStoragePermission {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prompt" | "default" => Ok(Self::Prompt),
            "granted" | "allow" => Ok(Self::Granted),
            "denied" | "deny" => Ok(Self::Denied),
            _ => Err(AuthError::UnknownPermission(s.to_string())),
        }
    }
}
