//! Persisted-permission store trait.
//!
//! When a user dismisses or denies the persistent-storage prompt, the
//! prompt collaborator cannot tell the decision machine which one it
//! was. The machine then asks the store what was actually recorded.
//!
//! ```text
//! PermissionStore trait (smgr-auth)          ← abstract definition
//!          │
//!          └── MemoryPermissionStore (smgr-runtime)  ← in-memory impl
//! ```

use crate::PersistentStoragePermission;
use smgr_types::Principal;

/// Read access to persisted permission decisions.
///
/// `lookup_permission` must be synchronous and free of side effects.
/// Principals with no recorded decision look up as
/// [`PersistentStoragePermission::Prompt`].
///
/// # Example
///
/// ```
/// use smgr_auth::{PermissionStore, PersistentStoragePermission};
/// use smgr_types::Principal;
///
/// struct DenyAll;
///
/// impl PermissionStore for DenyAll {
///     fn lookup_permission(&self, _principal: &Principal) -> PersistentStoragePermission {
///         PersistentStoragePermission::Denied
///     }
/// }
///
/// let store = DenyAll;
/// assert_eq!(
///     store.lookup_permission(&Principal::System),
///     PersistentStoragePermission::Denied
/// );
/// ```
pub trait PermissionStore: Send + Sync {
    /// Returns the recorded permission for `principal`.
    fn lookup_permission(&self, principal: &Principal) -> PersistentStoragePermission;
}
