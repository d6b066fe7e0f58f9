//! In-memory implementation of [`PermissionStore`].
//!
//! # Architecture
//!
//! ```text
//! PermissionStore trait (smgr-auth)            ← abstract definition
//!          │
//!          └── MemoryPermissionStore (THIS MODULE)  ← concrete impl
//! ```

use smgr_auth::{PermissionStore, PersistentStoragePermission};
use smgr_types::Principal;
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe, in-memory map of recorded persistent-storage decisions.
///
/// Principals with no entry look up as
/// [`PersistentStoragePermission::Prompt`]. Recording `Prompt` is the
/// same as removing the entry.
///
/// # Example
///
/// ```
/// use smgr_auth::{PermissionStore, PersistentStoragePermission};
/// use smgr_runtime::MemoryPermissionStore;
/// use smgr_types::Principal;
///
/// let store = MemoryPermissionStore::new();
/// let site = Principal::origin("https://example.com").unwrap();
///
/// assert_eq!(store.lookup_permission(&site), PersistentStoragePermission::Prompt);
///
/// store.set(&site, PersistentStoragePermission::Denied);
/// assert_eq!(store.lookup_permission(&site), PersistentStoragePermission::Denied);
/// ```
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    entries: RwLock<HashMap<Principal, PersistentStoragePermission>>,
}

impl MemoryPermissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `permission` for `principal`.
    pub fn set(&self, principal: &Principal, permission: PersistentStoragePermission) {
        match self.entries.write() {
            Ok(mut entries) => {
                if permission.is_terminal() {
                    entries.insert(principal.clone(), permission);
                } else {
                    entries.remove(principal);
                }
            }
            Err(e) => {
                tracing::error!("permission_store: lock poisoned on set: {e}");
            }
        }
    }

    /// Forgets any decision for `principal`. Returns the removed value.
    pub fn remove(&self, principal: &Principal) -> Option<PersistentStoragePermission> {
        match self.entries.write() {
            Ok(mut entries) => entries.remove(principal),
            Err(e) => {
                tracing::error!("permission_store: lock poisoned on remove: {e}");
                None
            }
        }
    }

    /// Lists recorded decisions, sorted by principal.
    #[must_use]
    pub fn list(&self) -> Vec<(Principal, PersistentStoragePermission)> {
        let mut list: Vec<_> = match self.entries.read() {
            Ok(entries) => entries.iter().map(|(p, v)| (p.clone(), *v)).collect(),
            Err(e) => {
                tracing::error!("permission_store: lock poisoned on list: {e}");
                Vec::new()
            }
        };
        list.sort_by_key(|(principal, _)| principal.to_string());
        list
    }

    /// Number of recorded decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn lookup_permission(&self, principal: &Principal) -> PersistentStoragePermission {
        match self.entries.read() {
            Ok(entries) => entries.get(principal).copied().unwrap_or_default(),
            Err(e) => {
                tracing::error!("permission_store: lock poisoned on lookup: {e}");
                PersistentStoragePermission::Prompt
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn site(host: &str) -> Principal {
        Principal::origin(&format!("https://{host}")).unwrap()
    }

    #[test]
    fn unknown_is_prompt() {
        let store = MemoryPermissionStore::new();
        assert_eq!(
            store.lookup_permission(&site("a.test")),
            PersistentStoragePermission::Prompt
        );
        assert!(store.is_empty());
    }

    #[test]
    fn set_and_remove() {
        let store = MemoryPermissionStore::new();
        store.set(&site("a.test"), PersistentStoragePermission::Granted);
        assert_eq!(
            store.lookup_permission(&site("a.test")),
            PersistentStoragePermission::Granted
        );

        assert_eq!(
            store.remove(&site("a.test")),
            Some(PersistentStoragePermission::Granted)
        );
        assert_eq!(store.remove(&site("a.test")), None);
    }

    #[test]
    fn setting_prompt_clears_entry() {
        let store = MemoryPermissionStore::new();
        store.set(&site("a.test"), PersistentStoragePermission::Denied);
        store.set(&site("a.test"), PersistentStoragePermission::Prompt);
        assert!(store.is_empty());
    }

    #[test]
    fn list_is_sorted() {
        let store = MemoryPermissionStore::new();
        store.set(&site("b.test"), PersistentStoragePermission::Denied);
        store.set(&site("a.test"), PersistentStoragePermission::Granted);

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].0, site("a.test"));
        assert_eq!(list[1].1, PersistentStoragePermission::Denied);
    }

    #[test]
    fn concurrent_access() {
        let store = Arc::new(MemoryPermissionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let p = site(&format!("h{i}.test"));
                    store.set(&p, PersistentStoragePermission::Granted);
                    store.lookup_permission(&p)
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), PersistentStoragePermission::Granted);
        }
        assert_eq!(store.len(), 8);
    }
}
