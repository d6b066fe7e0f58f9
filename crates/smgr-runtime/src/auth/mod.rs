//! Permission storage for the runtime.
//!
//! Traits and the permission vocabulary live in `smgr-auth`; this module
//! provides the concrete store.
//!
//! ```text
//! smgr-auth (traits + data types)
//!     PersistentStoragePermission, PermissionStore
//!         ↓
//! smgr-runtime/auth (implementations)
//!     MemoryPermissionStore
//! ```

mod permission_store;

pub use permission_store::MemoryPermissionStore;

pub use smgr_auth::{PermissionStore, PersistentStoragePermission};
