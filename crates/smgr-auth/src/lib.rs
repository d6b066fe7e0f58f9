//! Permission primitives for SMGR.
//!
//! This crate owns the vocabulary of the persistent-storage decision:
//! the permission state itself, the fast-path rules that decide it
//! without prompting, and the trait of the store consulted when a prompt
//! is dismissed.
//!
//! # Crate Architecture
//!
//! ```text
//! smgr-types  (ContextId, Principal, ErrorCode)
//!     ↑
//! smgr-auth  ◄── THIS CRATE
//! (PersistentStoragePermission, PersistPolicy, PermissionStore)
//!     ↑
//! smgr-runtime (PersistRequest state machine, MemoryPermissionStore)
//! ```
//!
//! # Design Principles
//!
//! - **Traits here, implementations in consumers**: `smgr-runtime`
//!   provides the concrete store and drives the state machine
//! - **Pure rules**: fast-path evaluation has no side effects and no I/O

pub mod error;
pub mod permission;
pub mod policy;
pub mod store;

pub use error::AuthError;
pub use permission::{PersistentStoragePermission, PERSISTENT_STORAGE};
pub use policy::{
    DefaultPersistPolicy, FastPathDecision, FastPathRule, PersistPolicy, PromptConfig,
};
pub use store::PermissionStore;

pub use smgr_types::Principal;
