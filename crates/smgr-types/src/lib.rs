//! Core types for SMGR.
//!
//! SMGR runs storage-manager requests (usage estimates, persistent-storage
//! permission) on a single coordinating execution context on behalf of
//! callers living on other contexts. This crate holds the identity and
//! error vocabulary every other layer shares.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  smgr-types   : ContextId, RequestId, Principal, ErrorCode  │ ◄── HERE
//! │  smgr-auth    : PersistentStoragePermission, fast paths,    │
//! │                 PermissionStore                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  smgr-runtime : contexts, bridge, estimate, permission,     │
//! │                 StorageManager, config, reference components│
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  smgr-cli     : command-line front end                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use smgr_types::{ContextId, Principal, RequestId};
//!
//! let coordinator = ContextId::named("coordinator");
//! let request = RequestId::new();
//! let principal: Principal = "https://example.com".parse().unwrap();
//!
//! assert_eq!(coordinator, ContextId::named("coordinator"));
//! assert!(request.to_string().starts_with("req:"));
//! assert!(!principal.is_system());
//! ```

mod error;
mod id;
mod principal;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{ContextId, RequestId};
pub use principal::{Origin, Principal, PrincipalError, FILE_SCHEME};
