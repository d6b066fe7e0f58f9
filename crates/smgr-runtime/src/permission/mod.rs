//! Persistent-storage permission requests.
//!
//! [`PersistRequest`] decides whether a principal may keep its storage
//! across eviction. The fast-path rules live in `smgr_auth`; this module
//! drives them, talks to the [`PermissionPrompt`] collaborator and routes
//! the answer back to the requesting context.

mod prompt;
mod request;

pub use prompt::{PermissionPrompt, PermissionRequest};
pub use request::{PersistPhase, PersistRequest};
