//! SMGR Runtime - cross-context storage manager.
//!
//! Storage requests (usage estimates, persistent-storage permission) must
//! run on one coordinating execution context, while callers live on many
//! other contexts. This crate moves each request to the coordinator and
//! delivers its outcome back exactly once, even when the caller's context
//! shuts down mid-flight.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  smgr-types   : ContextId, RequestId, Principal, ErrorCode  │
//! │  smgr-auth    : PersistentStoragePermission, PersistPolicy, │
//! │                 PermissionStore                             │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  context/    : ExecutionContext, ContextHandle              │
//! │  bridge/     : ContextProxy, CompletionHandle, dispatch     │
//! │  estimate    : EstimateResolver                             │
//! │  permission/ : PersistRequest, prompt contract              │
//! │  manager     : StorageManager (public API)                  │
//! │  components/ : UsageLedger, PromptQueue                     │
//! │  config/     : SmgrConfig, ConfigLoader                     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                            │
//! │  (smgr-cli)                                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! ## [`context`] - Execution Contexts
//!
//! Serialized task queues on tokio. [`ContextHandle::current()`]
//! identifies the caller of every public operation.
//!
//! ## [`bridge`] - Cross-Context Delivery
//!
//! - [`CompletionHandle`](bridge::CompletionHandle) /
//!   [`Completion`](bridge::Completion): settle-once outcome and its future
//! - [`ContextProxy`](bridge::ContextProxy): routes an outcome back to the
//!   initiating context, torn down if that context shuts down
//! - [`CoordinatingDispatch`](bridge::CoordinatingDispatch): runs work on
//!   the coordinator
//!
//! ## [`manager`] - Public API
//!
//! [`StorageManager::request_usage_estimate`] and
//! [`StorageManager::request_persistent_storage`].
//!
//! ## [`components`] - Reference Collaborators
//!
//! In-memory accounting and prompt queue.
//!
//! ## [`config`] - Configuration Management
//!
//! Configuration priority: Resolver > Environment > Project > Global > Default

pub mod accounting;
pub mod auth;
pub mod bridge;
pub mod components;
pub mod config;
pub mod context;
pub mod estimate;
pub mod manager;
pub mod outcome;
pub mod permission;

// Re-exports for convenience
pub use accounting::{AccountingError, UsageAccounting, UsageCallback, UsageRequest, UsageResult};
pub use auth::MemoryPermissionStore;
pub use bridge::{Abandoned, BridgeError, Completion};
pub use components::{PromptQueue, UsageLedger};
pub use config::{ConfigError, ConfigLoader, ConfigResolver, SmgrConfig};
pub use context::{ContextHandle, ExecutionContext};
pub use manager::{StorageError, StorageManager, StorageManagerBuilder};
pub use outcome::{PersistOutcome, RequestFailure, RequestOutcome, StorageEstimate};
pub use permission::{PermissionPrompt, PermissionRequest};

// Re-export core vocabulary (part of the public API)
pub use smgr_auth::PersistentStoragePermission;
pub use smgr_types::{ContextId, Principal, RequestId};
