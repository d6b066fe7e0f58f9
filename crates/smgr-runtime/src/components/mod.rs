//! Reference collaborators.
//!
//! In-memory implementations of the collaborator traits, enough to run
//! the manager end to end:
//!
//! - [`UsageLedger`]: [`UsageAccounting`](crate::accounting::UsageAccounting)
//!   backed by a per-principal usage table
//! - [`PromptQueue`]: [`PermissionPrompt`](crate::permission::PermissionPrompt)
//!   answered through method calls

mod ledger;
mod prompt_queue;

pub use ledger::{SiteUsage, UsageLedger};
pub use prompt_queue::{PendingPrompt, PromptAnswer, PromptError, PromptQueue};
