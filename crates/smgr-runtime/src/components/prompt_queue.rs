//! Persistent-storage prompt queue.
//!
//! Holds permission questions until a human answers them.
//!
//! # Overview
//!
//! ```text
//! PersistRequest               PromptQueue                  Human
//!       │                           │                         │
//!       │ ask_permission(request)   │                         │
//!       ├──────────────────────────►│ PendingPrompt (notify)  │
//!       │                           ├────────────────────────►│
//!       │                           │                         │
//!       │                           │   allow / deny / dismiss│
//!       │                           │◄────────────────────────┤
//!       │  allow() / cancel()       │                         │
//!       │◄──────────────────────────┤                         │
//! ```
//!
//! # Example
//!
//! ```
//! use smgr_runtime::components::PromptQueue;
//!
//! let queue = PromptQueue::new();
//! assert!(!queue.has_pending());
//! assert!(queue.allow("missing").is_err());
//! ```

use crate::auth::MemoryPermissionStore;
use crate::permission::{PermissionPrompt, PermissionRequest};
use parking_lot::Mutex;
use serde::Serialize;
use smgr_auth::PersistentStoragePermission;
use smgr_types::{ContextId, ErrorCode, Principal, RequestId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// A question waiting for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingPrompt {
    /// Unique ID for this prompt.
    pub id: String,
    /// The request being decided.
    pub request: RequestId,
    /// Who is asking.
    pub principal: Principal,
    /// The permission asked for.
    pub permission_type: String,
    /// The context the request came from.
    pub requester: ContextId,
    /// When the prompt was queued.
    pub created_at_ms: u64,
}

/// How a prompt was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptAnswer {
    /// Granted; recorded in the store if one is attached.
    Allow,
    /// Denied; recorded in the store if one is attached.
    Deny,
    /// Closed without an answer; nothing is recorded.
    Dismiss,
}

/// Prompt queue errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// No pending prompt has this ID.
    #[error("prompt not found: {0}")]
    NotFound(String),
}

impl ErrorCode for PromptError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "PROMPT_NOT_FOUND",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Answers kept in the audit trail; older ones are dropped first.
pub const MAX_RESOLVED: usize = 256;

struct Entry {
    seq: u64,
    prompt: PendingPrompt,
    request: Arc<dyn PermissionRequest>,
}

/// In-memory [`PermissionPrompt`] answered through method calls.
pub struct PromptQueue {
    pending: Mutex<HashMap<String, Entry>>,
    /// Most recent answers (for audit trail), capped at [`MAX_RESOLVED`].
    resolved: Mutex<VecDeque<(PendingPrompt, PromptAnswer)>>,
    next_seq: Mutex<u64>,
    store: Option<Arc<MemoryPermissionStore>>,
    notify: Mutex<Option<mpsc::UnboundedSender<PendingPrompt>>>,
}

impl PromptQueue {
    /// Creates a queue that records nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            resolved: Mutex::new(VecDeque::new()),
            next_seq: Mutex::new(0),
            store: None,
            notify: Mutex::new(None),
        }
    }

    /// Creates a queue that records allow and deny answers in `store`.
    #[must_use]
    pub fn with_store(store: Arc<MemoryPermissionStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    /// Returns a receiver of newly queued prompts.
    ///
    /// Replaces any earlier subscriber.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PendingPrompt> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.notify.lock() = Some(tx);
        rx
    }

    /// Returns `true` if any prompt is waiting.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Returns `true` if the given prompt is waiting.
    #[must_use]
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.lock().contains_key(id)
    }

    /// Returns waiting prompts, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingPrompt> {
        let pending = self.pending.lock();
        let mut entries: Vec<_> = pending.values().map(|e| (e.seq, e.prompt.clone())).collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, prompt)| prompt).collect()
    }

    /// Returns the retained answers, in answer order.
    #[must_use]
    pub fn resolved(&self) -> Vec<(PendingPrompt, PromptAnswer)> {
        self.resolved.lock().iter().cloned().collect()
    }

    /// Removes and returns the retained answers, in answer order.
    pub fn take_resolved(&self) -> Vec<(PendingPrompt, PromptAnswer)> {
        self.resolved.lock().drain(..).collect()
    }

    /// Grants the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NotFound`] if `id` is not pending.
    pub fn allow(&self, id: &str) -> Result<PendingPrompt, PromptError> {
        self.answer(id, PromptAnswer::Allow)
    }

    /// Denies the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NotFound`] if `id` is not pending.
    pub fn deny(&self, id: &str) -> Result<PendingPrompt, PromptError> {
        self.answer(id, PromptAnswer::Deny)
    }

    /// Closes the prompt without answering.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NotFound`] if `id` is not pending.
    pub fn dismiss(&self, id: &str) -> Result<PendingPrompt, PromptError> {
        self.answer(id, PromptAnswer::Dismiss)
    }

    /// Answers the prompt.
    ///
    /// The store is updated before the request is told, so a cancelled
    /// request reads back what was just recorded.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::NotFound`] if `id` is not pending.
    pub fn answer(&self, id: &str, answer: PromptAnswer) -> Result<PendingPrompt, PromptError> {
        let entry = self
            .pending
            .lock()
            .remove(id)
            .ok_or_else(|| PromptError::NotFound(id.to_string()))?;

        debug!(prompt = %id, principal = %entry.prompt.principal, ?answer, "prompt answered");

        let recorded = match answer {
            PromptAnswer::Allow => Some(PersistentStoragePermission::Granted),
            PromptAnswer::Deny => Some(PersistentStoragePermission::Denied),
            PromptAnswer::Dismiss => None,
        };
        if let (Some(store), Some(permission)) = (&self.store, recorded) {
            store.set(&entry.prompt.principal, permission);
        }

        {
            let mut resolved = self.resolved.lock();
            if resolved.len() == MAX_RESOLVED {
                resolved.pop_front();
            }
            resolved.push_back((entry.prompt.clone(), answer));
        }

        match answer {
            PromptAnswer::Allow => entry.request.allow(),
            PromptAnswer::Deny | PromptAnswer::Dismiss => entry.request.cancel(),
        }
        Ok(entry.prompt)
    }
}

impl Default for PromptQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PromptQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptQueue")
            .field("pending", &self.pending.lock().len())
            .field("resolved", &self.resolved.lock().len())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}

impl PermissionPrompt for PromptQueue {
    fn ask_permission(&self, request: Arc<dyn PermissionRequest>) {
        let prompt = PendingPrompt {
            id: uuid::Uuid::new_v4().to_string(),
            request: request.request_id(),
            principal: request.principal().clone(),
            permission_type: request.permission_type().to_string(),
            requester: request.requester(),
            created_at_ms: now_ms(),
        };

        let seq = {
            let mut next = self.next_seq.lock();
            let seq = *next;
            *next = next.saturating_add(1);
            seq
        };

        debug!(prompt = %prompt.id, principal = %prompt.principal, "prompt queued");
        self.pending.lock().insert(
            prompt.id.clone(),
            Entry {
                seq,
                prompt: prompt.clone(),
                request,
            },
        );

        let mut notify = self.notify.lock();
        if let Some(tx) = notify.as_ref() {
            if tx.send(prompt).is_err() {
                debug!("prompt subscriber gone");
                *notify = None;
            }
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
