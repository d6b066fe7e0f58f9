//! Context handles and the task-local "current context".

use parking_lot::Mutex;
use smgr_types::ContextId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// A unit of work posted to a context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

type ShutdownHook = Box<dyn FnOnce() + Send + 'static>;

/// Messages consumed by the context runner.
pub(super) enum Message {
    Run(Task),
    Shutdown,
}

tokio::task_local! {
    static CURRENT: ContextHandle;
}

/// The target context no longer accepts tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("execution context {0} is closed")]
pub struct ContextClosed(pub ContextId);

/// Identifies a registered shutdown hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

pub(super) struct Shared {
    id: ContextId,
    name: String,
    tx: mpsc::UnboundedSender<Message>,
    closing: AtomicBool,
    next_hook: AtomicU64,
    hooks: Mutex<HashMap<HookId, ShutdownHook>>,
}

/// Strong handle to an execution context.
///
/// Holding a handle does not keep the context running; only its
/// [`ExecutionContext`](super::ExecutionContext) owner does.
#[derive(Clone)]
pub struct ContextHandle {
    shared: Arc<Shared>,
}

impl ContextHandle {
    pub(super) fn new(id: ContextId, name: String, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                name,
                tx,
                closing: AtomicBool::new(false),
                next_hook: AtomicU64::new(0),
                hooks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the context the calling task runs on, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Runs `f` with `handle` installed as the current context.
    pub(super) fn scope<R>(handle: Self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(handle, f)
    }

    /// Returns the context ID.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.shared.id
    }

    /// Returns the context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns `true` if the calling task runs on this context.
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT
            .try_with(|current| current.id() == self.id())
            .unwrap_or(false)
    }

    /// Returns `true` once shutdown has begun.
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    /// Posts `task` to the back of the queue.
    ///
    /// Never runs the task inline, even when called from this context.
    ///
    /// # Errors
    ///
    /// Returns [`ContextClosed`] if the context is shutting down or gone.
    pub fn dispatch<F>(&self, task: F) -> Result<(), ContextClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closing() {
            return Err(ContextClosed(self.id()));
        }
        self.shared
            .tx
            .send(Message::Run(Box::new(task)))
            .map_err(|_| ContextClosed(self.id()))
    }

    /// Runs `f` on this context and waits for its return value.
    ///
    /// # Errors
    ///
    /// Returns [`ContextClosed`] if the task could not be posted or the
    /// context stopped before running it.
    pub async fn invoke<F, R>(&self, f: F) -> Result<R, ContextClosed>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatch(move || {
            let _ = tx.send(f());
        })?;
        rx.await.map_err(|_| ContextClosed(self.id()))
    }

    /// Registers a hook run when the context begins shutting down.
    ///
    /// Hooks run on the thread calling shutdown, before the runner stops.
    ///
    /// # Errors
    ///
    /// Returns [`ContextClosed`] if shutdown has already begun.
    pub fn on_shutdown<F>(&self, hook: F) -> Result<HookId, ContextClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut hooks = self.shared.hooks.lock();
        // Checked under the hooks lock: close() flips the flag while
        // holding it, so a hook is either collected or rejected.
        if self.is_closing() {
            return Err(ContextClosed(self.id()));
        }
        let id = HookId(self.shared.next_hook.fetch_add(1, Ordering::Relaxed));
        hooks.insert(id, Box::new(hook));
        Ok(id)
    }

    /// Unregisters a shutdown hook. Returns `false` if it was not present.
    pub fn remove_shutdown_hook(&self, id: HookId) -> bool {
        self.shared.hooks.lock().remove(&id).is_some()
    }

    /// Number of registered shutdown hooks.
    #[must_use]
    pub fn shutdown_hook_count(&self) -> usize {
        self.shared.hooks.lock().len()
    }

    /// Begins shutdown. Returns `false` if it had already begun.
    pub(super) fn close(&self) -> bool {
        let hooks = {
            let mut hooks = self.shared.hooks.lock();
            if self.shared.closing.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *hooks)
        };

        debug!(
            context = %self.id(),
            name = %self.name(),
            hooks = hooks.len(),
            "context shutting down"
        );
        for (_, hook) in hooks {
            hook();
        }

        // The runner may already be gone.
        let _ = self.shared.tx.send(Message::Shutdown);
        true
    }

    /// Creates a weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakContextHandle {
        WeakContextHandle {
            id: self.id(),
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("closing", &self.is_closing())
            .finish()
    }
}

impl PartialEq for ContextHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ContextHandle {}

/// Weak handle to an execution context.
#[derive(Clone)]
pub struct WeakContextHandle {
    id: ContextId,
    shared: Weak<Shared>,
}

impl WeakContextHandle {
    /// Returns the context ID, which stays valid after the context is gone.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Upgrades to a strong handle if the context still exists.
    ///
    /// A closing context still upgrades; check
    /// [`ContextHandle::is_closing()`] before posting work to it.
    #[must_use]
    pub fn upgrade(&self) -> Option<ContextHandle> {
        self.shared.upgrade().map(|shared| ContextHandle { shared })
    }

    /// Upgrades only if the context exists and is accepting tasks.
    #[must_use]
    pub fn upgrade_live(&self) -> Option<ContextHandle> {
        self.upgrade().filter(|handle| !handle.is_closing())
    }
}

impl std::fmt::Debug for WeakContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakContextHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
