//! The context owner and its runner task.

use super::handle::{ContextHandle, Message};
use smgr_types::ContextId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Owner of an execution context.
///
/// Dropping the owner shuts the context down.
///
/// # Example
///
/// ```
/// use smgr_runtime::context::{ContextHandle, ExecutionContext};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let worker = ExecutionContext::spawn("worker");
/// let handle = worker.handle();
///
/// let on_worker = handle
///     .invoke(|| ContextHandle::current().map(|c| c.name().to_string()))
///     .await
///     .unwrap();
/// assert_eq!(on_worker.as_deref(), Some("worker"));
///
/// worker.join().await;
/// assert!(handle.dispatch(|| {}).is_err());
/// # }
/// ```
pub struct ExecutionContext {
    handle: ContextHandle,
    runner: Option<JoinHandle<()>>,
}

impl ExecutionContext {
    /// Spawns a context with a random ID.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(name: impl Into<String>) -> Self {
        Self::spawn_with_id(ContextId::new(), name)
    }

    /// Spawns a context with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn_with_id(id: ContextId, name: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ContextHandle::new(id, name.into(), tx);
        let runner = tokio::spawn(run(handle.clone(), rx));
        debug!(context = %id, name = %handle.name(), "context spawned");
        Self {
            handle,
            runner: Some(runner),
        }
    }

    /// Returns a handle to this context.
    #[must_use]
    pub fn handle(&self) -> ContextHandle {
        self.handle.clone()
    }

    /// Returns the context ID.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.handle.id()
    }

    /// Begins shutdown. Idempotent.
    ///
    /// Shutdown hooks have run by the time this returns. Tasks still
    /// queued are dropped without running.
    pub fn shutdown(&self) {
        self.handle.close();
    }

    /// Shuts down and waits for the runner to stop.
    pub async fn join(mut self) {
        self.handle.close();
        if let Some(runner) = self.runner.take() {
            if let Err(e) = runner.await {
                error!(context = %self.handle.id(), error = %e, "context runner failed");
            }
        }
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.handle.close();
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

async fn run(handle: ContextHandle, mut rx: mpsc::UnboundedReceiver<Message>) {
    let mut dropped = 0usize;
    while let Some(message) = rx.recv().await {
        match message {
            Message::Run(_) if handle.is_closing() => dropped += 1,
            Message::Run(task) => {
                let scoped = handle.clone();
                let result = catch_unwind(AssertUnwindSafe(|| ContextHandle::scope(scoped, task)));
                if result.is_err() {
                    error!(context = %handle.id(), name = %handle.name(), "task panicked");
                }
            }
            Message::Shutdown => break,
        }
    }
    debug!(
        context = %handle.id(),
        name = %handle.name(),
        dropped,
        "context stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn tasks_run_in_order() {
        let ctx = ExecutionContext::spawn("ordered");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            ctx.handle().dispatch(move || seen.lock().push(i)).unwrap();
        }
        ctx.handle().invoke(|| ()).await.unwrap();

        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn current_is_set_only_inside_tasks() {
        assert!(ContextHandle::current().is_none());

        let ctx = ExecutionContext::spawn("current");
        let handle = ctx.handle();
        let expected = handle.id();

        let (id, is_current) = handle
            .invoke(|| {
                let current = ContextHandle::current().unwrap();
                (current.id(), current.is_current())
            })
            .await
            .unwrap();

        assert_eq!(id, expected);
        assert!(is_current);
        assert!(!handle.is_current());
    }

    #[tokio::test]
    async fn dispatch_never_runs_inline() {
        let ctx = ExecutionContext::spawn("inline");
        let handle = ctx.handle();
        let order = Arc::new(Mutex::new(Vec::new()));

        let inner_order = Arc::clone(&order);
        let inner_handle = handle.clone();
        handle
            .invoke(move || {
                let nested = Arc::clone(&inner_order);
                inner_handle
                    .dispatch(move || nested.lock().push("nested"))
                    .unwrap();
                inner_order.lock().push("outer");
            })
            .await
            .unwrap();
        handle.invoke(|| ()).await.unwrap();

        assert_eq!(*order.lock(), vec!["outer", "nested"]);
    }

    #[tokio::test]
    async fn shutdown_runs_hooks_once_and_rejects_work() {
        let ctx = ExecutionContext::spawn("hooks");
        let handle = ctx.handle();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        handle
            .on_shutdown(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        ctx.shutdown();
        ctx.shutdown();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_closing());
        assert!(handle.dispatch(|| {}).is_err());
        assert!(handle.on_shutdown(|| {}).is_err());
        assert!(handle.downgrade().upgrade_live().is_none());
    }

    #[tokio::test]
    async fn tasks_queued_before_shutdown_never_run() {
        let ctx = ExecutionContext::spawn("queued");
        let handle = ctx.handle();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let c = Arc::clone(&calls);
            handle
                .dispatch(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        ctx.join().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn removed_hook_does_not_run() {
        let ctx = ExecutionContext::spawn("remove");
        let handle = ctx.handle();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let id = handle
            .on_shutdown(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(handle.shutdown_hook_count(), 1);
        assert!(handle.remove_shutdown_hook(id));
        assert!(!handle.remove_shutdown_hook(id));

        ctx.join().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_context() {
        let ctx = ExecutionContext::spawn("panic");
        ctx.handle().dispatch(|| panic!("boom")).unwrap();
        let value = ctx.handle().invoke(|| 42).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn drop_closes_context() {
        let handle = ExecutionContext::spawn("dropped").handle();
        assert!(handle.is_closing());
        assert!(handle.invoke(|| ()).await.is_err());
    }
}
