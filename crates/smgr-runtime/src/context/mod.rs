//! Execution contexts.
//!
//! An execution context is a serialized task queue: tasks posted to it run
//! one at a time, in posting order, on a single tokio task. While a task
//! runs, [`ContextHandle::current()`] returns the context it runs on.
//!
//! # Architecture
//!
//! ```text
//! ExecutionContext (owner)
//!   │
//!   ├── ContextHandle ──dispatch()──► mpsc ──► runner task
//!   │                                           │
//!   │                                           └── CURRENT.sync_scope(handle, task)
//!   │
//!   └── shutdown()
//!         1. mark closing (dispatch now fails)
//!         2. run shutdown hooks (proxies tear down here)
//!         3. stop the runner; queued tasks are dropped unrun
//! ```
//!
//! Handles are cheap to clone. [`WeakContextHandle`] observes a context
//! without keeping it alive and is what long-lived holders (proxies,
//! persist requests) keep.

mod executor;
mod handle;

pub use executor::ExecutionContext;
pub use handle::{ContextClosed, ContextHandle, HookId, Task, WeakContextHandle};
