//! Cross-context request bridge.
//!
//! Requests start on an initiating context, do their work on the single
//! coordinating context, and settle back on the initiating context.
//!
//! ```text
//! initiating ctx                    coordinating ctx
//! ──────────────                    ────────────────
//! CompletionHandle ─┐
//!                   ├─► ContextProxy ──run_on_coordinator()──► work
//! Completion (await)│        ▲                                  │
//!                   │        └──────── schedule_finish() ◄──────┘
//!                   └◄── complete(outcome) (on initiating ctx)
//! ```
//!
//! When both roles fall on the same context no proxy is created and the
//! outcome is settled directly.

mod completion;
mod dispatch;
mod error;
mod proxy;

pub use completion::{Abandoned, Completion, CompletionHandle};
pub use dispatch::{CoordinatingDispatch, Dispatched};
pub use error::BridgeError;
pub use proxy::ContextProxy;
