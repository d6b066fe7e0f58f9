//! Cross-context delivery proxy.
//!
//! A [`ContextProxy`] carries a request's completion handle while work
//! runs on the coordinating context, and routes the outcome back to the
//! initiating context.
//!
//! # Lifecycle
//!
//! ```text
//!   create()                   schedule_finish()            complete()
//! ──────────► Live ──────────────────────────────► (queued) ───────────► TornDown
//!              │                                                         ▲
//!              └── initiating context shuts down ── hook: tear_down() ───┘
//! ```
//!
//! Teardown is one-way and idempotent. After it, the completion handle is
//! gone (the caller's [`Completion`](super::Completion) observes
//! [`Abandoned`](super::Abandoned)) and no finishing task will be posted.
//!
//! # Locking
//!
//! All mutable state sits behind one mutex. The lock is never held while
//! running caller-supplied code, except for the short closure passed to
//! [`ContextProxy::with_lock`].

use super::{BridgeError, CompletionHandle};
use crate::context::{ContextHandle, HookId, WeakContextHandle};
use parking_lot::Mutex;
use smgr_types::{ContextId, RequestId};
use std::sync::{Arc, Weak};
use tracing::debug;

struct ProxyState<T> {
    torn_down: bool,
    initiator: Option<WeakContextHandle>,
    completion: Option<CompletionHandle<T>>,
    hook: Option<HookId>,
}

/// Routes one request's outcome back to its initiating context.
pub struct ContextProxy<T> {
    request: RequestId,
    initiator_id: ContextId,
    state: Mutex<ProxyState<T>>,
}

impl<T: Send + 'static> ContextProxy<T> {
    /// Creates a proxy bound to `initiator`.
    ///
    /// Registers a shutdown hook on the initiator that tears the proxy
    /// down. The hook holds the proxy weakly.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ContextUnavailable`] if the initiator is
    /// already shutting down. `completion` is dropped in that case.
    pub fn create(
        initiator: &ContextHandle,
        completion: CompletionHandle<T>,
    ) -> Result<Arc<Self>, BridgeError> {
        if initiator.is_closing() {
            return Err(BridgeError::ContextUnavailable);
        }

        let request = completion.request_id();
        let proxy = Arc::new(Self {
            request,
            initiator_id: initiator.id(),
            state: Mutex::new(ProxyState {
                torn_down: false,
                initiator: Some(initiator.downgrade()),
                completion: Some(completion),
                hook: None,
            }),
        });

        let weak: Weak<Self> = Arc::downgrade(&proxy);
        let hook = initiator
            .on_shutdown(move || {
                if let Some(proxy) = weak.upgrade() {
                    proxy.tear_down();
                }
            })
            .map_err(|_| BridgeError::ContextUnavailable)?;

        {
            let mut state = proxy.state.lock();
            if !state.torn_down {
                state.hook = Some(hook);
            }
        }

        debug!(request = %request, initiator = %initiator.id(), "proxy created");
        Ok(proxy)
    }

    /// Returns the request this proxy serves.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request
    }

    /// Returns the initiating context's ID.
    #[must_use]
    pub fn initiator_id(&self) -> ContextId {
        self.initiator_id
    }

    /// Returns `true` once torn down.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.state.lock().torn_down
    }

    /// Runs `f` under the proxy lock with the live initiator, or `None`
    /// if the proxy is torn down or the initiator is closing.
    ///
    /// `f` must be short and must not call back into this proxy.
    pub fn with_lock<R>(&self, f: impl FnOnce(Option<&ContextHandle>) -> R) -> R {
        let state = self.state.lock();
        let target = if state.torn_down {
            None
        } else {
            state
                .initiator
                .as_ref()
                .and_then(WeakContextHandle::upgrade_live)
        };
        f(target.as_ref())
    }

    /// Takes the completion handle out, or `None` if torn down.
    pub fn take_completion(&self) -> Option<CompletionHandle<T>> {
        let mut state = self.state.lock();
        if state.torn_down {
            return None;
        }
        state.completion.take()
    }

    /// Tears the proxy down. Returns `false` if it already was.
    ///
    /// Drops the completion handle if still held and unregisters the
    /// shutdown hook.
    pub fn tear_down(&self) -> bool {
        let (completion, initiator, hook) = {
            let mut state = self.state.lock();
            if state.torn_down {
                return false;
            }
            state.torn_down = true;
            (
                state.completion.take(),
                state.initiator.take(),
                state.hook.take(),
            )
        };

        debug!(
            request = %self.request,
            abandoned = completion.is_some(),
            "proxy torn down"
        );
        drop(completion);

        if let (Some(initiator), Some(hook)) = (initiator.and_then(|w| w.upgrade()), hook) {
            initiator.remove_shutdown_hook(hook);
        }
        true
    }

    /// Posts `finish` to the initiating context.
    ///
    /// The check and the post happen under the proxy lock, so a
    /// concurrent teardown either happens first (and this fails) or after
    /// the task is queued.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TargetGone`] if the proxy is torn down or
    /// the initiator no longer accepts tasks.
    pub fn schedule_finish<F>(self: &Arc<Self>, finish: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&ContextProxy<T>) + Send + 'static,
    {
        let proxy = Arc::clone(self);
        self.with_lock(move |target| match target {
            Some(initiator) => initiator
                .dispatch(move || finish(&proxy))
                .map_err(|_| BridgeError::TargetGone),
            None => Err(BridgeError::TargetGone),
        })
    }

    /// Settles the completion with `outcome` and tears the proxy down.
    ///
    /// Call on the initiating context.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::TargetGone`] if already torn down, or
    /// [`BridgeError::DoubleSettle`] if the handle was settled elsewhere.
    pub fn complete(&self, outcome: T) -> Result<(), BridgeError> {
        let Some(completion) = self.take_completion() else {
            debug!(request = %self.request, "proxy gone before completion");
            return Err(BridgeError::TargetGone);
        };
        let result = completion.settle(outcome);
        self.tear_down();
        result
    }
}

impl<T> std::fmt::Debug for ContextProxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProxy")
            .field("request", &self.request)
            .field("initiator", &self.initiator_id)
            .field("torn_down", &self.state.lock().torn_down)
            .finish()
    }
}
