//! The persistent-storage decision machine.
//!
//! # State Machine
//!
//! ```text
//!            run()
//! Pending ──────────┬── fast path matched ──────────────► Decided ──► Delivered
//!                   │                                        ▲
//!                   └── ask_permission() ──► Prompting ──────┤
//!                                                allow()  ───┤ Granted
//!                                                cancel() ───┘ Prompt
//!                                                                 │
//!              (on the requesting context) Prompt ─► store lookup ┘
//! ```
//!
//! Delivery is always a separate task on the requesting context, even
//! when the machine itself runs there.

use super::prompt::{PermissionPrompt, PermissionRequest};
use crate::bridge::{BridgeError, CompletionHandle, ContextProxy};
use crate::context::{ContextHandle, WeakContextHandle};
use crate::outcome::{PersistOutcome, RequestFailure};
use parking_lot::Mutex;
use smgr_auth::{PermissionStore, PersistPolicy, PersistentStoragePermission, PERSISTENT_STORAGE};
use smgr_types::{ContextId, Principal, RequestId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a [`PersistRequest`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistPhase {
    /// Created, not yet evaluated.
    Pending,
    /// Waiting for the prompt collaborator.
    Prompting,
    /// A decision is in; delivery is scheduled.
    Decided,
    /// The terminal value has been resolved for delivery.
    Delivered,
}

enum PersistTarget {
    /// Requester is the coordinating context.
    Local {
        context: WeakContextHandle,
        completion: Mutex<Option<CompletionHandle<PersistOutcome>>>,
    },
    /// Requester is another context.
    Proxied(Arc<ContextProxy<PersistOutcome>>),
}

struct MachineState {
    phase: PersistPhase,
    permission: PersistentStoragePermission,
}

/// One persistent-storage request.
///
/// Holds the principal, the delivery target and the optional store. It
/// never holds the prompt collaborator.
pub struct PersistRequest {
    request: RequestId,
    principal: Principal,
    requester: ContextId,
    store: Option<Arc<dyn PermissionStore>>,
    target: PersistTarget,
    state: Mutex<MachineState>,
}

impl PersistRequest {
    /// Creates a request whose requester is the coordinating context.
    #[must_use]
    pub fn local(
        principal: Principal,
        requester: &ContextHandle,
        completion: CompletionHandle<PersistOutcome>,
        store: Option<Arc<dyn PermissionStore>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            request: completion.request_id(),
            principal,
            requester: requester.id(),
            store,
            target: PersistTarget::Local {
                context: requester.downgrade(),
                completion: Mutex::new(Some(completion)),
            },
            state: Mutex::new(MachineState::new()),
        })
    }

    /// Creates a request delivered through `proxy`.
    #[must_use]
    pub fn proxied(
        principal: Principal,
        proxy: Arc<ContextProxy<PersistOutcome>>,
        store: Option<Arc<dyn PermissionStore>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            request: proxy.request_id(),
            principal,
            requester: proxy.initiator_id(),
            store,
            target: PersistTarget::Proxied(proxy),
            state: Mutex::new(MachineState::new()),
        })
    }

    #[must_use]
    pub fn phase(&self) -> PersistPhase {
        self.state.lock().phase
    }

    /// The current permission value.
    #[must_use]
    pub fn permission(&self) -> PersistentStoragePermission {
        self.state.lock().permission
    }

    /// Evaluates the fast paths, then asks `prompt` if none matched.
    ///
    /// Runs on the coordinating context.
    pub fn run(self: &Arc<Self>, policy: &dyn PersistPolicy, prompt: &dyn PermissionPrompt) {
        if !self.requester_alive() {
            debug!(
                request = %self.request,
                requester = %self.requester,
                "requesting context gone before evaluation"
            );
            self.state.lock().phase = PersistPhase::Delivered;
            return;
        }

        if let Some(decision) = policy.evaluate(&self.principal) {
            debug!(
                request = %self.request,
                principal = %self.principal,
                rule = decision.rule.as_str(),
                permission = %decision.permission,
                "fast path decided"
            );
            self.decide(decision.permission);
            return;
        }

        {
            let mut state = self.state.lock();
            if state.phase != PersistPhase::Pending {
                warn!(request = %self.request, phase = ?state.phase, "request already running");
                return;
            }
            state.phase = PersistPhase::Prompting;
        }

        debug!(request = %self.request, principal = %self.principal, "asking for permission");
        prompt.ask_permission(Arc::clone(self) as Arc<dyn PermissionRequest>);
    }

    /// Settles the request with `failure` from the requesting context.
    ///
    /// Used when the work never reached the coordinating context.
    pub fn abort(&self, failure: RequestFailure) {
        self.state.lock().phase = PersistPhase::Delivered;
        let result = match &self.target {
            PersistTarget::Local { completion, .. } => {
                let handle = completion.lock().take();
                match handle {
                    Some(handle) => handle.settle(Err(failure)),
                    None => Err(BridgeError::TargetGone),
                }
            }
            PersistTarget::Proxied(proxy) => proxy.complete(Err(failure)),
        };
        if let Err(e) = result {
            debug!(request = %self.request, error = %e, "abort found nothing to settle");
        }
    }

    fn requester_alive(&self) -> bool {
        match &self.target {
            PersistTarget::Local { context, .. } => context.upgrade_live().is_some(),
            PersistTarget::Proxied(proxy) => !proxy.is_torn_down(),
        }
    }

    /// Records the decision. Only the first call counts.
    fn decide(self: &Arc<Self>, permission: PersistentStoragePermission) -> bool {
        {
            let mut state = self.state.lock();
            if matches!(state.phase, PersistPhase::Decided | PersistPhase::Delivered) {
                warn!(
                    request = %self.request,
                    ignored = %permission,
                    "permission already decided, ignoring"
                );
                return false;
            }
            state.phase = PersistPhase::Decided;
            state.permission = permission;
        }
        self.schedule_delivery();
        true
    }

    fn schedule_delivery(self: &Arc<Self>) {
        let machine = Arc::clone(self);
        let result = match &self.target {
            PersistTarget::Local { context, .. } => match context.upgrade_live() {
                Some(requester) => requester
                    .dispatch(move || machine.finish_local())
                    .map_err(|_| BridgeError::TargetGone),
                None => Err(BridgeError::TargetGone),
            },
            PersistTarget::Proxied(proxy) => proxy.schedule_finish(move |proxy| {
                let outcome = Ok(machine.resolve_terminal());
                if let Err(e) = proxy.complete(outcome) {
                    debug!(
                        request = %machine.request,
                        error = %e,
                        "finishing step found nothing to settle"
                    );
                }
            }),
        };

        match result {
            Ok(()) => debug!(request = %self.request, "delivery scheduled"),
            Err(BridgeError::TargetGone) => {
                debug!(request = %self.request, "requesting context gone, dropping decision");
            }
            Err(e) => warn!(request = %self.request, error = %e, "delivery failed"),
        }
    }

    fn finish_local(&self) {
        let outcome = Ok(self.resolve_terminal());
        let PersistTarget::Local { completion, .. } = &self.target else {
            return;
        };
        let handle = completion.lock().take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.settle(outcome) {
                    warn!(request = %self.request, error = %e, "settle failed");
                }
            }
            None => debug!(request = %self.request, "already settled"),
        }
    }

    /// Turns a dismissed prompt into the stored value, if a store is set.
    fn resolve_terminal(&self) -> PersistentStoragePermission {
        let current = self.state.lock().permission;

        let resolved = if current.is_terminal() {
            current
        } else if let Some(store) = &self.store {
            let stored = store.lookup_permission(&self.principal);
            debug!(
                request = %self.request,
                stored = %stored,
                "prompt dismissed, using stored permission"
            );
            stored
        } else {
            current
        };

        let mut state = self.state.lock();
        state.permission = resolved;
        state.phase = PersistPhase::Delivered;
        resolved
    }
}

impl MachineState {
    fn new() -> Self {
        Self {
            phase: PersistPhase::Pending,
            permission: PersistentStoragePermission::Prompt,
        }
    }
}

impl PermissionRequest for PersistRequest {
    fn request_id(&self) -> RequestId {
        self.request
    }

    fn principal(&self) -> &Principal {
        &self.principal
    }

    fn permission_type(&self) -> &'static str {
        PERSISTENT_STORAGE
    }

    fn requester(&self) -> ContextId {
        self.requester
    }

    fn allow(self: Arc<Self>) {
        debug!(request = %self.request, "prompt allowed");
        self.decide(PersistentStoragePermission::Granted);
    }

    fn cancel(self: Arc<Self>) {
        debug!(request = %self.request, "prompt cancelled");
        self.decide(PersistentStoragePermission::Prompt);
    }
}

impl std::fmt::Debug for PersistRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistRequest")
            .field("request", &self.request)
            .field("principal", &self.principal)
            .field("requester", &self.requester)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
