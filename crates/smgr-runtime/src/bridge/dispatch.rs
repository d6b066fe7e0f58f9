//! Routing work onto the coordinating context.

use super::BridgeError;
use crate::context::ContextHandle;
use smgr_types::ContextId;
use tracing::trace;

/// How [`CoordinatingDispatch::run_on_coordinator`] ran the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Already on the coordinator; the work ran before returning.
    Inline,
    /// The work was queued on the coordinator.
    Queued,
}

/// Runs work on the single coordinating context.
#[derive(Debug, Clone)]
pub struct CoordinatingDispatch {
    coordinator: ContextHandle,
}

impl CoordinatingDispatch {
    /// Creates a dispatcher targeting `coordinator`.
    #[must_use]
    pub fn new(coordinator: ContextHandle) -> Self {
        Self { coordinator }
    }

    /// Returns the coordinator handle.
    #[must_use]
    pub fn coordinator(&self) -> &ContextHandle {
        &self.coordinator
    }

    /// Returns the coordinator ID.
    #[must_use]
    pub fn coordinator_id(&self) -> ContextId {
        self.coordinator.id()
    }

    /// Returns `true` if the calling task runs on the coordinator.
    #[must_use]
    pub fn is_on_coordinator(&self) -> bool {
        self.coordinator.is_current()
    }

    /// Runs `work` inline when already on the coordinator, otherwise
    /// queues it there.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DispatchFailed`] if the coordinator refused
    /// the work. `work` is dropped unrun in that case.
    pub fn run_on_coordinator<F>(&self, work: F) -> Result<Dispatched, BridgeError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_on_coordinator() {
            trace!(coordinator = %self.coordinator.id(), "running inline");
            work();
            return Ok(Dispatched::Inline);
        }

        self.coordinator
            .dispatch(work)
            .map(|()| Dispatched::Queued)
            .map_err(|closed| BridgeError::DispatchFailed(closed.0))
    }
}
