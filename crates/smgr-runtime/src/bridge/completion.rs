//! Single-assignment completion handles.
//!
//! ```text
//! CompletionHandle<T> ──settle(T)──► oneshot ──► Completion<T> (caller awaits)
//!        │
//!        └── dropped unsettled ──► Completion resolves to Err(Abandoned)
//! ```

use super::BridgeError;
use parking_lot::Mutex;
use smgr_types::{ContextId, RequestId};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, warn};

use crate::context::ContextHandle;

/// The producer side was dropped without settling.
///
/// Happens when the initiating context shuts down before the outcome
/// arrives. No outcome will ever be delivered for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request {0} was abandoned before it settled")]
pub struct Abandoned(pub RequestId);

/// Producer side of a request outcome.
///
/// Owned by the initiating context and settled at most once.
pub struct CompletionHandle<T> {
    request: RequestId,
    owner: ContextId,
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> CompletionHandle<T> {
    /// Creates a handle owned by `owner` and the matching [`Completion`].
    #[must_use]
    pub fn new(request: RequestId, owner: ContextId) -> (Self, Completion<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                request,
                owner,
                tx: Mutex::new(Some(tx)),
            },
            Completion { request, rx },
        )
    }

    /// Returns the request this handle settles.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request
    }

    /// Returns the owning context.
    #[must_use]
    pub fn owner(&self) -> ContextId {
        self.owner
    }

    /// Returns `true` once settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Delivers the outcome.
    ///
    /// A caller that stopped listening is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DoubleSettle`] on the second and later
    /// calls. The first outcome stays in place.
    pub fn settle(&self, outcome: T) -> Result<(), BridgeError> {
        if let Some(current) = ContextHandle::current() {
            if current.id() != self.owner {
                warn!(
                    request = %self.request,
                    owner = %self.owner,
                    context = %current.id(),
                    "settling completion off its owning context"
                );
            }
        }

        let Some(tx) = self.tx.lock().take() else {
            error!(request = %self.request, "completion settled twice");
            return Err(BridgeError::DoubleSettle(self.request));
        };

        // Receiver dropped: the caller lost interest.
        let _ = tx.send(outcome);
        Ok(())
    }
}

impl<T> std::fmt::Debug for CompletionHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("request", &self.request)
            .field("owner", &self.owner)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Consumer side of a request outcome.
///
/// Resolves to the settled outcome, or to [`Abandoned`] if the producer
/// was dropped first.
#[must_use = "a completion does nothing unless awaited or observed"]
pub struct Completion<T> {
    request: RequestId,
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Returns the request this completion observes.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request
    }

    /// Checks for an outcome without waiting.
    ///
    /// Returns `Ok(None)` while the request is still in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Abandoned`] if the producer was dropped unsettled, or
    /// if the outcome was already taken by an earlier call.
    pub fn try_observe(&mut self) -> Result<Option<T>, Abandoned> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(Abandoned(self.request)),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, Abandoned>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let request = this.request;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map_err(|_| Abandoned(request))
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (CompletionHandle<u32>, Completion<u32>) {
        CompletionHandle::new(RequestId::new(), ContextId::named("caller"))
    }

    #[tokio::test]
    async fn settle_delivers_value() {
        let (handle, completion) = pair();
        handle.settle(7).unwrap();
        assert!(handle.is_settled());
        assert_eq!(completion.await, Ok(7));
    }

    #[test]
    fn second_settle_is_rejected_and_first_value_kept() {
        let (handle, mut completion) = pair();
        handle.settle(1).unwrap();

        let err = handle.settle(2).unwrap_err();
        assert_eq!(err, BridgeError::DoubleSettle(handle.request_id()));
        assert_eq!(completion.try_observe(), Ok(Some(1)));
    }

    #[test]
    fn dropped_handle_abandons() {
        let (handle, mut completion) = pair();
        let request = handle.request_id();
        assert_eq!(completion.try_observe(), Ok(None));

        drop(handle);
        assert_eq!(completion.try_observe(), Err(Abandoned(request)));
    }

    #[test]
    fn settle_after_receiver_dropped_is_ok() {
        let (handle, completion) = pair();
        drop(completion);
        assert!(handle.settle(3).is_ok());
    }
}
