//! Bridge errors.

use smgr_types::{ContextId, ErrorCode, RequestId};
use thiserror::Error;

/// Errors raised while moving a request between contexts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The initiating context is missing or already shutting down.
    #[error("initiating context unavailable")]
    ContextUnavailable,

    /// The coordinating context refused the work.
    #[error("coordinating context {0} rejected the request")]
    DispatchFailed(ContextId),

    /// The proxy was torn down, or its context stopped accepting tasks.
    #[error("delivery target is gone")]
    TargetGone,

    /// A completion handle was settled more than once.
    #[error("completion for {0} already settled")]
    DoubleSettle(RequestId),
}

impl ErrorCode for BridgeError {
    fn code(&self) -> &'static str {
        match self {
            Self::ContextUnavailable => "BRIDGE_CONTEXT_UNAVAILABLE",
            Self::DispatchFailed(_) => "BRIDGE_DISPATCH_FAILED",
            Self::TargetGone => "BRIDGE_TARGET_GONE",
            Self::DoubleSettle(_) => "BRIDGE_DOUBLE_SETTLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::DispatchFailed(_))
    }
}
