//! Identifier types for SMGR.
//!
//! All identifiers are UUID-based so they can be logged, compared and
//! carried across execution contexts without coordination.

use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

/// SMGR namespace UUID for deterministic UUID v5 generation.
///
/// Used to derive stable identifiers for well-known contexts (for example
/// the coordinating context of a storage manager) from their names.
const SMGR_NAMESPACE: Uuid = uuid!("5c0b8a3e-2f61-4d7a-9e3b-71c4a0d2e8f5");

/// Identifier for an execution context.
///
/// An execution context is a serialized task queue. Exactly one context
/// per storage manager is the *coordinating* context; any number of
/// other contexts may initiate requests.
///
/// # UUID Strategy
///
/// - **Named contexts**: UUID v5 derived from the name ([`ContextId::named`])
/// - **Anonymous contexts**: UUID v4 ([`ContextId::new`])
///
/// # Example
///
/// ```
/// use smgr_types::ContextId;
///
/// let a = ContextId::named("coordinator");
/// let b = ContextId::named("coordinator");
/// assert_eq!(a, b);
///
/// let worker = ContextId::new();
/// assert_ne!(worker, a);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

#[allow(clippy::new_without_default)] // Default intentionally not implemented - see below
impl ContextId {
    /// Creates a new [`ContextId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic [`ContextId`] from a context name.
    ///
    /// Same name always yields the same identifier.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Uuid::new_v5(&SMGR_NAMESPACE, format!("ctx:{name}").as_bytes()))
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

// NOTE: ContextId intentionally does NOT implement Default.
// A defaulted id would not belong to any running context; contexts hand
// out their own id through `ContextHandle::id()`.

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx:{}", self.0)
    }
}

/// Identifier for a single storage request.
///
/// Every estimate or persist request gets one, and it shows up in every
/// log line along the request's cross-context path.
///
/// # Example
///
/// ```
/// use smgr_types::RequestId;
///
/// let req = RequestId::new();
/// assert!(req.to_string().starts_with("req:"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

#[allow(clippy::new_without_default)]
impl RequestId {
    /// Creates a new [`RequestId`] with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req:{}", self.0)
    }
}
