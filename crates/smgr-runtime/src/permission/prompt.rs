//! The prompt collaborator contract.

use smgr_types::{ContextId, Principal, RequestId};
use std::sync::Arc;

/// A pending permission question handed to a [`PermissionPrompt`].
///
/// Exactly one of [`allow`](Self::allow) or [`cancel`](Self::cancel)
/// should be called, from any thread. Later calls are ignored.
pub trait PermissionRequest: Send + Sync {
    /// Identifies the request.
    fn request_id(&self) -> RequestId;

    /// Who is asking.
    fn principal(&self) -> &Principal;

    /// The permission being asked for.
    fn permission_type(&self) -> &'static str;

    /// The context the request was made from.
    fn requester(&self) -> ContextId;

    /// The user granted the permission.
    fn allow(self: Arc<Self>);

    /// The user dismissed or denied the prompt.
    ///
    /// The two are not distinguished here; what was recorded is read back
    /// from the permission store.
    fn cancel(self: Arc<Self>);
}

/// Presents permission questions to the user.
pub trait PermissionPrompt: Send + Sync {
    /// Starts asking. Must not block waiting for the answer.
    fn ask_permission(&self, request: Arc<dyn PermissionRequest>);
}
