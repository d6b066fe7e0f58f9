//! Auth layer errors.

use smgr_types::ErrorCode;
use thiserror::Error;

/// Errors raised by the auth layer.
///
/// # Example
///
/// ```
/// use smgr_auth::AuthError;
/// use smgr_types::ErrorCode;
///
/// let err = AuthError::UnknownPermission("maybe".into());
/// assert_eq!(err.code(), "AUTH_UNKNOWN_PERMISSION");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// A permission name could not be parsed.
    #[error("unknown permission '{0}' (expected prompt, granted or denied)")]
    UnknownPermission(String),
}

impl ErrorCode for AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownPermission(_) => "AUTH_UNKNOWN_PERMISSION",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
