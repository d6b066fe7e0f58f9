//! Request outcomes delivered through a [`Completion`](crate::bridge::Completion).
//!
//! Domain failures are data, not errors: a request that reached the
//! accounting collaborator and came back with a failure code settles
//! normally with `Err(RequestFailure)`.

use serde::Serialize;
use smgr_auth::PersistentStoragePermission;
use smgr_types::ErrorCode;
use thiserror::Error;

/// Numeric result codes used by outcomes and the accounting contract.
pub mod result_code {
    /// Success.
    pub const OK: u32 = 0;
    /// The accounting collaborator could not take the request.
    pub const UNAVAILABLE: u32 = 1;
    /// The coordinating context refused the work.
    pub const DISPATCH_FAILED: u32 = 2;
    /// A success report lacked a required field.
    pub const INCOMPLETE: u32 = 3;
}

/// Usage and quota for one principal, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageEstimate {
    pub usage: u64,
    pub quota: u64,
}

/// Why a request settled with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestFailure {
    /// The accounting collaborator reported a failure code.
    #[error("accounting failed with code {0}")]
    Accounting(u32),

    /// A success report was missing the named field.
    #[error("accounting result missing {0}")]
    Incomplete(&'static str),

    /// The coordinating context refused the work.
    #[error("coordinating context rejected the request")]
    DispatchFailed,
}

impl RequestFailure {
    /// Numeric code for this failure. Never [`result_code::OK`].
    #[must_use]
    pub fn result_code(&self) -> u32 {
        match self {
            Self::Accounting(code) => *code,
            Self::Incomplete(_) => result_code::INCOMPLETE,
            Self::DispatchFailed => result_code::DISPATCH_FAILED,
        }
    }
}

impl ErrorCode for RequestFailure {
    fn code(&self) -> &'static str {
        match self {
            Self::Accounting(_) => "REQUEST_ACCOUNTING",
            Self::Incomplete(_) => "REQUEST_INCOMPLETE",
            Self::DispatchFailed => "REQUEST_DISPATCH_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Incomplete(_))
    }
}

/// Outcome of a usage estimate.
pub type RequestOutcome = Result<StorageEstimate, RequestFailure>;

/// Outcome of a persistent-storage request.
pub type PersistOutcome = Result<PersistentStoragePermission, RequestFailure>;

#[cfg(test)]
mod tests {
    use super::*;
    use smgr_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                RequestFailure::Accounting(7),
                RequestFailure::Incomplete("quota"),
                RequestFailure::DispatchFailed,
            ],
            "REQUEST_",
        );
    }

    #[test]
    fn accounting_failure_keeps_its_code() {
        let failure = RequestFailure::Accounting(7);
        assert_eq!(failure.result_code(), 7);
        assert!(failure.to_string().contains('7'));
    }

    #[test]
    fn synthetic_codes_are_nonzero() {
        assert_ne!(RequestFailure::DispatchFailed.result_code(), result_code::OK);
        assert_ne!(
            RequestFailure::Incomplete("usage").result_code(),
            result_code::OK
        );
    }

    #[test]
    fn estimate_serializes() {
        let json = serde_json::to_string(&StorageEstimate {
            usage: 10,
            quota: 20,
        })
        .unwrap();
        assert_eq!(json, r#"{"usage":10,"quota":20}"#);
    }
}
