//! The usage-accounting collaborator contract.
//!
//! ```text
//! caller (coordinating ctx)          UsageAccounting impl
//! ─────────────────────────          ────────────────────
//! get_usage_for_principal(p, cb) ──► Ok(UsageRequest)
//!                                         │ later, on the coordinating ctx
//! cb.on_usage_result(result)     ◄────────┘ exactly once
//! ```
//!
//! Implementations should call back from a later task on the coordinating
//! context rather than inline from `get_usage_for_principal`.

use crate::outcome::result_code;
use smgr_types::{ErrorCode, Principal, RequestId};
use std::sync::Arc;
use thiserror::Error;

/// A raw accounting report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageResult {
    /// [`result_code::OK`] on success, anything else is a failure.
    pub code: u32,
    pub usage: Option<u64>,
    pub quota: Option<u64>,
}

impl UsageResult {
    /// A complete success report.
    #[must_use]
    pub fn success(usage: u64, quota: u64) -> Self {
        Self {
            code: result_code::OK,
            usage: Some(usage),
            quota: Some(quota),
        }
    }

    /// A failure report.
    ///
    /// A failure never reads as success: code 0 is reported as
    /// [`result_code::UNAVAILABLE`].
    #[must_use]
    pub fn failure(code: u32) -> Self {
        Self {
            code: failure_code(code),
            usage: None,
            quota: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == result_code::OK
    }
}

/// Receives exactly one [`UsageResult`].
pub trait UsageCallback: Send + Sync {
    /// Called once, on the coordinating context.
    fn on_usage_result(self: Arc<Self>, result: UsageResult);
}

/// Receipt for an issued accounting request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRequest {
    id: RequestId,
    principal: Principal,
}

impl UsageRequest {
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            id: RequestId::new(),
            principal,
        }
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// The accounting collaborator could not issue the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingError {
    /// The service is not running.
    #[error("accounting unavailable: {0}")]
    Unavailable(String),

    /// The service refused the principal.
    #[error("accounting rejected {principal} with code {code}")]
    Rejected { principal: String, code: u32 },
}

impl AccountingError {
    /// Numeric code carried into the failure outcome.
    #[must_use]
    pub fn result_code(&self) -> u32 {
        match self {
            Self::Unavailable(_) => result_code::UNAVAILABLE,
            Self::Rejected { code, .. } => failure_code(*code),
        }
    }
}

fn failure_code(code: u32) -> u32 {
    if code == result_code::OK {
        result_code::UNAVAILABLE
    } else {
        code
    }
}

impl ErrorCode for AccountingError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "ACCOUNTING_UNAVAILABLE",
            Self::Rejected { .. } => "ACCOUNTING_REJECTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Source of usage and quota figures.
pub trait UsageAccounting: Send + Sync {
    /// Starts an asynchronous usage lookup for `principal`.
    ///
    /// # Errors
    ///
    /// Returns [`AccountingError`] if the request could not be issued.
    /// `callback` is never invoked in that case.
    fn get_usage_for_principal(
        &self,
        principal: &Principal,
        callback: Arc<dyn UsageCallback>,
    ) -> Result<UsageRequest, AccountingError>;
}
