//! Unified error interface for SMGR.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! failures crossing an execution-context boundary can be logged and
//! matched on a stable, machine-readable code.
//!
//! # Example
//!
//! ```
//! use smgr_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum QueueError {
//!     Closed,
//!     Full,
//! }
//!
//! impl ErrorCode for QueueError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Closed => "QUEUE_CLOSED",
//!             Self::Full => "QUEUE_FULL",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Full)
//!     }
//! }
//!
//! assert_eq!(QueueError::Full.code(), "QUEUE_FULL");
//! assert!(!QueueError::Closed.is_recoverable());
//! ```

/// Machine-readable error code shared by all SMGR error types.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"BRIDGE_DISPATCH_FAILED"`
/// - **Prefixed by layer**: `PRINCIPAL_`, `AUTH_`, `BRIDGE_`, `STORAGE_`,
///   `ACCOUNTING_`, `CONFIG_`
/// - **Stable** once published
pub trait ErrorCode {
    /// Returns the machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying (or a user action) may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows SMGR conventions.
///
/// # Panics
///
/// Panics if the code is empty, lacks `expected_prefix`, or is not
/// UPPER_SNAKE_CASE.
///
/// # Example
///
/// ```
/// use smgr_types::{ErrorCode, assert_error_code};
///
/// #[derive(Debug)]
/// enum MyError { Timeout }
///
/// impl ErrorCode for MyError {
///     fn code(&self) -> &'static str { "MY_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&MyError::Timeout, "MY_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates every error in `errors`. Use it with a list of all variants.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }

    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn error_code_trait() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert_eq!(TestError::Permanent.code(), "TEST_PERMANENT");
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn assert_codes_accepts_valid() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_code_rejects_wrong_prefix() {
        assert_error_code(&TestError::Transient, "OTHER_");
    }

    #[test]
    fn upper_snake_case() {
        assert!(is_upper_snake_case("BRIDGE_TARGET_GONE"));
        assert!(is_upper_snake_case("CODE_7"));
        assert!(!is_upper_snake_case("Bridge_Gone"));
        assert!(!is_upper_snake_case("_LEADING"));
        assert!(!is_upper_snake_case("TRAILING_"));
        assert!(!is_upper_snake_case("DOUBLE__UNDERSCORE"));
        assert!(!is_upper_snake_case(""));
    }
}
