//! Principal (security identity) types.
//!
//! A [`Principal`] identifies *on whose behalf* a storage request runs.
//! It is pure identity: whether the principal may persist storage, and
//! how much it has used, is decided by collaborators in the auth and
//! runtime layers.

use crate::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Scheme of local files. Origins with this scheme are exempt from
/// persistent-storage prompts.
pub const FILE_SCHEME: &str = "file";

/// Error produced when a principal cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    /// The input is not a valid origin URL.
    #[error("invalid origin '{input}': {reason}")]
    InvalidOrigin {
        /// The rejected input.
        input: String,
        /// Why the parser rejected it.
        reason: String,
    },
}

impl ErrorCode for PrincipalError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidOrigin { .. } => "PRINCIPAL_INVALID_ORIGIN",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// A web-style origin: scheme, host and port.
///
/// Default ports are normalized away, so `https://a.test` and
/// `https://a.test:443` are the same origin.
///
/// # Example
///
/// ```
/// use smgr_types::Origin;
///
/// let origin = Origin::parse("https://example.com:443/some/path").unwrap();
/// assert_eq!(origin.scheme(), "https");
/// assert_eq!(origin.host(), Some("example.com"));
/// assert_eq!(origin.to_string(), "https://example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
}

impl Origin {
    /// Parses an origin from a URL string. Path, query and fragment are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PrincipalError::InvalidOrigin`] if the input is not a URL.
    pub fn parse(input: &str) -> Result<Self, PrincipalError> {
        let url = Url::parse(input).map_err(|e| PrincipalError::InvalidOrigin {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_url(&url))
    }

    /// Builds an origin from an already-parsed URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self {
            scheme: url.scheme().to_string(),
            host: url
                .host_str()
                .filter(|h| !h.is_empty())
                .map(str::to_string),
            // `Url::port` already returns None for the scheme's default port.
            port: url.port(),
        }
    }

    /// Returns the scheme (lowercase, without `:`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the host, if the scheme has one.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the explicit, non-default port.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns `true` if the scheme is `file`.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.scheme == FILE_SCHEME
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(host) = &self.host {
            write!(f, "{host}")?;
        }
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

/// The security principal a storage request is made for.
///
/// # Variants
///
/// | Variant | Description | Prompted? |
/// |---------|-------------|-----------|
/// | `System` | Privileged internal caller | Never |
/// | `Origin` | Content from a web or file origin | Unless exempt |
///
/// # Example
///
/// ```
/// use smgr_types::Principal;
///
/// let system: Principal = "system".parse().unwrap();
/// assert!(system.is_system());
///
/// let site: Principal = "https://example.com".parse().unwrap();
/// assert_eq!(site.scheme(), Some("https"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// The privileged system principal.
    System,
    /// Content identified by its origin.
    Origin(Origin),
}

impl Principal {
    /// Creates an origin principal from a URL string.
    ///
    /// # Errors
    ///
    /// Returns [`PrincipalError::InvalidOrigin`] if the input is not a URL.
    pub fn origin(input: &str) -> Result<Self, PrincipalError> {
        Origin::parse(input).map(Self::Origin)
    }

    /// Returns `true` if this is [`Principal::System`].
    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    /// Returns the origin, if this is an origin principal.
    #[must_use]
    pub fn as_origin(&self) -> Option<&Origin> {
        match self {
            Self::Origin(origin) => Some(origin),
            Self::System => None,
        }
    }

    /// Returns the origin scheme, if any.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.as_origin().map(Origin::scheme)
    }
}

impl std::str::FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("system") {
            return Ok(Self::System);
        }
        Self::origin(s)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Origin(origin) => write!(f, "{origin}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_system() {
        let p: Principal = "system".parse().unwrap();
        assert!(p.is_system());
        assert!(p.as_origin().is_none());
        assert_eq!(p.scheme(), None);
        assert_eq!(p.to_string(), "system");
    }

    #[test]
    fn parse_https_origin() {
        let p: Principal = "https://example.com/index.html?q=1".parse().unwrap();
        assert!(!p.is_system());
        let origin = p.as_origin().unwrap();
        assert_eq!(origin.scheme(), "https");
        assert_eq!(origin.host(), Some("example.com"));
        assert_eq!(origin.port(), None);
        assert_eq!(p.to_string(), "https://example.com");
    }

    #[test]
    fn default_port_normalized() {
        let a = Origin::parse("https://a.test").unwrap();
        let b = Origin::parse("https://a.test:443/").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn explicit_port_kept() {
        let origin = Origin::parse("http://localhost:8080").unwrap();
        assert_eq!(origin.port(), Some(8080));
        assert_eq!(origin.to_string(), "http://localhost:8080");
    }

    #[test]
    fn file_origin() {
        let p = Principal::origin("file:///home/user/index.html").unwrap();
        assert_eq!(p.scheme(), Some(FILE_SCHEME));
        assert!(p.as_origin().unwrap().is_file());
        assert_eq!(p.to_string(), "file://");
    }

    #[test]
    fn invalid_origin_rejected() {
        let err = Principal::origin("not a url").unwrap_err();
        assert_eq!(err.code(), "PRINCIPAL_INVALID_ORIGIN");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("not a url"), "got: {err}");
    }

    #[test]
    fn principal_equality() {
        let a = Principal::origin("https://a.test").unwrap();
        let b = Principal::origin("https://a.test/other").unwrap();
        let c = Principal::origin("https://b.test").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Principal::System);
    }
}
