//! Error types for CSRF protection.

use thiserror::Error;

/// CSRF errors.
///
/// `Configuration` is raised while building the middleware and is fatal.
/// Every other variant is a per-request rejection: callers answer it with
/// `403 Forbidden`, but the variant is kept distinct so it can be logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CsrfError {
    #[error("CSRF configuration error: {0}")]
    Configuration(String),

    #[error("Request origin rejected: {0}")]
    OriginMismatch(String),

    #[error("Missing CSRF token")]
    MissingToken,

    #[error("CSRF token in header/form does not match cookie")]
    TokenMismatch,

    #[error("CSRF token not bound to this session: {0}")]
    SessionBindingMismatch(String),

    #[error("Malformed CSRF token: {0}")]
    MalformedToken(String),

    #[error("CSRF token signature does not match")]
    BadSignature,

    #[error("CSRF token expired")]
    ExpiredToken,
}

impl CsrfError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error is a per-request rejection (as opposed to a
    /// construction failure).
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }

    /// HTTP status code the caller should answer with.
    pub fn status_code(&self) -> u16 {
        if self.is_rejection() { 403 } else { 500 }
    }

    /// Short, stable name used as the `reason` field in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::OriginMismatch(_) => "origin_mismatch",
            Self::MissingToken => "missing_token",
            Self::TokenMismatch => "token_mismatch",
            Self::SessionBindingMismatch(_) => "session_binding_mismatch",
            Self::MalformedToken(_) => "malformed_token",
            Self::BadSignature => "bad_signature",
            Self::ExpiredToken => "expired_token",
        }
    }
}

pub type Result<T> = std::result::Result<T, CsrfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_map_to_forbidden() {
        let rejections = [
            CsrfError::OriginMismatch("https://evil.com".into()),
            CsrfError::MissingToken,
            CsrfError::TokenMismatch,
            CsrfError::SessionBindingMismatch("other session".into()),
            CsrfError::MalformedToken("2 segments".into()),
            CsrfError::BadSignature,
            CsrfError::ExpiredToken,
        ];

        for err in rejections {
            assert!(err.is_rejection());
            assert_eq!(err.status_code(), 403);
        }
    }

    #[test]
    fn test_configuration_is_not_a_rejection() {
        let err = CsrfError::config("empty secret");
        assert!(!err.is_rejection());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "CSRF configuration error: empty secret");
    }

    #[test]
    fn test_reason_names() {
        assert_eq!(CsrfError::BadSignature.reason(), "bad_signature");
        assert_eq!(CsrfError::ExpiredToken.reason(), "expired_token");
    }
}
