//! The request-scoped collaborators the middleware talks to.
//!
//! The middleware does not own cookies, sessions or requests. Callers hand
//! it these views for the duration of one request; see [`crate::adapter`]
//! and [`crate::session`] for ready-made implementations.

use http::Method;
use std::fmt;

/// Read access to the inbound request.
pub trait CsrfRequest {
    fn method(&self) -> &Method;

    /// Header value by name (case-insensitive)
    fn header(&self, name: &str) -> Option<String>;

    /// Form field by name, if the request carries a form body
    fn form_field(&self, name: &str) -> Option<String>;

    /// Absolute request URI, if known
    fn absolute_uri(&self) -> Option<String>;
}

/// Cookies sent with the request and cookies to set on the response.
pub trait CookieJar {
    fn cookie(&self, name: &str) -> Option<String>;

    fn add_cookie(&mut self, cookie: TokenCookie);
}

/// Per-request view of a session.
pub trait CsrfSession {
    /// Stable session identifier. A session that has not been persisted yet
    /// may not have one.
    fn id(&self) -> Option<String>;

    fn get(&self, key: &str) -> Option<String>;

    fn put(&mut self, key: &str, value: String);

    fn remove(&mut self, key: &str);
}

/// Cookie carrying a token to the client.
///
/// `SameSite` is always `Strict`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub http_only: bool,
}

impl TokenCookie {
    pub const SAME_SITE: &'static str = "Strict";

    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        path: impl Into<String>,
        http_only: bool,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: path.into(),
            http_only,
        }
    }
}

/// Renders the `Set-Cookie` header value.
impl fmt::Display for TokenCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        write!(f, "; SameSite={}", Self::SAME_SITE)
    }
}
