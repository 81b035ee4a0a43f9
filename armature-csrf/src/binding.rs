//! Association between a token and the session it was issued for.

use std::fmt;

const SEPARATOR: char = '/';

/// A token bound to a session id.
///
/// Stored in the session under the configured header name as
/// `session_id "/" token`. Session ids change when a session is upgraded
/// (login, role change), which invalidates any token bound to the old id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub session_id: String,
    pub token: String,
}

impl SessionBinding {
    pub fn new(session_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            token: token.into(),
        }
    }

    /// Parse the stored form. Splits on the first separator, so the token
    /// itself may contain `/`.
    pub fn decode(stored: &str) -> Option<Self> {
        stored
            .split_once(SEPARATOR)
            .map(|(session_id, token)| Self::new(session_id, token))
    }

    /// The stored form
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.session_id, SEPARATOR, self.token)
    }

    pub fn is_bound_to(&self, session_id: &str) -> bool {
        self.session_id == session_id
    }
}

impl fmt::Display for SessionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.session_id, SEPARATOR, self.token)
    }
}
