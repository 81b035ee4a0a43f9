//! In-memory session data.

use crate::exchange::CsrfSession;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Session id plus string data, loaded from and saved to whatever store the
/// application uses.
///
/// # Examples
///
/// ```
/// use armature_csrf::{CsrfSession, MemorySession};
///
/// let mut session = MemorySession::new("session-1");
/// session.put("key", "value".to_string());
/// assert_eq!(session.get("key").as_deref(), Some("value"));
///
/// // Login: same data, new id
/// session.regenerate_id("session-2");
/// assert_eq!(session.id().as_deref(), Some("session-2"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySession {
    /// Session identifier, `None` until the session is persisted
    pub id: Option<String>,
    /// Session data as key-value pairs
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl MemorySession {
    /// Create a session with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            data: HashMap::new(),
        }
    }

    /// Create a session that has no id yet
    pub fn unsaved() -> Self {
        Self::default()
    }

    /// Replace the id, keeping the data
    pub fn regenerate_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl CsrfSession for MemorySession {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    fn put(&mut self, key: &str, value: String) {
        self.data.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.data.remove(key);
    }
}
