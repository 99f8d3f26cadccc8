//! In-memory session credentials

use super::generic_store::InMemoryStore;
use crate::domain::ports::SessionValidator;

/// Session token → user id
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    sessions: InMemoryStore<String, String>,
}

impl SessionTable {
    /// Table without any session
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `token` to `user_id`, replacing any previous owner
    pub fn register(&self, token: impl Into<String>, user_id: impl Into<String>) {
        self.sessions.insert(token.into(), user_id.into());
    }

    /// Invalidate `token`; returns its former owner
    pub fn revoke(&self, token: &str) -> Option<String> {
        self.sessions.remove(&token.to_string())
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.count()
    }

    /// No live session
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionValidator for SessionTable {
    fn resolve(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        self.sessions.get(&token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_token_resolves_to_owner() {
        let table = SessionTable::new();
        table.register("token-u1", "u1");

        assert_eq!(table.resolve("token-u1").as_deref(), Some("u1"));
        assert_eq!(table.resolve("token-u2"), None);
        assert_eq!(table.resolve(""), None);
    }

    #[test]
    fn test_revoked_token_no_longer_resolves() {
        let table = SessionTable::new();
        table.register("token-u1", "u1");

        assert_eq!(table.revoke("token-u1").as_deref(), Some("u1"));
        assert_eq!(table.resolve("token-u1"), None);
        assert!(table.is_empty());
    }
}
