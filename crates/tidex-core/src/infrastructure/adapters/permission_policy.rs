//! In-memory grant table used as the authorization policy

use std::collections::HashSet;

use super::generic_store::InMemoryStore;
use crate::domain::ports::{AuthRequest, AuthorizationPolicy};

/// Caller → readable users, plus a set of unrestricted callers
#[derive(Debug, Clone, Default)]
pub struct PermissionTable {
    grants: InMemoryStore<String, HashSet<String>>,
    unrestricted: InMemoryStore<String, ()>,
}

impl PermissionTable {
    /// Empty table; only owners may read their data
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `caller` read the data of `target`
    pub fn grant(&self, caller: impl Into<String>, target: impl Into<String>) {
        let target = target.into();
        self.grants
            .update(caller.into(), HashSet::new, |targets| {
                targets.insert(target);
            });
    }

    /// Withdraw a grant
    pub fn revoke(&self, caller: &str, target: &str) {
        self.grants.update(caller.to_string(), HashSet::new, |targets| {
            targets.remove(target);
        });
    }

    /// Let `caller` read every user's data
    pub fn grant_all(&self, caller: impl Into<String>) {
        self.unrestricted.insert(caller.into(), ());
    }
}

impl AuthorizationPolicy for PermissionTable {
    fn authorize(&self, request: &AuthRequest, target_user_ids: &[String]) -> bool {
        let Some(caller) = request.caller_id.as_ref() else {
            return false;
        };
        if self.unrestricted.contains_key(caller) {
            return true;
        }

        !target_user_ids.is_empty()
            && self
                .grants
                .with(caller, |targets| {
                    target_user_ids
                        .iter()
                        .all(|target| target == caller || targets.contains(target))
                })
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraceId;

    fn request(caller: Option<&str>) -> AuthRequest {
        AuthRequest {
            caller_id: caller.map(str::to_string),
            session_token: None,
            method: "GET".to_string(),
            path: "/v1/summary/u1".to_string(),
            trace_id: TraceId::new(),
        }
    }

    #[test]
    fn test_grants() {
        let table = PermissionTable::new();
        table.grant("clinic", "u1");

        assert!(table.authorize(&request(Some("clinic")), &["u1".to_string()]));
        assert!(!table.authorize(&request(Some("clinic")), &["u1".to_string(), "u2".to_string()]));
        assert!(!table.authorize(&request(Some("other")), &["u1".to_string()]));
        assert!(!table.authorize(&request(None), &["u1".to_string()]));

        table.revoke("clinic", "u1");
        assert!(!table.authorize(&request(Some("clinic")), &["u1".to_string()]));
    }

    #[test]
    fn test_unrestricted_caller() {
        let table = PermissionTable::new();
        table.grant_all("server");
        assert!(table.authorize(&request(Some("server")), &["u1".to_string(), "u2".to_string()]));
    }
}
