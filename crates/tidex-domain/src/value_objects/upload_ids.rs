//! Distinct upload identifiers referenced during a merge pass

use std::collections::HashSet;

/// Insertion-ordered set of distinct upload ids.
///
/// Drives the single deferred by-ID fetch issued after the primary and
/// bucket passes. Owned by the merge task; never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadIdSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl UploadIdSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id; returns `false` when it was already present or empty
    pub fn insert(&mut self, upload_id: &str) -> bool {
        if upload_id.is_empty() || self.seen.contains(upload_id) {
            return false;
        }
        self.seen.insert(upload_id.to_string());
        self.order.push(upload_id.to_string());
        true
    }

    /// Membership test
    pub fn contains(&self, upload_id: &str) -> bool {
        self.seen.contains(upload_id)
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// No id recorded
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Consume into the first-seen ordered list
    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_preserves_first_seen_order() {
        let mut set = UploadIdSet::new();
        assert!(set.insert("u2"));
        assert!(set.insert("u1"));
        assert!(!set.insert("u2"));

        assert_eq!(set.len(), 2);
        assert_eq!(set.into_vec(), vec!["u2".to_string(), "u1".to_string()]);
    }

    #[test]
    fn test_empty_id_ignored() {
        let mut set = UploadIdSet::new();
        assert!(!set.insert(""));
        assert!(set.is_empty());
    }

    #[test]
    fn test_contains() {
        let mut set = UploadIdSet::new();
        set.insert("u1");
        assert!(set.contains("u1"));
        assert!(!set.contains("u9"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["u1"]);
    }
}
