//! Staff-to-store association cache.
//!
//! "List staff for store" does not return association ids; only the response
//! of "add staff to store" does. This cache remembers the ids seen during the
//! current session, scoped to one store. A user with no entry is not
//! removable through this client.

use std::collections::HashMap;

/// Map from user id to the association id returned when that user was added
/// to the currently selected store.
#[derive(Debug, Default, Clone)]
pub struct AssociationCache {
    by_user: HashMap<String, String>,
}

impl AssociationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the association id from a successful "add staff" response.
    /// Overwrites any previous id for the user.
    pub fn record(&mut self, user_id: impl Into<String>, association_id: impl Into<String>) {
        self.by_user.insert(user_id.into(), association_id.into());
    }

    /// `None` means unknown: do not attempt removal.
    pub fn lookup(&self, user_id: &str) -> Option<&str> {
        self.by_user.get(user_id).map(String::as_str)
    }

    pub fn is_removable(&self, user_id: &str) -> bool {
        self.by_user.contains_key(user_id)
    }

    /// Drop the entry after the association was deleted.
    pub fn forget(&mut self, user_id: &str) {
        self.by_user.remove(user_id);
    }

    /// Clear everything. Must run before recording anything for a new store.
    pub fn reset(&mut self) {
        self.by_user.clear();
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_before_record() {
        let cache = AssociationCache::new();
        assert_eq!(cache.lookup("userA"), None);
        assert!(!cache.is_removable("userA"));
    }

    #[test]
    fn lookup_returns_last_recorded_id() {
        let mut cache = AssociationCache::new();
        cache.record("userA", "assoc1");
        assert_eq!(cache.lookup("userA"), Some("assoc1"));

        cache.record("userA", "assoc2");
        assert_eq!(cache.lookup("userA"), Some("assoc2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn forget_only_touches_one_user() {
        let mut cache = AssociationCache::new();
        cache.record("userA", "assoc1");
        cache.record("userB", "assoc2");

        cache.forget("userA");
        assert_eq!(cache.lookup("userA"), None);
        assert_eq!(cache.lookup("userB"), Some("assoc2"));

        // forgetting twice is harmless
        cache.forget("userA");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reset_clears_all_entries() {
        let mut cache = AssociationCache::new();
        cache.record("userA", "assoc1");
        cache.record("userB", "assoc2");

        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.lookup("userB"), None);
    }
}
