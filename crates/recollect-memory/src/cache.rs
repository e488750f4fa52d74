//! Per-user hot cache.
//!
//! A small in-process map from user id to the handful of memories each
//! manager reads on every recall, so reflexive recall does not hit SQLite.
//! Each manager owns one [`HotCache`]; the manager decides when to refill
//! or invalidate it.
//!
//! # Example
//!
//! ```rust
//! use recollect_memory::cache::HotCache;
//! use recollect_types::MemoryItem;
//!
//! let mut cache = HotCache::new(2);
//! let items: Vec<_> = (0..3)
//!     .map(|i| MemoryItem::ephemeral("alice", format!("m{i}"), vec![1.0]))
//!     .collect();
//!
//! cache.put("alice", items);
//! assert_eq!(cache.get("alice", 2).unwrap().len(), 2);
//! assert!(cache.get("alice", 3).is_none()); // never holds more than capacity
//! ```

use std::collections::HashMap;

use recollect_types::MemoryItem;

/// Bounded per-user list cache.
#[derive(Debug, Clone)]
pub struct HotCache {
    capacity: usize,
    entries: HashMap<String, Vec<MemoryItem>>,
}

impl HotCache {
    /// Create a cache that keeps at most `capacity` items per user.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The first `limit` cached items of `user_id`, or `None` when the entry
    /// is missing or holds fewer than `limit` items.
    pub fn get(&self, user_id: &str, limit: usize) -> Option<Vec<MemoryItem>> {
        let cached = self.entries.get(user_id)?;
        if cached.len() >= limit {
            Some(cached[..limit].to_vec())
        } else {
            None
        }
    }

    /// Everything cached for `user_id`, possibly empty.
    pub fn peek(&self, user_id: &str) -> &[MemoryItem] {
        self.entries.get(user_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the entry of `user_id`, keeping only the first `capacity` items.
    pub fn put(&mut self, user_id: &str, mut items: Vec<MemoryItem>) {
        items.truncate(self.capacity);
        self.entries.insert(user_id.to_string(), items);
    }

    /// Drop the entry of `user_id`.
    pub fn invalidate(&mut self, user_id: &str) {
        self.entries.remove(user_id);
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    /// Number of users with a cached entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(user: &str, n: usize) -> Vec<MemoryItem> {
        (0..n)
            .map(|i| MemoryItem::ephemeral(user, format!("memory {i}"), vec![1.0, 0.0]))
            .collect()
    }

    #[test]
    fn put_truncates_to_capacity() {
        let mut cache = HotCache::new(3);
        cache.put("alice", items("alice", 5));
        assert_eq!(cache.peek("alice").len(), 3);
        assert_eq!(cache.peek("alice")[0].content, "memory 0");
    }

    #[test]
    fn get_misses_when_entry_is_too_short() {
        let mut cache = HotCache::new(5);
        cache.put("alice", items("alice", 2));
        assert!(cache.get("alice", 3).is_none());
        assert_eq!(cache.get("alice", 2).unwrap().len(), 2);
        assert_eq!(cache.get("alice", 1).unwrap().len(), 1);
    }

    #[test]
    fn get_misses_for_unknown_user() {
        let cache = HotCache::new(5);
        assert!(cache.get("ghost", 0).is_none());
        assert!(cache.peek("ghost").is_empty());
    }

    #[test]
    fn invalidate_drops_only_that_user() {
        let mut cache = HotCache::new(5);
        cache.put("alice", items("alice", 1));
        cache.put("bob", items("bob", 1));
        cache.invalidate("alice");
        assert!(!cache.contains("alice"));
        assert!(cache.contains("bob"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = HotCache::new(5);
        cache.put("alice", items("alice", 1));
        cache.put("bob", items("bob", 1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn empty_entry_satisfies_zero_limit() {
        let mut cache = HotCache::new(5);
        cache.put("alice", Vec::new());
        assert_eq!(cache.get("alice", 0).unwrap().len(), 0);
    }
}
