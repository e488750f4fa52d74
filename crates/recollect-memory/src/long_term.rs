//! Long-term memory manager.
//!
//! Owns the three policies that shape durable memory:
//!
//! * **Promotion** – a short-term summary is replaced by zero or more
//!   extracted facts, each with its own initial HP.
//! * **Reinforcement** – a fact that proves useful in recall gains
//!   `hp_boost_on_access` HP.
//! * **Forgetting** – every maintenance pass multiplies HP by
//!   `1 - hp_decay_rate`; facts that reach zero are swept by
//!   [`cleanup_expired`][LongTermMemoryManager::cleanup_expired].
//!
//! The strongest facts per user are kept in a [`HotCache`].

use std::sync::Arc;

use recollect_types::{MemoryItem, Tier};
use tracing::{debug, info, warn};

use crate::cache::HotCache;
use crate::config::MemoryConfig;
use crate::policy::PolicyProvider;
use crate::store::MemoryStore;

pub struct LongTermMemoryManager {
    config: MemoryConfig,
    store: Arc<MemoryStore>,
    policy: Arc<dyn PolicyProvider>,
    cache: HotCache,
}

impl LongTermMemoryManager {
    /// Create a manager with a cache sized by `long_term_hot_cache_size`.
    pub fn new(
        config: MemoryConfig,
        store: Arc<MemoryStore>,
        policy: Arc<dyn PolicyProvider>,
    ) -> Self {
        let cache = HotCache::new(config.long_term_hot_cache_size);
        Self::with_cache(config, store, policy, cache)
    }

    /// Create a manager around an existing cache.
    pub fn with_cache(
        config: MemoryConfig,
        store: Arc<MemoryStore>,
        policy: Arc<dyn PolicyProvider>,
        cache: HotCache,
    ) -> Self {
        Self {
            config,
            store,
            policy,
            cache,
        }
    }

    pub fn cache(&self) -> &HotCache {
        &self.cache
    }

    /// Extract durable facts from `short_item` and store each as a new
    /// long-term memory.
    ///
    /// Facts reuse the source embedding and timestamp. Returns the facts
    /// that were saved; an empty list when extraction found nothing or
    /// failed. The source item is left for the caller to delete.
    pub fn promote(&mut self, short_item: &MemoryItem) -> Vec<MemoryItem> {
        let user_id = short_item.user_id.as_str();
        let candidates = match self.policy.extract_facts(&short_item.content) {
            Ok(c) => c,
            Err(e) => {
                warn!(user_id, memory_id = %short_item.id, error = %e, "fact extraction failed");
                return Vec::new();
            }
        };
        if candidates.is_empty() {
            debug!(user_id, memory_id = %short_item.id, "no durable facts extracted");
            return Vec::new();
        }

        let mut saved = Vec::new();
        for candidate in candidates {
            let content = candidate.content.trim();
            if content.is_empty() {
                continue;
            }
            let fact = MemoryItem::derived(short_item, content, candidate.importance);
            match self.store.save(&fact) {
                Ok(()) => {
                    info!(user_id, memory_id = %fact.id, hp = fact.hp(), "long-term memory saved");
                    saved.push(fact);
                }
                Err(e) => warn!(user_id, error = %e, "failed to save long-term memory"),
            }
        }

        if !saved.is_empty() {
            self.refresh_cache(user_id);
        }
        saved
    }

    /// The strongest `limit` long-term memories of `user_id`, cache first.
    pub fn top_memories(&mut self, user_id: &str, limit: usize) -> Vec<MemoryItem> {
        if let Some(cached) = self.cache.get(user_id, limit) {
            return cached;
        }
        match self.store.list_long_term(user_id, limit) {
            Ok(items) => {
                self.cache.put(user_id, items.clone());
                items
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to load long-term memories");
                Vec::new()
            }
        }
    }

    /// [`top_memories`][Self::top_memories] with the hot-cache size as limit.
    pub fn top(&mut self, user_id: &str) -> Vec<MemoryItem> {
        self.top_memories(user_id, self.config.long_term_hot_cache_size)
    }

    /// Every long-term memory of `user_id`, bypassing the cache.
    pub fn all_memories(&self, user_id: &str) -> Vec<MemoryItem> {
        self.store.list_all_long_term(user_id).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to load all long-term memories");
            Vec::new()
        })
    }

    /// Reinforce a long-term memory by `hp_boost_on_access`.
    ///
    /// `item` is updated in place to mirror the stored HP. Short-term items
    /// are never boosted. Returns whether the stored row changed.
    pub fn boost(&mut self, item: &mut MemoryItem) -> bool {
        if !item.tier.is_long_term() {
            return false;
        }
        let delta = self.config.hp_boost_on_access;
        match self.store.update_hp(&item.id, i64::from(delta)) {
            Ok(true) => {
                item.tier = Tier::from_hp(i64::from(item.hp()) + i64::from(delta));
                debug!(user_id = %item.user_id, memory_id = %item.id, hp = item.hp(), "memory boosted");
                self.refresh_cache(&item.user_id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(memory_id = %item.id, error = %e, "failed to boost memory");
                false
            }
        }
    }

    /// Apply one step of geometric decay to every long-term memory of
    /// `user_id`. Returns the number of memories decayed.
    pub fn decay_all(&mut self, user_id: &str) -> usize {
        let decayed = match self.store.decay_long_term(user_id, self.config.hp_decay_rate) {
            Ok(n) => n,
            Err(e) => {
                warn!(user_id, error = %e, "failed to decay long-term memories");
                0
            }
        };
        self.refresh_cache(user_id);
        decayed
    }

    /// Sweep every expired memory for every user, then drop all cached
    /// entries since they may reference deleted ids.
    pub fn cleanup_expired(&mut self) -> usize {
        let deleted = match self.store.cleanup_expired() {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to clean up expired memories");
                0
            }
        };
        self.cache.clear();
        if deleted > 0 {
            info!(deleted, "expired memories removed");
        }
        deleted
    }

    /// Delete every long-term memory of `user_id` and drop its cache entry.
    pub fn clear_user(&mut self, user_id: &str) {
        self.cache.invalidate(user_id);
        match self.store.delete_long_term(user_id) {
            Ok(n) => info!(user_id, deleted = n, "long-term memories cleared"),
            Err(e) => warn!(user_id, error = %e, "failed to clear long-term memories"),
        }
    }

    fn refresh_cache(&mut self, user_id: &str) {
        match self
            .store
            .list_long_term(user_id, self.config.long_term_hot_cache_size)
        {
            Ok(items) => self.cache.put(user_id, items),
            Err(e) => {
                warn!(user_id, error = %e, "failed to refresh long-term cache");
                self.cache.invalidate(user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPolicy;
    use chrono::{Duration, Utc};

    fn manager(policy: ScriptedPolicy, config: MemoryConfig) -> (LongTermMemoryManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let mgr = LongTermMemoryManager::new(config, store.clone(), Arc::new(policy));
        (mgr, store)
    }

    fn source(user: &str) -> MemoryItem {
        let mut item = MemoryItem::ephemeral(user, "Alice moved to Lisbon and adopted a cat.", vec![0.3, 0.7]);
        item.timestamp = Utc::now() - Duration::days(2);
        item
    }

    fn fact(store: &MemoryStore, user: &str, content: &str, hp: u32) -> MemoryItem {
        let mut item = MemoryItem::ephemeral(user, content, vec![0.0, 1.0]);
        item.tier = Tier::from_hp(i64::from(hp));
        store.save(&item).unwrap();
        item
    }

    // ── promote ──────────────────────────────────────────────────────────────

    #[test]
    fn promote_fans_out_into_facts_sharing_source_embedding() {
        let policy = ScriptedPolicy::new().with_facts(&[("Alice lives in Lisbon", 8), ("Alice has a cat", 4)]);
        let (mut mgr, store) = manager(policy, MemoryConfig::default());
        let short = source("alice");

        let facts = mgr.promote(&short);
        assert_eq!(facts.len(), 2);
        for f in &facts {
            assert_eq!(f.embedding, short.embedding);
            assert_eq!(f.timestamp, short.timestamp);
            assert_eq!(f.user_id, "alice");
            assert!(f.tier.is_long_term());
        }
        assert_eq!(store.count_long_term("alice").unwrap(), 2);
        assert_eq!(mgr.cache().peek("alice")[0].content, "Alice lives in Lisbon");
    }

    #[test]
    fn promote_with_no_facts_returns_empty() {
        let (mut mgr, store) = manager(ScriptedPolicy::new(), MemoryConfig::default());
        assert!(mgr.promote(&source("alice")).is_empty());
        assert_eq!(store.count_long_term("alice").unwrap(), 0);
    }

    #[test]
    fn promote_survives_extraction_failure() {
        let (mut mgr, store) = manager(ScriptedPolicy::new().failing_extract(), MemoryConfig::default());
        assert!(mgr.promote(&source("alice")).is_empty());
        assert_eq!(store.count_long_term("alice").unwrap(), 0);
    }

    #[test]
    fn promote_keeps_low_importance_facts_long_term() {
        let policy = ScriptedPolicy::new().with_facts(&[("minor detail", 1), ("", 9)]);
        let (mut mgr, store) = manager(policy, MemoryConfig::default());

        let facts = mgr.promote(&source("alice"));
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].hp(), 2);
        assert_eq!(store.count_short_term("alice").unwrap(), 0);
    }

    #[test]
    fn promote_does_not_delete_the_source() {
        let policy = ScriptedPolicy::new().with_facts(&[("fact", 5)]);
        let (mut mgr, store) = manager(policy, MemoryConfig::default());
        let short = source("alice");
        store.save(&short).unwrap();
        mgr.promote(&short);
        assert!(store.get(&short.id).unwrap().is_some());
    }

    // ── top / all ────────────────────────────────────────────────────────────

    #[test]
    fn top_memories_reads_through_the_cache() {
        let config = MemoryConfig {
            long_term_hot_cache_size: 2,
            ..MemoryConfig::default()
        };
        let (mut mgr, store) = manager(ScriptedPolicy::new(), config);
        fact(&store, "alice", "weak", 3);
        fact(&store, "alice", "strong", 9);
        fact(&store, "alice", "medium", 5);

        let top = mgr.top("alice");
        let contents: Vec<_> = top.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["strong", "medium"]);

        // A new row is invisible until the cache is refreshed.
        fact(&store, "alice", "strongest", 50);
        assert_eq!(mgr.top("alice")[0].content, "strong");
        assert_eq!(mgr.all_memories("alice")[0].content, "strongest");
    }

    // ── boost ────────────────────────────────────────────────────────────────

    #[test]
    fn boost_adds_configured_hp() {
        let config = MemoryConfig {
            hp_boost_on_access: 5,
            ..MemoryConfig::default()
        };
        let (mut mgr, store) = manager(ScriptedPolicy::new(), config);
        let mut item = fact(&store, "alice", "fact", 3);

        assert!(mgr.boost(&mut item));
        assert_eq!(item.hp(), 8);
        assert_eq!(store.get(&item.id).unwrap().unwrap().hp(), 8);
        assert_eq!(mgr.cache().peek("alice")[0].hp(), 8);
    }

    #[test]
    fn boost_ignores_short_term_items() {
        let (mut mgr, store) = manager(ScriptedPolicy::new(), MemoryConfig::default());
        let mut item = fact(&store, "alice", "summary", 1);
        assert!(!mgr.boost(&mut item));
        assert_eq!(store.get(&item.id).unwrap().unwrap().hp(), 1);
    }

    // ── decay / cleanup ──────────────────────────────────────────────────────

    #[test]
    fn decay_all_leaves_short_term_untouched() {
        let config = MemoryConfig {
            hp_decay_rate: 0.1,
            ..MemoryConfig::default()
        };
        let (mut mgr, store) = manager(ScriptedPolicy::new(), config);
        let strong = fact(&store, "alice", "fact", 10);
        let summary = fact(&store, "alice", "summary", 1);

        assert_eq!(mgr.decay_all("alice"), 1);
        assert_eq!(store.get(&strong.id).unwrap().unwrap().hp(), 9);
        assert_eq!(store.get(&summary.id).unwrap().unwrap().hp(), 1);
        assert_eq!(mgr.cache().peek("alice")[0].hp(), 9);
    }

    #[test]
    fn cleanup_removes_expired_and_clears_every_cache_entry() {
        let (mut mgr, store) = manager(ScriptedPolicy::new(), MemoryConfig::default());
        let dead = fact(&store, "alice", "dead", 0);
        let alive = fact(&store, "alice", "alive", 3);
        fact(&store, "bob", "bob fact", 4);
        mgr.top("alice");
        mgr.top("bob");

        assert_eq!(mgr.cleanup_expired(), 1);
        assert!(store.get(&dead.id).unwrap().is_none());
        assert!(store.get(&alive.id).unwrap().is_some());
        assert!(mgr.cache().is_empty());
    }

    #[test]
    fn clear_user_removes_only_long_term_of_that_user() {
        let (mut mgr, store) = manager(ScriptedPolicy::new(), MemoryConfig::default());
        fact(&store, "alice", "fact", 4);
        fact(&store, "alice", "summary", 1);
        fact(&store, "bob", "bob fact", 4);
        mgr.top("alice");

        mgr.clear_user("alice");
        assert_eq!(store.count_long_term("alice").unwrap(), 0);
        assert_eq!(store.count_short_term("alice").unwrap(), 1);
        assert_eq!(store.count_long_term("bob").unwrap(), 1);
        assert!(!mgr.cache().contains("alice"));
    }
}
