//! Short-term memory manager.
//!
//! Buffers nothing itself: the caller hands over a batch of conversation
//! turns, and once the batch is estimated to be large enough it is
//! summarized, embedded and stored as a single `hp = 1` memory. The newest
//! few summaries per user are kept in a [`HotCache`] for reflexive recall.

use std::sync::Arc;

use recollect_types::{ConversationState, MemoryItem};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::HotCache;
use crate::config::MemoryConfig;
use crate::error::EngineError;
use crate::policy::{PolicyError, PolicyProvider};
use crate::store::MemoryStore;

pub struct ShortTermMemoryManager {
    config: MemoryConfig,
    store: Arc<MemoryStore>,
    policy: Arc<dyn PolicyProvider>,
    cache: HotCache,
}

impl ShortTermMemoryManager {
    /// Create a manager with a cache sized by `short_term_hot_cache_size`.
    pub fn new(
        config: MemoryConfig,
        store: Arc<MemoryStore>,
        policy: Arc<dyn PolicyProvider>,
    ) -> Self {
        let cache = HotCache::new(config.short_term_hot_cache_size);
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

    /// Turn `states` into a short-term memory if the batch is dense enough.
    ///
    /// Returns `None` when the batch is below `states_token_threshold` (no
    /// row is written; the caller keeps the raw turns) or when summarizing,
    /// embedding or saving fails.
    pub fn process_states(
        &mut self,
        states: &[ConversationState],
        user_id: &str,
    ) -> Option<MemoryItem> {
        if states.is_empty() {
            return None;
        }

        let size = self.policy.estimate_size(states);
        if size < self.config.states_token_threshold {
            debug!(
                user_id,
                size,
                threshold = self.config.states_token_threshold,
                "conversation batch below summarization threshold"
            );
            return None;
        }

        match self.materialize(states, user_id) {
            Ok(item) => {
                info!(
                    user_id,
                    memory_id = %item.id,
                    turns = states.len(),
                    size,
                    "short-term memory created"
                );
                self.refresh_cache(user_id);
                Some(item)
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to create short-term memory");
                None
            }
        }
    }

    fn materialize(
        &self,
        states: &[ConversationState],
        user_id: &str,
    ) -> Result<MemoryItem, EngineError> {
        let summary = self.policy.summarize(states)?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(PolicyError::Unusable("empty summary".into()).into());
        }
        let embedding = self.policy.embed(summary)?;
        if embedding.is_empty() {
            return Err(PolicyError::Unusable("empty embedding".into()).into());
        }
        let item = MemoryItem::ephemeral(user_id, summary, embedding);
        self.store.save(&item)?;
        Ok(item)
    }

    /// The newest `limit` short-term memories of `user_id`.
    ///
    /// Served from the cache when it already holds `limit` items, otherwise
    /// reloaded from the store and the cache refilled.
    pub fn get_recent(&mut self, user_id: &str, limit: usize) -> Vec<MemoryItem> {
        if let Some(cached) = self.cache.get(user_id, limit) {
            return cached;
        }
        match self.store.list_short_term(user_id, limit) {
            Ok(items) => {
                self.cache.put(user_id, items.clone());
                items
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to load short-term memories");
                Vec::new()
            }
        }
    }

    /// [`get_recent`][Self::get_recent] with the hot-cache size as limit.
    pub fn recent(&mut self, user_id: &str) -> Vec<MemoryItem> {
        self.get_recent(user_id, self.config.short_term_hot_cache_size)
    }

    /// `true` when `user_id` holds more short-term memories than allowed.
    pub fn check_overflow(&self, user_id: &str) -> bool {
        self.overflow(user_id) > 0
    }

    /// How many short-term memories `user_id` holds above the limit.
    pub fn overflow(&self, user_id: &str) -> usize {
        match self.store.count_short_term(user_id) {
            Ok(count) => count.saturating_sub(self.config.short_term_max_count),
            Err(e) => {
                warn!(user_id, error = %e, "failed to count short-term memories");
                0
            }
        }
    }

    /// The oldest short-term memory of `user_id`, next in line for promotion.
    pub fn oldest(&self, user_id: &str) -> Option<MemoryItem> {
        self.store.oldest_short_term(user_id).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to load oldest short-term memory");
            None
        })
    }

    /// Delete a short-term memory and refresh the cache on success.
    pub fn delete(&mut self, id: &Uuid, user_id: &str) -> bool {
        match self.store.delete(id) {
            Ok(true) => {
                self.refresh_cache(user_id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(user_id, memory_id = %id, error = %e, "failed to delete short-term memory");
                false
            }
        }
    }

    /// Delete every short-term memory of `user_id` and drop its cache entry.
    pub fn clear_user(&mut self, user_id: &str) {
        self.cache.invalidate(user_id);
        match self.store.delete_short_term(user_id) {
            Ok(n) => info!(user_id, deleted = n, "short-term memories cleared"),
            Err(e) => warn!(user_id, error = %e, "failed to clear short-term memories"),
        }
    }

    /// Drop every cached entry; the next read reloads from the store.
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    fn refresh_cache(&mut self, user_id: &str) {
        match self
            .store
            .list_short_term(user_id, self.config.short_term_hot_cache_size)
        {
            Ok(items) => self.cache.put(user_id, items),
            Err(e) => {
                warn!(user_id, error = %e, "failed to refresh short-term cache");
                self.cache.invalidate(user_id);
            }
        }
    }
}
