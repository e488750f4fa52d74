//! Memory system facade.
//!
//! [`MemorySystem`] is the only type an agent needs: it owns the store, both
//! tier managers and the retriever, and exposes the read path (reflexive
//! and deep recall, rendered as prompt-ready text) and the write path
//! (summarize, promote on overflow, then maintenance).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use recollect_memory::{MemoryConfig, MemorySystem, PolicyProvider};
//! use recollect_types::ConversationState;
//!
//! fn run(policy: Arc<dyn PolicyProvider>) {
//!     let mut memory = MemorySystem::open(MemoryConfig::default(), policy).unwrap();
//!     let turns = vec![ConversationState::user("I just adopted a cat named Miso.")];
//!     memory.update_memory(&turns, "alice");
//!     println!("{}", memory.get_relevant_memories("how is my cat?", "alice"));
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use recollect_types::{ConversationState, MemoryStats};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::long_term::LongTermMemoryManager;
use crate::policy::PolicyProvider;
use crate::retrieval::{MemoryRetriever, ScoredMemory};
use crate::short_term::ShortTermMemoryManager;
use crate::store::{MemoryStore, StoreError};

/// Reply to a deep recall issued without a topic.
pub const EMPTY_QUERY_MESSAGE: &str = "Please provide a topic or question to recall.";
/// Reply to a deep recall that matched nothing.
pub const NO_MEMORIES_MESSAGE: &str = "No related memories found.";

/// What one [`MemorySystem::update_memory`] call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Id of the short-term memory created from the batch, if any.
    pub created: Option<Uuid>,
    /// Short-term memories promoted (and removed) to make room.
    pub promoted: usize,
    /// Long-term facts saved by those promotions.
    pub facts_saved: usize,
    /// Expired memories swept during maintenance.
    pub expired: usize,
}

pub struct MemorySystem {
    store: Arc<MemoryStore>,
    short_term: ShortTermMemoryManager,
    long_term: LongTermMemoryManager,
    retriever: MemoryRetriever,
}

impl MemorySystem {
    /// Assemble the engine over an existing store.
    pub fn new(config: MemoryConfig, store: Arc<MemoryStore>, policy: Arc<dyn PolicyProvider>) -> Self {
        let config = config.validated();
        Self {
            short_term: ShortTermMemoryManager::new(config.clone(), store.clone(), policy.clone()),
            long_term: LongTermMemoryManager::new(config.clone(), store.clone(), policy.clone()),
            retriever: MemoryRetriever::new(config, policy),
            store,
        }
    }

    /// Open the store at `config.db_path` (in-memory when unset) and
    /// assemble the engine over it.
    pub fn open(config: MemoryConfig, policy: Arc<dyn PolicyProvider>) -> Result<Self, StoreError> {
        let store = match config.db_path.as_deref() {
            Some(path) => MemoryStore::open(path)?,
            None => MemoryStore::open_in_memory()?,
        };
        Ok(Self::new(config, Arc::new(store), policy))
    }

    // ── read path ────────────────────────────────────────────────────────────

    /// Reflexive recall for `input`, rendered for insertion into a prompt.
    ///
    /// Returns an empty string for blank input or when nothing is relevant.
    /// Long-term memories that are returned are reinforced.
    pub fn get_relevant_memories(&mut self, input: &str, user_id: &str) -> String {
        if input.trim().is_empty() {
            return String::new();
        }
        let hits = self.retriever.reflexive_recall(
            input,
            user_id,
            &mut self.short_term,
            &mut self.long_term,
        );
        format_for_context(&hits, Utc::now())
    }

    /// Exhaustive recall over every long-term memory, rendered for display.
    pub fn deep_recall(&mut self, input: &str, user_id: &str) -> String {
        if input.trim().is_empty() {
            return EMPTY_QUERY_MESSAGE.to_string();
        }
        let hits = self
            .retriever
            .deep_thought(input, user_id, &mut self.short_term, &self.long_term);
        if hits.is_empty() {
            return NO_MEMORIES_MESSAGE.to_string();
        }
        format_for_display(&hits, Utc::now())
    }

    // ── write path ───────────────────────────────────────────────────────────

    /// Feed a batch of conversation turns into the engine.
    ///
    /// When the batch produces a short-term memory, the oldest short-term
    /// memories are promoted until the user is back within
    /// `short_term_max_count`, then long-term HP decays and expired
    /// memories are swept. Each promoted source is deleted whether or not
    /// any fact was saved from it.
    pub fn update_memory(&mut self, states: &[ConversationState], user_id: &str) -> UpdateReport {
        let mut report = UpdateReport::default();
        let Some(created) = self.short_term.process_states(states, user_id) else {
            return report;
        };
        report.created = Some(created.id);

        let pending = self.short_term.overflow(user_id);
        for _ in 0..pending {
            let Some(oldest) = self.short_term.oldest(user_id) else {
                break;
            };
            let facts = self.long_term.promote(&oldest);
            self.short_term.delete(&oldest.id, user_id);
            info!(
                user_id,
                memory_id = %oldest.id,
                facts = facts.len(),
                "short-term memory promoted"
            );
            report.promoted += 1;
            report.facts_saved += facts.len();
        }

        report.expired = self.maintain(user_id);
        report
    }

    fn maintain(&mut self, user_id: &str) -> usize {
        self.long_term.decay_all(user_id);
        let expired = self.long_term.cleanup_expired();
        self.short_term.invalidate_all();
        expired
    }

    // ── management ───────────────────────────────────────────────────────────

    /// Count and average HP of both tiers. Degrades to zeroes on failure.
    pub fn get_stats(&self, user_id: &str) -> MemoryStats {
        self.store.tier_stats(user_id).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "failed to compute memory stats");
            MemoryStats::default()
        })
    }

    /// Forget everything about `user_id`, in both tiers and both caches.
    pub fn clear_user_memories(&mut self, user_id: &str) {
        self.short_term.clear_user(user_id);
        self.long_term.clear_user(user_id);
        info!(user_id, "all memories cleared");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Coarse relative age of `timestamp`, e.g. `"3 days ago"` or `"just now"`.
pub fn format_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - timestamp;
    if age.num_days() > 0 {
        plural(age.num_days(), "day")
    } else if age.num_hours() > 0 {
        plural(age.num_hours(), "hour")
    } else if age.num_minutes() > 0 {
        plural(age.num_minutes(), "minute")
    } else {
        "just now".to_string()
    }
}

fn format_for_context(hits: &[ScoredMemory], now: DateTime<Utc>) -> String {
    if hits.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "Memory {} ({}, {}): {}",
                i + 1,
                hit.item.tier.label(),
                format_age(hit.item.timestamp, now),
                hit.item.content
            )
        })
        .collect();
    format!("<relevant_memories>\n{}\n</relevant_memories>", lines.join("\n"))
}

fn format_for_display(hits: &[ScoredMemory], now: DateTime<Utc>) -> String {
    let entries: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut header = format!(
                "{}. [{}] {}",
                i + 1,
                hit.item.tier.label(),
                format_age(hit.item.timestamp, now)
            );
            if hit.item.tier.is_long_term() {
                header.push_str(&format!(" HP:{}", hit.item.hp()));
            }
            format!("{header}\n{}\n", hit.item.content)
        })
        .collect();
    format!("Found the following related memories:\n\n{}", entries.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPolicy;
    use chrono::Duration;
    use recollect_types::{MemoryItem, Tier};

    fn system(policy: ScriptedPolicy, config: MemoryConfig) -> (MemorySystem, Arc<MemoryStore>, Arc<ScriptedPolicy>) {
        let store = Arc::new(MemoryStore::open_in_memory().unwrap());
        let policy = Arc::new(policy);
        let sys = MemorySystem::new(config, store.clone(), policy.clone());
        (sys, store, policy)
    }

    fn config(max: usize) -> MemoryConfig {
        MemoryConfig {
            states_token_threshold: 10,
            short_term_max_count: max,
            ..MemoryConfig::default()
        }
    }

    fn turns() -> Vec<ConversationState> {
        vec![
            ConversationState::user("I adopted a cat named Miso."),
            ConversationState::assistant("Congratulations! How old is Miso?"),
        ]
    }

    fn put(store: &MemoryStore, user: &str, content: &str, hp: i64) -> MemoryItem {
        let mut item = MemoryItem::ephemeral(user, content, vec![1.0, 0.0]);
        item.tier = Tier::from_hp(hp);
        store.save(&item).unwrap();
        item
    }

    // ── update_memory ────────────────────────────────────────────────────────

    #[test]
    fn small_batch_changes_nothing() {
        let (mut sys, store, policy) = system(ScriptedPolicy::new().with_size(5), config(10));
        let report = sys.update_memory(&turns(), "alice");
        assert_eq!(report, UpdateReport::default());
        assert_eq!(store.count_short_term("alice").unwrap(), 0);
        assert_eq!(policy.summarize_calls(), 0);
    }

    #[test]
    fn empty_batch_changes_nothing() {
        let (mut sys, store, _) = system(ScriptedPolicy::new().with_size(500), config(10));
        assert!(sys.update_memory(&[], "alice").created.is_none());
        assert_eq!(store.count_short_term("alice").unwrap(), 0);
    }

    #[test]
    fn overflow_promotes_oldest_into_facts() {
        let policy = ScriptedPolicy::new()
            .with_size(500)
            .with_facts(&[("Alice has a cat named Miso", 8), ("Alice likes cats", 6)]);
        let (mut sys, store, policy) = system(policy, config(2));

        let first = sys.update_memory(&turns(), "alice").created.unwrap();
        sys.update_memory(&turns(), "alice");
        assert_eq!(policy.extract_calls(), 0);

        let report = sys.update_memory(&turns(), "alice");
        assert_eq!(report.promoted, 1);
        assert_eq!(report.facts_saved, 2);
        assert_eq!(store.count_short_term("alice").unwrap(), 2);
        assert_eq!(store.count_long_term("alice").unwrap(), 2);
        assert!(store.get(&first).unwrap().is_none());
        assert_eq!(policy.extract_calls(), 1);
    }

    #[test]
    fn zero_capacity_promotes_every_new_memory() {
        let policy = ScriptedPolicy::new().with_size(500).with_facts(&[("fact", 5)]);
        let (mut sys, store, _) = system(policy, config(0));

        for _ in 0..3 {
            let report = sys.update_memory(&turns(), "alice");
            assert_eq!(report.promoted, 1);
            assert_eq!(store.count_short_term("alice").unwrap(), 0);
        }
        assert_eq!(store.count_long_term("alice").unwrap(), 3);
    }

    #[test]
    fn failed_extraction_still_removes_the_source() {
        let policy = ScriptedPolicy::new().with_size(500).failing_extract();
        let (mut sys, store, _) = system(policy, config(1));

        sys.update_memory(&turns(), "alice");
        let report = sys.update_memory(&turns(), "alice");
        assert_eq!(report.promoted, 1);
        assert_eq!(report.facts_saved, 0);
        assert_eq!(store.count_short_term("alice").unwrap(), 1);
        assert_eq!(store.count_long_term("alice").unwrap(), 0);
    }

    #[test]
    fn maintenance_decays_and_sweeps_after_a_write() {
        let (mut sys, store, _) = system(ScriptedPolicy::new().with_size(500), config(10));
        let strong = put(&store, "alice", "strong", 10);
        let dead = put(&store, "bob", "dead", 0);

        let report = sys.update_memory(&turns(), "alice");
        assert_eq!(report.expired, 1);
        assert_eq!(store.get(&strong.id).unwrap().unwrap().hp(), 9);
        assert!(store.get(&dead.id).unwrap().is_none());
    }

    #[test]
    fn short_term_count_never_exceeds_maximum() {
        let policy = ScriptedPolicy::new().with_size(500).with_facts(&[("fact", 3)]);
        let (mut sys, store, _) = system(policy, config(3));
        for _ in 0..7 {
            sys.update_memory(&turns(), "alice");
            assert!(store.count_short_term("alice").unwrap() <= 3);
        }
    }

    // ── recall ───────────────────────────────────────────────────────────────

    #[test]
    fn blank_input_recalls_nothing() {
        let (mut sys, store, _) = system(ScriptedPolicy::new(), MemoryConfig::default());
        put(&store, "alice", "fact", 5);
        assert_eq!(sys.get_relevant_memories("   ", "alice"), "");
        assert_eq!(sys.deep_recall("", "alice"), EMPTY_QUERY_MESSAGE);
    }

    #[test]
    fn relevant_memories_are_wrapped_for_the_prompt() {
        let (mut sys, store, _) = system(ScriptedPolicy::new(), MemoryConfig::default());
        let fact = put(&store, "alice", "Alice has a cat named Miso", 5);

        let context = sys.get_relevant_memories("cat Miso", "alice");
        assert!(context.starts_with("<relevant_memories>\n"));
        assert!(context.ends_with("\n</relevant_memories>"));
        assert!(context.contains("Memory 1 (long-term, just now): Alice has a cat named Miso"));
        assert_eq!(store.get(&fact.id).unwrap().unwrap().hp(), 10);
    }

    #[test]
    fn unknown_user_gets_empty_context() {
        let (mut sys, _, _) = system(ScriptedPolicy::new(), MemoryConfig::default());
        assert_eq!(sys.get_relevant_memories("hello", "nobody"), "");
        assert_eq!(sys.deep_recall("hello", "nobody"), NO_MEMORIES_MESSAGE);
    }

    #[test]
    fn deep_recall_lists_hp_for_long_term_only() {
        let (mut sys, store, _) = system(ScriptedPolicy::new(), MemoryConfig::default());
        let fact = put(&store, "alice", "Alice has a cat", 7);
        put(&store, "alice", "We talked about pets", 1);

        let text = sys.deep_recall("cat pets", "alice");
        assert!(text.starts_with("Found the following related memories:"));
        assert!(text.contains("[long-term] just now HP:7\nAlice has a cat"));
        assert!(text.contains("[short-term] just now\nWe talked about pets"));
        assert_eq!(store.get(&fact.id).unwrap().unwrap().hp(), 7);
    }

    // ── management ───────────────────────────────────────────────────────────

    #[test]
    fn stats_report_both_tiers() {
        let (sys, store, _) = system(ScriptedPolicy::new(), MemoryConfig::default());
        put(&store, "alice", "summary", 1);
        put(&store, "alice", "fact a", 4);
        put(&store, "alice", "fact b", 8);

        let stats = sys.get_stats("alice");
        assert_eq!(stats.short_term.count, 1);
        assert!((stats.short_term.avg_hp - 1.0).abs() < 1e-9);
        assert_eq!(stats.long_term.count, 2);
        assert!((stats.long_term.avg_hp - 6.0).abs() < 1e-9);
        assert_eq!(sys.get_stats("nobody"), MemoryStats::default());
    }

    #[test]
    fn clearing_a_user_leaves_others_alone() {
        let (mut sys, store, _) = system(ScriptedPolicy::new(), MemoryConfig::default());
        put(&store, "alice", "summary", 1);
        put(&store, "alice", "fact", 4);
        put(&store, "bob", "bob fact", 4);
        sys.get_relevant_memories("fact", "alice");

        sys.clear_user_memories("alice");
        assert_eq!(sys.get_stats("alice"), MemoryStats::default());
        assert_eq!(store.count_long_term("bob").unwrap(), 1);
        assert_eq!(sys.get_relevant_memories("fact", "alice"), "");
    }

    // ── rendering ────────────────────────────────────────────────────────────

    #[test]
    fn age_uses_the_coarsest_unit() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(20), now), "just now");
        assert_eq!(format_age(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(format_age(now - Duration::minutes(59), now), "59 minutes ago");
        assert_eq!(format_age(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(format_age(now - Duration::days(3), now), "3 days ago");
    }
}
