//! Tuning knobs for the memory lifecycle.
//!
//! Every field is numeric; the engine branches only on these thresholds.
//! The struct deserializes from a `[memory]` TOML table with per-field
//! defaults, so a partial table is valid.

use serde::{Deserialize, Serialize};

/// Thresholds, capacities and weights of the memory engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Estimated size a conversation batch must reach before it is summarized.
    #[serde(default = "default_states_token_threshold")]
    pub states_token_threshold: usize,
    /// Maximum number of short-term memories kept per user.
    #[serde(default = "default_short_term_max_count")]
    pub short_term_max_count: usize,
    #[serde(default = "default_short_term_hot_cache_size")]
    pub short_term_hot_cache_size: usize,
    #[serde(default = "default_long_term_hot_cache_size")]
    pub long_term_hot_cache_size: usize,
    /// HP added to a long-term memory each time reflexive recall uses it.
    #[serde(default = "default_hp_boost_on_access")]
    pub hp_boost_on_access: u32,
    /// Fraction of HP lost by every long-term memory on each maintenance pass.
    #[serde(default = "default_hp_decay_rate")]
    pub hp_decay_rate: f64,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    #[serde(default = "default_max_memories_in_context")]
    pub max_memories_in_context: usize,
    #[serde(default = "default_deep_search_limit")]
    pub deep_search_limit: usize,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    /// SQLite database path. `None` keeps everything in memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

fn default_states_token_threshold() -> usize {
    80_000
}
fn default_short_term_max_count() -> usize {
    10
}
fn default_short_term_hot_cache_size() -> usize {
    5
}
fn default_long_term_hot_cache_size() -> usize {
    10
}
fn default_hp_boost_on_access() -> u32 {
    5
}
fn default_hp_decay_rate() -> f64 {
    0.1
}
fn default_relevance_threshold() -> f32 {
    0.6
}
fn default_max_memories_in_context() -> usize {
    3
}
fn default_deep_search_limit() -> usize {
    20
}
fn default_keyword_weight() -> f32 {
    0.5
}
fn default_vector_weight() -> f32 {
    0.5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            states_token_threshold: default_states_token_threshold(),
            short_term_max_count: default_short_term_max_count(),
            short_term_hot_cache_size: default_short_term_hot_cache_size(),
            long_term_hot_cache_size: default_long_term_hot_cache_size(),
            hp_boost_on_access: default_hp_boost_on_access(),
            hp_decay_rate: default_hp_decay_rate(),
            relevance_threshold: default_relevance_threshold(),
            max_memories_in_context: default_max_memories_in_context(),
            deep_search_limit: default_deep_search_limit(),
            keyword_weight: default_keyword_weight(),
            vector_weight: default_vector_weight(),
            db_path: None,
        }
    }
}

impl MemoryConfig {
    /// Return a copy with out-of-range values pulled back into range.
    ///
    /// The decay rate is clamped to `[0, 1]`, the relevance threshold to
    /// `[0, 1]`, and negative or non-finite weights become `0`.
    pub fn validated(mut self) -> Self {
        self.hp_decay_rate = if self.hp_decay_rate.is_finite() {
            self.hp_decay_rate.clamp(0.0, 1.0)
        } else {
            default_hp_decay_rate()
        };
        self.relevance_threshold = if self.relevance_threshold.is_finite() {
            self.relevance_threshold.clamp(0.0, 1.0)
        } else {
            default_relevance_threshold()
        };
        self.keyword_weight = non_negative(self.keyword_weight);
        self.vector_weight = non_negative(self.vector_weight);
        self
    }
}

fn non_negative(w: f32) -> f32 {
    if w.is_finite() && w > 0.0 { w } else { 0.0 }
}
