//! Hybrid memory retrieval.
//!
//! Every candidate is scored as
//!
//! ```text
//! score = keyword_weight * keyword_overlap(query, content)
//!       + vector_weight  * (cosine(embed(query), embedding) + 1) / 2
//! ```
//!
//! so both components live in `[0, 1]`. Two recall modes share the scorer:
//!
//! * [`reflexive_recall`][MemoryRetriever::reflexive_recall] looks only at
//!   the hot caches and reinforces every long-term hit.
//! * [`deep_thought`][MemoryRetriever::deep_thought] scans every long-term
//!   memory of the user and leaves HP untouched.

use std::collections::HashSet;
use std::sync::Arc;

use recollect_types::MemoryItem;
use tracing::{debug, warn};

use crate::config::MemoryConfig;
use crate::long_term::LongTermMemoryManager;
use crate::policy::PolicyProvider;
use crate::short_term::ShortTermMemoryManager;

// ─────────────────────────────────────────────────────────────────────────────
// Scoring primitives
// ─────────────────────────────────────────────────────────────────────────────

/// Compute the cosine similarity between two equal-length vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` if either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Cosine similarity rescaled to `[0, 1]`.
///
/// Empty, zero-norm or dimension-mismatched vectors score `0.0`.
pub fn vector_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let has_norm = |v: &[f32]| v.iter().any(|x| *x != 0.0);
    if !has_norm(a) || !has_norm(b) {
        return 0.0;
    }
    ((cosine_similarity(a, b) + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn is_cjk_ideograph(c: char) -> bool {
    matches!(
        c,
        '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2A6DF}'
    )
}

/// Split `text` into lowercase alphanumeric runs. Each CJK ideograph is a
/// token of its own, since those scripts do not separate words by spaces.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if is_cjk_ideograph(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Fraction of the distinct query tokens that also appear in `content`.
pub fn keyword_overlap(query: &str, content: &str) -> f32 {
    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let content_tokens: HashSet<String> = tokenize(content).into_iter().collect();
    let hits = query_tokens
        .iter()
        .filter(|t| content_tokens.contains(*t))
        .count();
    hits as f32 / query_tokens.len() as f32
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryRetriever
// ─────────────────────────────────────────────────────────────────────────────

/// A recalled memory with the score that selected it.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub item: MemoryItem,
    pub score: f32,
}

pub struct MemoryRetriever {
    config: MemoryConfig,
    policy: Arc<dyn PolicyProvider>,
}

impl MemoryRetriever {
    pub fn new(config: MemoryConfig, policy: Arc<dyn PolicyProvider>) -> Self {
        Self { config, policy }
    }

    /// Hybrid score of `item` against `query`. `query_embedding` is `None`
    /// when the query could not be embedded; only keywords count then.
    pub fn score(&self, query: &str, query_embedding: Option<&[f32]>, item: &MemoryItem) -> f32 {
        let keyword = keyword_overlap(query, &item.content);
        let vector = query_embedding
            .map(|q| vector_similarity(q, &item.embedding))
            .unwrap_or(0.0);
        self.config.keyword_weight * keyword + self.config.vector_weight * vector
    }

    /// Fast recall over the cached recent short-term and top long-term
    /// memories. Every long-term hit is boosted; the returned items carry
    /// the boosted HP.
    pub fn reflexive_recall(
        &self,
        query: &str,
        user_id: &str,
        short_term: &mut ShortTermMemoryManager,
        long_term: &mut LongTermMemoryManager,
    ) -> Vec<ScoredMemory> {
        let mut candidates = short_term.recent(user_id);
        candidates.extend(long_term.top(user_id));

        let mut hits = self.rank(query, user_id, candidates, self.config.max_memories_in_context);
        for hit in hits.iter_mut().filter(|h| h.item.tier.is_long_term()) {
            long_term.boost(&mut hit.item);
        }
        debug!(user_id, hits = hits.len(), "reflexive recall");
        hits
    }

    /// Exhaustive recall over every long-term memory plus the cached
    /// short-term ones. HP is left untouched.
    pub fn deep_thought(
        &self,
        query: &str,
        user_id: &str,
        short_term: &mut ShortTermMemoryManager,
        long_term: &LongTermMemoryManager,
    ) -> Vec<ScoredMemory> {
        let mut candidates = long_term.all_memories(user_id);
        candidates.extend(short_term.recent(user_id));

        let hits = self.rank(query, user_id, candidates, self.config.deep_search_limit);
        debug!(user_id, hits = hits.len(), "deep recall");
        hits
    }

    fn rank(
        &self,
        query: &str,
        user_id: &str,
        candidates: Vec<MemoryItem>,
        limit: usize,
    ) -> Vec<ScoredMemory> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let query_embedding = match self.policy.embed(query) {
            Ok(e) if !e.is_empty() => Some(e),
            Ok(_) => None,
            Err(e) => {
                warn!(user_id, error = %e, "query embedding failed; scoring by keywords only");
                None
            }
        };

        let mut seen = HashSet::new();
        let mut hits: Vec<ScoredMemory> = candidates
            .into_iter()
            .filter(|item| seen.insert(item.id))
            .map(|item| {
                let score = self.score(query, query_embedding.as_deref(), &item);
                ScoredMemory { item, score }
            })
            .filter(|s| s.score >= self.config.relevance_threshold)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}
