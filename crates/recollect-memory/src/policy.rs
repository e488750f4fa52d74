//! Policy provider interface.
//!
//! The engine never talks to a language model directly. Summaries, fact
//! extraction and embeddings come from a [`PolicyProvider`]; the engine only
//! decides *when* to ask and what to do with the answer.

use recollect_types::ConversationState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can arise from a policy provider call.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// The provider could not be reached or failed to answer.
    #[error("Policy provider call failed: {0}")]
    Provider(String),
    /// The provider answered, but with nothing the engine can use.
    #[error("Policy provider returned unusable output: {0}")]
    Unusable(String),
}

/// A durable fact proposed for promotion, with its initial HP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactCandidate {
    pub content: String,
    pub importance: u32,
}

impl FactCandidate {
    pub fn new(content: impl Into<String>, importance: u32) -> Self {
        Self {
            content: content.into(),
            importance,
        }
    }
}

/// Summarization, extraction and embedding policy consumed by the managers.
///
/// Calls are synchronous and may block on network I/O; wrap them with a
/// timeout in the implementation.
pub trait PolicyProvider: Send + Sync {
    /// Dense embedding of `text`.
    fn embed(&self, text: &str) -> Result<Vec<f32>, PolicyError>;

    /// Compress a batch of conversation turns into one summary.
    fn summarize(&self, states: &[ConversationState]) -> Result<String, PolicyError>;

    /// Durable facts worth keeping from a short-term summary. An empty list
    /// means nothing durable was found.
    fn extract_facts(&self, content: &str) -> Result<Vec<FactCandidate>, PolicyError>;

    /// Rough size of `states` in tokens, compared against the summarization
    /// threshold. Counts one token per character of each state's JSON form.
    fn estimate_size(&self, states: &[ConversationState]) -> usize {
        states
            .iter()
            .map(|s| {
                serde_json::to_string(s)
                    .map(|json| json.chars().count())
                    .unwrap_or_else(|_| s.content.chars().count())
            })
            .sum()
    }
}

/// Render `states` as one JSON object per line, the form handed to the
/// summarization prompt.
pub fn render_states(states: &[ConversationState]) -> String {
    states
        .iter()
        .map(|s| serde_json::to_string(s).unwrap_or_else(|_| s.content.clone()))
        .collect::<Vec<_>>()
        .join("\n")
}
