//! Scripted [`PolicyProvider`] used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use recollect_types::ConversationState;

use crate::policy::{FactCandidate, PolicyError, PolicyProvider};

pub(crate) struct ScriptedPolicy {
    size: usize,
    summary: Option<String>,
    facts: Vec<FactCandidate>,
    fail_extract: bool,
    embeddings: HashMap<String, Vec<f32>>,
    default_embedding: Vec<f32>,
    summarize_calls: AtomicUsize,
    extract_calls: AtomicUsize,
}

impl ScriptedPolicy {
    pub(crate) fn new() -> Self {
        Self {
            size: 0,
            summary: Some("summary".to_string()),
            facts: Vec::new(),
            fail_extract: false,
            embeddings: HashMap::new(),
            default_embedding: vec![1.0, 0.0],
            summarize_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub(crate) fn with_summary(mut self, summary: Option<&str>) -> Self {
        self.summary = summary.map(str::to_string);
        self
    }

    pub(crate) fn with_facts(mut self, facts: &[(&str, u32)]) -> Self {
        self.facts = facts
            .iter()
            .map(|(content, hp)| FactCandidate::new(*content, *hp))
            .collect();
        self
    }

    pub(crate) fn failing_extract(mut self) -> Self {
        self.fail_extract = true;
        self
    }

    pub(crate) fn with_embedding(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.embeddings.insert(text.to_string(), embedding);
        self
    }

    pub(crate) fn with_default_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.default_embedding = embedding;
        self
    }

    pub(crate) fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

impl PolicyProvider for ScriptedPolicy {
    fn embed(&self, text: &str) -> Result<Vec<f32>, PolicyError> {
        let embedding = self
            .embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default_embedding.clone());
        if embedding.is_empty() {
            Err(PolicyError::Unusable("empty embedding".into()))
        } else {
            Ok(embedding)
        }
    }

    fn summarize(&self, _states: &[ConversationState]) -> Result<String, PolicyError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.summary
            .clone()
            .ok_or_else(|| PolicyError::Provider("model offline".into()))
    }

    fn extract_facts(&self, _content: &str) -> Result<Vec<FactCandidate>, PolicyError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_extract {
            return Err(PolicyError::Provider("model offline".into()));
        }
        Ok(self.facts.clone())
    }

    fn estimate_size(&self, _states: &[ConversationState]) -> usize {
        self.size
    }
}
