//! [`LlmPolicy`] – the language-model–backed [`PolicyProvider`].
//!
//! Summaries and fact extraction are chat completions against the
//! configured model; embeddings come from the embedding model. Fact
//! extraction is constrained with a JSON schema generated from
//! [`ExtractedFacts`] so the reply can be parsed strictly.

use recollect_memory::policy::{FactCandidate, PolicyError, PolicyProvider, render_states};
use recollect_types::ConversationState;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm_driver::{ChatMessage, LlmDriver, LlmError};

// ─────────────────────────────────────────────────────────────────────────────
// Prompts
// ─────────────────────────────────────────────────────────────────────────────

pub const SUMMARIZE_PROMPT: &str = "\
You compress conversations into memory snapshots that are dense with information but still feel alive.
- Keep the main thread: the core facts, the chain of reasoning and the conclusions reached.
- Keep the anchors: specific names, places, metaphors, strong feelings and personal experiences the user shared.
- Write one coherent paragraph, as a note to your future self. No lists, no headings.
- Keep the user and the assistant distinct; never attribute one's words to the other.
Reply with the snapshot only.";

pub const EXTRACT_PROMPT: &str = r#"You are the long-term memory of an assistant. Read the memory snapshot and extract the durable facts worth remembering for months: identity, relationships, preferences, commitments, recurring topics.
- Each fact is one short self-contained sentence.
- Give each fact an `hp` between 2 and 10; higher means more important to remember.
- Skip small talk and anything only relevant to the moment.
Reply with JSON of the form {"facts": [{"content": "...", "hp": 5}]}.
If nothing is worth keeping, reply with {"facts": []}."#;

// ─────────────────────────────────────────────────────────────────────────────
// Structured extraction output
// ─────────────────────────────────────────────────────────────────────────────

/// Reply shape of the extraction prompt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFacts {
    pub facts: Vec<ExtractedFact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedFact {
    pub content: String,
    pub hp: u32,
}

/// Parse an extraction reply into fact candidates.
///
/// A bare `none` reply means no facts. Markdown code fences around the JSON
/// are tolerated; facts with blank content are dropped.
pub fn parse_facts(reply: &str) -> Result<Vec<FactCandidate>, PolicyError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    let json = strip_code_fence(trimmed);
    let parsed: ExtractedFacts = serde_json::from_str(json)
        .map_err(|e| PolicyError::Unusable(format!("fact extraction reply: {e}")))?;
    Ok(parsed
        .facts
        .into_iter()
        .filter_map(|f| {
            let content = f.content.trim();
            (!content.is_empty()).then(|| FactCandidate::new(content, f.hp))
        })
        .collect())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmPolicy
// ─────────────────────────────────────────────────────────────────────────────

impl From<LlmError> for PolicyError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Http(e) => PolicyError::Provider(e.to_string()),
            LlmError::BadResponse(msg) => PolicyError::Unusable(msg),
        }
    }
}

pub struct LlmPolicy {
    driver: LlmDriver,
    facts_schema: serde_json::Value,
}

impl LlmPolicy {
    pub fn new(driver: LlmDriver) -> Self {
        let facts_schema =
            serde_json::to_value(schema_for!(ExtractedFacts)).unwrap_or(serde_json::Value::Null);
        Self {
            driver,
            facts_schema,
        }
    }

    pub fn driver(&self) -> &LlmDriver {
        &self.driver
    }
}

impl PolicyProvider for LlmPolicy {
    fn embed(&self, text: &str) -> Result<Vec<f32>, PolicyError> {
        let embedding = self.driver.embed(text)?;
        if embedding.is_empty() {
            return Err(PolicyError::Unusable("empty embedding".into()));
        }
        Ok(embedding)
    }

    fn summarize(&self, states: &[ConversationState]) -> Result<String, PolicyError> {
        let messages = [
            ChatMessage::system(SUMMARIZE_PROMPT),
            ChatMessage::user(format!("<states>\n{}\n</states>", render_states(states))),
        ];
        let reply = self.driver.complete(&messages)?;
        let summary = reply.trim();
        if summary.is_empty() {
            return Err(PolicyError::Unusable("empty summary".into()));
        }
        debug!(turns = states.len(), chars = summary.chars().count(), "conversation summarized");
        Ok(summary.to_string())
    }

    fn extract_facts(&self, content: &str) -> Result<Vec<FactCandidate>, PolicyError> {
        let messages = [
            ChatMessage::system(EXTRACT_PROMPT),
            ChatMessage::user(format!("<memory>\n{content}\n</memory>")),
        ];
        let reply = self
            .driver
            .complete_structured(&messages, "extracted_facts", &self.facts_schema)?;
        let facts = parse_facts(&reply)?;
        debug!(facts = facts.len(), "facts extracted");
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_reply_means_no_facts() {
        assert!(parse_facts("none").unwrap().is_empty());
        assert!(parse_facts("  NONE \n").unwrap().is_empty());
        assert!(parse_facts("").unwrap().is_empty());
    }

    #[test]
    fn facts_parse_with_importance() {
        let facts = parse_facts(
            r#"{"facts":[{"content":"Alice has a cat named Miso","hp":8},{"content":"Alice lives in Lisbon","hp":5}]}"#,
        )
        .unwrap();
        assert_eq!(
            facts,
            vec![
                FactCandidate::new("Alice has a cat named Miso", 8),
                FactCandidate::new("Alice lives in Lisbon", 5),
            ]
        );
    }

    #[test]
    fn blank_facts_are_dropped() {
        let facts = parse_facts(r#"{"facts":[{"content":"  ","hp":8},{"content":" tea ","hp":3}]}"#).unwrap();
        assert_eq!(facts, vec![FactCandidate::new("tea", 3)]);
    }

    #[test]
    fn code_fences_are_tolerated() {
        let facts = parse_facts("```json\n{\"facts\":[{\"content\":\"x\",\"hp\":2}]}\n```").unwrap();
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn malformed_reply_is_unusable() {
        assert!(matches!(
            parse_facts("I think Alice likes tea"),
            Err(PolicyError::Unusable(_))
        ));
    }

    #[test]
    fn facts_schema_describes_content_and_hp() {
        let schema = serde_json::to_value(schema_for!(ExtractedFacts)).unwrap().to_string();
        assert!(schema.contains("facts"));
        assert!(schema.contains("content"));
        assert!(schema.contains("hp"));
    }

    #[test]
    fn llm_errors_map_to_policy_errors() {
        let err: PolicyError = LlmError::BadResponse("empty choices array".into()).into();
        assert!(matches!(err, PolicyError::Unusable(_)));
    }

    #[test]
    fn policy_constructed_without_network() {
        let policy = LlmPolicy::new(LlmDriver::new("http://localhost:11434", "llama3"));
        assert!(!policy.facts_schema.is_null());
        assert_eq!(policy.driver().model(), "llama3");
    }
}
