//! [`LlmDriver`] – OpenAI-compatible LLM interface.
//!
//! Talks to any model server exposing the OpenAI `/v1/chat/completions` and
//! `/v1/embeddings` endpoints, such as [Ollama](https://ollama.com)
//! (`http://localhost:11434`) or OpenAI itself. Requests are blocking; the
//! memory engine calls its policy provider synchronously.
//!
//! # Example
//!
//! ```rust,no_run
//! use recollect_runtime::llm_driver::{ChatMessage, LlmDriver};
//!
//! let driver = LlmDriver::new("http://localhost:11434", "llama3")
//!     .with_embedding_model("nomic-embed-text");
//!
//! let messages = vec![
//!     ChatMessage::system("You compress conversations into memories."),
//!     ChatMessage::user("Summarize: I adopted a cat named Miso."),
//! ];
//!
//! // Requires a running Ollama instance – skipped in unit tests.
//! // let reply = driver.complete(&messages).unwrap();
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from LLM driver operations.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response from the model server could not be parsed.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

/// `response_format` field that enforces structured JSON Schema output.
#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: NamedSchema<'a>,
}

#[derive(Serialize)]
struct NamedSchema<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmDriver
// ─────────────────────────────────────────────────────────────────────────────

/// A blocking client for an OpenAI-compatible model server.
///
/// Construct once and share; the underlying connection pool is reused.
pub struct LlmDriver {
    base_url: String,
    model: String,
    embedding_model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for LlmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmDriver")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl LlmDriver {
    /// Create a new driver pointing at `base_url` (e.g. `"http://localhost:11434"`)
    /// and using `model` for both chat and embeddings until
    /// [`with_embedding_model`][Self::with_embedding_model] says otherwise.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            embedding_model: model.clone(),
            model,
            api_key: None,
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Rebuild the HTTP client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Send `messages` to the model and return the assistant's reply text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the request fails, or
    /// [`LlmError::BadResponse`] if the response shape is unexpected.
    pub fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.chat(messages, None)
    }

    /// Like [`complete`][Self::complete], but constrains the reply to
    /// `schema` through the `response_format` field.
    pub fn complete_structured(
        &self,
        messages: &[ChatMessage],
        name: &str,
        schema: &serde_json::Value,
    ) -> Result<String, LlmError> {
        let format = ResponseFormat {
            kind: "json_schema",
            json_schema: NamedSchema { name, schema },
        };
        self.chat(messages, Some(format))
    }

    /// Embed `text` with the embedding model.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };
        let response: EmbeddingResponse = self.post("/v1/embeddings", &body)?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::BadResponse("empty data array".into()))
    }

    fn chat(
        &self,
        messages: &[ChatMessage],
        response_format: Option<ResponseFormat<'_>>,
    ) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            response_format,
        };
        let response: ChatResponse = self.post("/v1/chat/completions", &body)?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::BadResponse("empty choices array".into()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, LlmError> {
        let url = self.endpoint(path);
        debug!(url = %url, "LLM request");
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send()?.error_for_status()?;
        Ok(response.json()?)
    }
}
