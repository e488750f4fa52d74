//! `recollect-runtime` – The Model Bridge.
//!
//! Connects the memory engine to a real language model and sets up process
//! telemetry.
//!
//! # Modules
//!
//! - [`llm_driver`] – [`LlmDriver`][llm_driver::LlmDriver]: a blocking
//!   OpenAI-compatible HTTP client for chat completions and embeddings,
//!   usable with [Ollama](https://ollama.com) (`http://localhost:11434`) or
//!   OpenAI.
//! - [`policy`] – [`LlmPolicy`][policy::LlmPolicy]: the
//!   [`PolicyProvider`][recollect_memory::PolicyProvider] that summarizes
//!   conversations, extracts durable facts through a JSON-schema–constrained
//!   reply and embeds text.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter. Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod llm_driver;
pub mod policy;
pub mod telemetry;

pub use llm_driver::{ChatMessage, LlmDriver, LlmError, Role};
pub use policy::{LlmPolicy, parse_facts};
pub use telemetry::{TracerProviderGuard, init_tracing};
