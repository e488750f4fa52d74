//! `recollect-memory` – The Memory Engine.
//!
//! Turns an unbounded stream of conversation into a bounded, ranked memory
//! store with two tiers: ephemeral short-term summaries and durable
//! long-term facts, each carrying hit points (HP) that rise with use and
//! decay with time.
//!
//! # Modules
//!
//! - [`store`] – [`MemoryStore`][store::MemoryStore]: SQLite persistence of
//!   every user's memories with tier-aware queries.
//! - [`cache`] – [`HotCache`][cache::HotCache]: bounded per-user cache
//!   injected into each manager.
//! - [`short_term`] – [`ShortTermMemoryManager`][short_term::ShortTermMemoryManager]:
//!   summarizes conversation batches once they pass the size threshold.
//! - [`long_term`] – [`LongTermMemoryManager`][long_term::LongTermMemoryManager]:
//!   promotion into facts, HP reinforcement, decay and cleanup.
//! - [`retrieval`] – [`MemoryRetriever`][retrieval::MemoryRetriever]: hybrid
//!   keyword and vector scoring for reflexive and deep recall.
//! - [`system`] – [`MemorySystem`][system::MemorySystem]: the facade that
//!   wires everything together.
//! - [`policy`] – [`PolicyProvider`][policy::PolicyProvider]: the
//!   summarization, extraction and embedding interface the engine consumes.

pub mod cache;
pub mod config;
pub mod error;
pub mod long_term;
pub mod policy;
pub mod retrieval;
pub mod short_term;
pub mod store;
pub mod system;

#[cfg(test)]
mod testing;

pub use cache::HotCache;
pub use config::MemoryConfig;
pub use error::EngineError;
pub use long_term::LongTermMemoryManager;
pub use policy::{FactCandidate, PolicyError, PolicyProvider, render_states};
pub use retrieval::{MemoryRetriever, ScoredMemory};
pub use short_term::ShortTermMemoryManager;
pub use store::{MemoryStore, StoreError};
pub use system::{MemorySystem, UpdateReport};
