use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle tier of a memory, derived from its hit points (HP).
///
/// The integer HP is only the storage and wire representation: `0` means
/// expired, `1` means short-term and anything above `1` is a long-term
/// memory ranked by that value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Tier {
    /// HP dropped to zero; removed on the next cleanup sweep.
    Expired,
    /// Short-term conversation summary (`hp == 1`).
    Ephemeral,
    /// Long-term fact with its current HP (always `> 1`).
    Durable(u32),
}

impl Tier {
    /// Classify a raw HP value. Negative values are treated as expired.
    pub fn from_hp(hp: i64) -> Self {
        match hp {
            i64::MIN..=0 => Tier::Expired,
            1 => Tier::Ephemeral,
            n => Tier::Durable(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    /// A long-term tier with the given importance, raised to the smallest
    /// durable HP so the item can never be mistaken for a short-term one.
    pub fn durable(importance: u32) -> Self {
        Tier::Durable(importance.max(2))
    }

    /// Integer HP for storage.
    pub fn hp(self) -> u32 {
        match self {
            Tier::Expired => 0,
            Tier::Ephemeral => 1,
            Tier::Durable(hp) => hp,
        }
    }

    pub fn is_short_term(self) -> bool {
        matches!(self, Tier::Ephemeral)
    }

    pub fn is_long_term(self) -> bool {
        matches!(self, Tier::Durable(_))
    }

    pub fn is_alive(self) -> bool {
        !matches!(self, Tier::Expired)
    }

    /// Human-readable tier name.
    pub fn label(self) -> &'static str {
        match self {
            Tier::Expired => "expired",
            Tier::Ephemeral => "short-term",
            Tier::Durable(_) => "long-term",
        }
    }
}

impl From<i64> for Tier {
    fn from(hp: i64) -> Self {
        Tier::from_hp(hp)
    }
}

impl From<Tier> for i64 {
    fn from(tier: Tier) -> Self {
        i64::from(tier.hp())
    }
}

/// A single memory record, scoped to one user.
///
/// Content, embedding and timestamp never change after creation; only the
/// tier (HP) moves through boosts and decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: Uuid,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Creation time, used for recency ordering.
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "hp")]
    pub tier: Tier,
    pub user_id: String,
}

impl MemoryItem {
    /// A fresh short-term memory stamped with the current UTC time.
    pub fn ephemeral(
        user_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            embedding,
            timestamp: Utc::now(),
            tier: Tier::Ephemeral,
            user_id: user_id.into(),
        }
    }

    /// A long-term memory derived from `source`.
    ///
    /// Reuses the source embedding and timestamp; only the content and the
    /// importance are new.
    pub fn derived(source: &MemoryItem, content: impl Into<String>, importance: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            embedding: source.embedding.clone(),
            timestamp: source.timestamp,
            tier: Tier::durable(importance),
            user_id: source.user_id.clone(),
        }
    }

    pub fn hp(&self) -> u32 {
        self.tier.hp()
    }
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// One raw turn of conversation, buffered until it is worth summarizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub role: Role,
    pub content: String,
}

impl ConversationState {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Count and mean HP of one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub count: usize,
    pub avg_hp: f64,
}

/// Per-user memory statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub short_term: TierStats,
    pub long_term: TierStats,
}

/// Startup-level error spanning storage, the policy provider and configuration.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum RecollectError {
    #[error("Memory Store Error: {0}")]
    Storage(String),

    #[error("Policy Provider Error: {0}")]
    Policy(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
