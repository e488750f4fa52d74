//! Memory Store.
//!
//! Persists [`MemoryItem`] records for every user in a single SQLite table
//! and exposes the two tier-aware access paths the managers need:
//!
//! * short-term (`hp = 1`), ordered by timestamp, and
//! * long-term (`hp > 1`), ordered by `(hp DESC, timestamp DESC)`.
//!
//! # Storage layout
//!
//! | column    | type    | description                                    |
//! |-----------|---------|------------------------------------------------|
//! | id        | TEXT    | UUID v4 primary key                            |
//! | content   | TEXT    | Memory text                                    |
//! | embedding | BLOB    | Little-endian f32 vector (4 × N bytes)         |
//! | timestamp | TEXT    | RFC-3339 creation time (UTC, nanoseconds)      |
//! | hp        | INTEGER | Hit points; encodes the tier                   |
//! | user_id   | TEXT    | Owning user                                    |
//!
//! Every method is a single SQL statement, so each call is atomic on its
//! own; nothing spans calls.
//!
//! # Example
//!
//! ```rust
//! use recollect_memory::store::MemoryStore;
//! use recollect_types::MemoryItem;
//!
//! let store = MemoryStore::open_in_memory().unwrap();
//! let item = MemoryItem::ephemeral("alice", "We talked about tea.", vec![0.1, 0.9]);
//! store.save(&item).unwrap();
//!
//! assert_eq!(store.count_short_term("alice").unwrap(), 1);
//! assert_eq!(store.oldest_short_term("alice").unwrap().unwrap().id, item.id);
//! ```

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use recollect_types::{MemoryItem, MemoryStats, Tier, TierStats};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from memory store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Embedding vectors must be non-empty")]
    EmptyEmbedding,
    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("Memory store connection lock poisoned")]
    Poisoned,
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding serialisation helpers
// ─────────────────────────────────────────────────────────────────────────────

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Fixed-width RFC-3339 so that text ordering equals chronological ordering.
fn timestamp_to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

const SELECT_COLUMNS: &str = "SELECT id, content, embedding, timestamp, hp, user_id FROM memories";

type RawRow = (String, String, Vec<u8>, String, i64, String);

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode(raw: RawRow) -> Result<MemoryItem, StoreError> {
    let (id_str, content, blob, ts_str, hp, user_id) = raw;
    let id = Uuid::parse_str(&id_str).map_err(|e| StoreError::Corrupt {
        id: id_str.clone(),
        reason: e.to_string(),
    })?;
    let timestamp = ts_str
        .parse::<DateTime<Utc>>()
        .map_err(|e| StoreError::Corrupt {
            id: id_str.clone(),
            reason: e.to_string(),
        })?;
    Ok(MemoryItem {
        id,
        content,
        embedding: bytes_to_embedding(&blob),
        timestamp,
        tier: Tier::from_hp(hp),
        user_id,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed, per-user partitioned memory store.
///
/// The connection sits behind a [`Mutex`] so a store can be shared between
/// the short-term and long-term managers through an `Arc`.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id        TEXT NOT NULL PRIMARY KEY,
                content   TEXT NOT NULL,
                embedding BLOB NOT NULL,
                timestamp TEXT NOT NULL,
                hp        INTEGER NOT NULL DEFAULT 1,
                user_id   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memories_user_hp   ON memories(user_id, hp DESC);
            CREATE INDEX IF NOT EXISTS idx_memories_user_time ON memories(user_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_memories_hp        ON memories(hp);",
        )?;
        Ok(())
    }

    fn query_items<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<MemoryItem>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_raw)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(decode(row?)?);
        }
        Ok(items)
    }

    fn query_one<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Option<MemoryItem>, StoreError> {
        let raw = self.conn()?.query_row(sql, params, read_raw).optional()?;
        raw.map(decode).transpose()
    }

    /// Insert or replace `item` by id.
    pub fn save(&self, item: &MemoryItem) -> Result<(), StoreError> {
        if item.embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }
        let blob = embedding_to_bytes(&item.embedding);
        self.conn()?.execute(
            "INSERT OR REPLACE INTO memories
                 (id, content, embedding, timestamp, hp, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id.to_string(),
                item.content,
                blob,
                timestamp_to_text(&item.timestamp),
                i64::from(item.tier),
                item.user_id,
            ],
        )?;
        Ok(())
    }

    /// Fetch a single memory by id.
    pub fn get(&self, id: &Uuid) -> Result<Option<MemoryItem>, StoreError> {
        self.query_one(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![id.to_string()],
        )
    }

    /// The `limit` newest short-term memories of `user_id`.
    pub fn list_short_term(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryItem>, StoreError> {
        self.query_items(
            &format!(
                "{SELECT_COLUMNS} WHERE user_id = ?1 AND hp = 1
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?2"
            ),
            params![user_id, sql_limit(limit)],
        )
    }

    /// The `limit` strongest long-term memories of `user_id`.
    pub fn list_long_term(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryItem>, StoreError> {
        self.query_items(
            &format!(
                "{SELECT_COLUMNS} WHERE user_id = ?1 AND hp > 1
                 ORDER BY hp DESC, timestamp DESC LIMIT ?2"
            ),
            params![user_id, sql_limit(limit)],
        )
    }

    /// Every long-term memory of `user_id`, strongest first.
    pub fn list_all_long_term(&self, user_id: &str) -> Result<Vec<MemoryItem>, StoreError> {
        self.query_items(
            &format!(
                "{SELECT_COLUMNS} WHERE user_id = ?1 AND hp > 1
                 ORDER BY hp DESC, timestamp DESC"
            ),
            params![user_id],
        )
    }

    /// The short-term memory of `user_id` with the earliest timestamp.
    pub fn oldest_short_term(&self, user_id: &str) -> Result<Option<MemoryItem>, StoreError> {
        self.query_one(
            &format!(
                "{SELECT_COLUMNS} WHERE user_id = ?1 AND hp = 1
                 ORDER BY timestamp ASC, rowid ASC LIMIT 1"
            ),
            params![user_id],
        )
    }

    /// Add `delta` to the HP of `id`, flooring the result at zero.
    ///
    /// Returns `false` when no memory has that id.
    pub fn update_hp(&self, id: &Uuid, delta: i64) -> Result<bool, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE memories SET hp = MAX(0, hp + ?1) WHERE id = ?2",
            params![delta, id.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Multiply the HP of every long-term memory of `user_id` by
    /// `1 - rate`, rounding down.
    ///
    /// Short-term memories are untouched. A long-term memory whose HP would
    /// fall to `1` or below is set to `0` instead, so decay expires facts
    /// rather than turning them back into short-term summaries. Returns the
    /// number of memories decayed.
    pub fn decay_long_term(&self, user_id: &str, rate: f64) -> Result<usize, StoreError> {
        let factor = 1.0 - rate.clamp(0.0, 1.0);
        let changed = self.conn()?.execute(
            "UPDATE memories
             SET hp = CASE
                 WHEN CAST(hp * ?1 + 1e-9 AS INTEGER) > 1 THEN CAST(hp * ?1 + 1e-9 AS INTEGER)
                 ELSE 0
             END
             WHERE user_id = ?2 AND hp > 1",
            params![factor, user_id],
        )?;
        Ok(changed)
    }

    /// Delete every memory, for every user, whose HP is zero or below.
    pub fn cleanup_expired(&self) -> Result<usize, StoreError> {
        let deleted = self.conn()?.execute("DELETE FROM memories WHERE hp <= 0", [])?;
        Ok(deleted)
    }

    pub fn count_short_term(&self, user_id: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM memories WHERE user_id = ?1 AND hp = 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn count_long_term(&self, user_id: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM memories WHERE user_id = ?1 AND hp > 1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete one memory. Returns `false` when the id was unknown.
    pub fn delete(&self, id: &Uuid) -> Result<bool, StoreError> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM memories WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }

    /// Delete every short-term memory of `user_id`.
    pub fn delete_short_term(&self, user_id: &str) -> Result<usize, StoreError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM memories WHERE user_id = ?1 AND hp = 1",
            params![user_id],
        )?;
        Ok(deleted)
    }

    /// Delete every long-term memory of `user_id`.
    pub fn delete_long_term(&self, user_id: &str) -> Result<usize, StoreError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM memories WHERE user_id = ?1 AND hp > 1",
            params![user_id],
        )?;
        Ok(deleted)
    }

    /// Count and mean HP of both tiers for `user_id`.
    pub fn tier_stats(&self, user_id: &str) -> Result<MemoryStats, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT COUNT(*), COALESCE(AVG(hp), 0.0) FROM memories
             WHERE user_id = ?1 AND hp = 1
             UNION ALL
             SELECT COUNT(*), COALESCE(AVG(hp), 0.0) FROM memories
             WHERE user_id = ?1 AND hp > 1",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let count: i64 = row.get(0)?;
            let avg_hp: f64 = row.get(1)?;
            Ok(TierStats {
                count: count as usize,
                avg_hp,
            })
        })?;
        let tiers = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(MemoryStats {
            short_term: tiers.first().copied().unwrap_or_default(),
            long_term: tiers.get(1).copied().unwrap_or_default(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
