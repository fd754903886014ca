//! Key-value store contract and implementations.
//!
//! # Responsibility
//! - Persist JSON documents under string keys.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `set` replaces the whole value in one statement (all-or-nothing).
//! - `get` on an absent key returns `Ok(None)`.

use crate::db::DbError;
use crate::model::note::NoteId;
use log::error;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-layer error for transport, decoding and lookup failures.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    /// Persisted value exists but does not match the expected shape.
    InvalidData(String),
    /// Referenced note id is not present in the note list.
    NotFound(NoteId),
    /// Backend refused the operation (used by in-memory failure injection).
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "store serialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted value: {message}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_) | Self::NotFound(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Durable key-value boundary consumed by the note repository.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    fn set(&mut self, key: &str, value: &Value) -> StoreResult<()>;
}

/// SQLite-backed store over the `kv_store` table.
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(text) => serde_json::from_str(&text).map(Some).map_err(|err| {
                error!("event=kv_get module=store status=error key={key} error_code=decode_failed");
                StoreError::InvalidData(format!("key `{key}` holds malformed JSON: {err}"))
            }),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, value: &Value) -> StoreResult<()> {
        let encoded = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, encoded],
        )?;
        Ok(())
    }
}

/// In-memory store. Clones share the same contents, so a test can keep a
/// handle and inspect what the coordinator wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: BTreeMap<String, Value>,
    fail_writes: bool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set` fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Raw snapshot of one key.
    pub fn snapshot(&self, key: &str) -> Option<Value> {
        self.lock().values.get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.lock().values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> StoreResult<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable(format!("write to `{key}` rejected")));
        }
        state.values.insert(key.to_string(), value.clone());
        Ok(())
    }
}
