//! A key-value store on SQLite for keeping API responses between runs.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::{Connection, OptionalExtension};
use serde::{Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

use crate::{BudgetPeriod, UserID, client::ClientError};

/// The cache key for a user's transactions in `period`.
pub fn transactions_key(user_id: UserID, period: BudgetPeriod) -> String {
    format!("{}{period}", transactions_prefix(user_id))
}

/// The cache key for a user's budgets in `period`.
pub fn budgets_key(user_id: UserID, period: BudgetPeriod) -> String {
    format!("{}{period}", budgets_prefix(user_id))
}

/// The start of every transactions key of a user.
pub(crate) fn transactions_prefix(user_id: UserID) -> String {
    format!("transactions:{user_id}:")
}

/// The start of every budgets key of a user.
pub(crate) fn budgets_prefix(user_id: UserID) -> String {
    format!("budgets:{user_id}:")
}

/// A cached value and when it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,
    /// When the value was last written.
    pub updated_at: OffsetDateTime,
}

/// Stores JSON values by key in a SQLite database.
///
/// Cloning the cache shares the connection.
#[derive(Debug, Clone)]
pub struct LocalCache {
    store: Arc<Mutex<Store>>,
}

#[derive(Debug)]
struct Store {
    connection: Connection,
    /// Bumped whenever entries are removed.
    generation: u64,
}

impl LocalCache {
    /// Open, or create, the cache database at `path`.
    ///
    /// # Errors
    /// Returns [ClientError::Cache] if the file cannot be opened or the table cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// A cache that only lives as long as the process.
    ///
    /// # Errors
    /// Returns [ClientError::Cache] if the table cannot be created.
    pub fn in_memory() -> Result<Self, ClientError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, ClientError> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS cache_entry (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            (),
        )?;

        Ok(Self {
            store: Arc::new(Mutex::new(Store {
                connection,
                generation: 0,
            })),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>, ClientError> {
        self.store.lock().map_err(|_| ClientError::CacheLock)
    }

    /// A counter that changes every time entries are removed from this cache or its clones.
    ///
    /// Take it before fetching data that is stored with [LocalCache::put_if_unchanged].
    pub fn generation(&self) -> Result<u64, ClientError> {
        Ok(self.lock()?.generation)
    }

    /// The value stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    /// Returns [ClientError::Json] if the stored value is not a valid `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CacheEntry<T>>, ClientError> {
        let row: Option<(String, OffsetDateTime)> = self
            .lock()?
            .connection
            .query_row(
                "SELECT value, updated_at FROM cache_entry WHERE key = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(json, updated_at)| {
            Ok(CacheEntry {
                value: serde_json::from_str(&json)?,
                updated_at,
            })
        })
        .transpose()
    }

    /// Store `value` under `key`, replacing any earlier value.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ClientError> {
        let json = serde_json::to_string(value)?;

        upsert(&self.lock()?.connection, key, &json)
    }

    /// Store `value` under `key` only if nothing was removed since `generation` was taken.
    ///
    /// Returns whether the value was stored. Data fetched before a removal may
    /// be older than the write that caused the removal, so it is dropped
    /// instead of being put back.
    pub fn put_if_unchanged<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        generation: u64,
    ) -> Result<bool, ClientError> {
        let json = serde_json::to_string(value)?;
        let store = self.lock()?;

        if store.generation != generation {
            return Ok(false);
        }

        upsert(&store.connection, key, &json)?;

        Ok(true)
    }

    /// Drop the value stored under `key`, if any.
    pub fn remove(&self, key: &str) -> Result<(), ClientError> {
        let mut store = self.lock()?;
        store.generation += 1;
        store
            .connection
            .execute("DELETE FROM cache_entry WHERE key = ?1", [key])?;

        Ok(())
    }

    /// Drop every value whose key starts with `prefix`.
    pub fn remove_prefix(&self, prefix: &str) -> Result<usize, ClientError> {
        let mut store = self.lock()?;
        store.generation += 1;
        let removed = store.connection.execute(
            "DELETE FROM cache_entry WHERE substr(key, 1, length(?1)) = ?1",
            [prefix],
        )?;

        Ok(removed)
    }

    /// Drop every value cached for `user_id`.
    pub fn clear_user(&self, user_id: UserID) -> Result<usize, ClientError> {
        let mut removed = 0;
        for prefix in [transactions_prefix(user_id), budgets_prefix(user_id)] {
            removed += self.remove_prefix(&prefix)?;
        }

        tracing::debug!("Removed {removed} cache entries for user {user_id}");

        Ok(removed)
    }
}

fn upsert(connection: &Connection, key: &str, json: &str) -> Result<(), ClientError> {
    connection.execute(
        "INSERT INTO cache_entry (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (key, json, OffsetDateTime::now_utc()),
    )?;

    Ok(())
}
