//! Key-Value Stores
//! Mission: TTL-bounded `SET NX EX` / `GET` backends for the refresh registry

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),

    #[error("key-value store error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("ttl of {0:?} is out of range")]
    TtlOutOfRange(Duration),
}

/// Minimal key-value contract the refresh registry needs
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key` for `ttl` unless a live entry already exists.
    /// Returns `true` when the write happened.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError>;

    /// Fetch a live entry
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    state: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries (call from a background task)
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock();
        let now = Instant::now();
        let before = state.len();
        state.retain(|_, entry| entry.expires_at > now);
        before - state.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).ok_or(KvError::TtlOutOfRange(ttl))?;
        let mut state = self.state.lock();

        if let Some(existing) = state.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }

        state.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut state = self.state.lock();
        let now = Instant::now();

        match state.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                state.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// SQLite-backed store that survives restarts
#[derive(Clone)]
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    /// Open the store, retrying with a fixed delay until `attempts` is exhausted
    pub async fn connect(path: &str, attempts: u32, retry_delay: Duration) -> Result<Self, KvError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::open(path) {
                Ok(store) => {
                    info!(path, attempt, "Refresh registry store connected");
                    return Ok(store);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        path,
                        attempt,
                        retry_in_secs = retry_delay.as_secs(),
                        error = %e,
                        "Refresh registry store connection failed, retrying"
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => {
                    return Err(KvError::Unavailable(format!(
                        "gave up after {} attempts: {}",
                        attempt, e
                    )))
                }
            }
        }
    }

    pub fn open(path: &str) -> Result<Self, KvError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, KvError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, KvError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at_ms INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Delete expired rows
    pub async fn purge_expired(&self) -> Result<usize, KvError> {
        self.blocking(|conn| {
            let removed = conn.execute(
                "DELETE FROM kv WHERE expires_at_ms <= ?1",
                params![Utc::now().timestamp_millis()],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, KvError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, KvError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| KvError::Unavailable(e.to_string()))?
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        let key = key.to_string();
        let value = value.to_string();
        let ttl_ms = i64::try_from(ttl.as_millis()).map_err(|_| KvError::TtlOutOfRange(ttl))?;

        self.blocking(move |conn| {
            let now = Utc::now().timestamp_millis();
            let expires_at_ms = now
                .checked_add(ttl_ms)
                .ok_or(KvError::TtlOutOfRange(ttl))?;
            conn.execute(
                "DELETE FROM kv WHERE key = ?1 AND expires_at_ms <= ?2",
                params![key, now],
            )?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO kv (key, value, expires_at_ms) VALUES (?1, ?2, ?3)",
                params![key, value, expires_at_ms],
            )?;
            if inserted == 0 {
                debug!("Key already present, write skipped");
            }
            Ok(inserted == 1)
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let key = key.to_string();

        self.blocking(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv WHERE key = ?1 AND expires_at_ms > ?2",
                    params![key, Utc::now().timestamp_millis()],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_memory_set_nx_keeps_first_value() {
        let store = MemoryKvStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.set_nx_ex("k", "first", ttl).await.unwrap());
        assert!(!store.set_nx_ex("k", "second", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_memory_entries_expire() {
        let store = MemoryKvStore::new();
        store
            .set_nx_ex("k", "v", Duration::from_millis(30))
            .await
            .unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.get("k").await.unwrap().is_none());

        // An expired key can be written again
        assert!(store
            .set_nx_ex("k", "v2", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_memory_purge_expired() {
        let store = MemoryKvStore::new();
        store
            .set_nx_ex("short", "v", Duration::from_millis(10))
            .await
            .unwrap();
        store
            .set_nx_ex("long", "v", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_set_nx_and_expiry() {
        let store = SqliteKvStore::in_memory().unwrap();

        assert!(store
            .set_nx_ex("k", "true", Duration::from_millis(40))
            .await
            .unwrap());
        assert!(!store
            .set_nx_ex("k", "other", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("true".to_string()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_connect_persists_across_handles() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_str().unwrap();

        let store = SqliteKvStore::connect(path, 1, Duration::from_millis(1))
            .await
            .unwrap();
        store
            .set_nx_ex("k", "true", Duration::from_secs(60))
            .await
            .unwrap();

        let reopened = SqliteKvStore::connect(path, 1, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some("true".to_string()));
    }

    #[tokio::test]
    async fn test_sqlite_connect_gives_up() {
        let result = SqliteKvStore::connect(
            "/nonexistent-dir/registry.db",
            2,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(KvError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_an_error() {
        let huge = Duration::from_secs(u64::MAX);

        let memory = MemoryKvStore::new();
        assert!(matches!(
            memory.set_nx_ex("k", "true", huge).await,
            Err(KvError::TtlOutOfRange(_))
        ));
        assert!(memory.is_empty());

        let sqlite = SqliteKvStore::in_memory().unwrap();
        assert!(matches!(
            sqlite.set_nx_ex("k", "true", huge).await,
            Err(KvError::TtlOutOfRange(_))
        ));
        assert!(sqlite.get("k").await.unwrap().is_none());
    }
}
