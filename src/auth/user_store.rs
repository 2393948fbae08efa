//! User Storage
//! Mission: Persist user accounts (email + bcrypt hash) with SQLite

use crate::auth::models::UserIdentity;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Account lookups and creation used by the auth engine
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, StoreError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    /// Fails with `StoreError::Duplicate` when a live account already uses `email`
    async fn create(&self, email: &str, password_hash: &str) -> Result<UserIdentity, StoreError>;
}

/// User storage with SQLite backend. Soft-deleted rows are invisible to lookups.
#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Create a new user store and initialize database
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS users_live_email
                ON users(email) WHERE deleted_at IS NULL;",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Mark an account deleted; it stops resolving but the row is kept
    pub fn soft_delete(&self, user_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE users SET deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            params![now, user_id],
        )?;

        if rows > 0 {
            info!(user_id, "User soft-deleted");
        }
        Ok(rows > 0)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?
    }
}

fn find_live_user(conn: &Connection, email: &str) -> Result<Option<UserIdentity>, StoreError> {
    let user = conn
        .query_row(
            "SELECT id, email, password_hash FROM users
             WHERE email = ?1 AND deleted_at IS NULL",
            params![email],
            |row| {
                Ok(UserIdentity {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

#[async_trait]
impl CredentialStore for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, StoreError> {
        let email = email.to_string();
        self.blocking(move |conn| find_live_user(conn, &email)).await
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<UserIdentity, StoreError> {
        let email = email.to_string();
        let password_hash = password_hash.to_string();

        self.blocking(move |conn| {
            let now = Utc::now().to_rfc3339();
            let inserted = conn.execute(
                "INSERT INTO users (email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![email, password_hash, now],
            );

            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Duplicate(email));
                }
                Err(e) => return Err(e.into()),
            }

            let user = UserIdentity {
                user_id: conn.last_insert_rowid(),
                email,
                password_hash,
            };

            info!(user_id = user.user_id, email = %user.email, "User record created");
            Ok(user)
        })
        .await
    }
}
