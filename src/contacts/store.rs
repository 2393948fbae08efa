//! Contact Storage
//! Mission: Keep each user's contact list as a single JSON document

use crate::api::extract::Validate;
use crate::auth::models::validate_email;
use crate::error::{ApiError, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub phone: u64,
}

impl Validate for Contact {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("Input validation error".to_string()));
        }
        validate_email(&self.email)
    }
}

/// Document-style contact persistence keyed by user id
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<Vec<Contact>>, StoreError>;

    async fn set(&self, user_id: i64, contacts: &[Contact]) -> Result<(), StoreError>;

    /// Add one contact to the user's list, creating it if absent, and return
    /// the stored list. Concurrent appends for the same user must not lose writes.
    async fn append(&self, user_id: i64, contact: Contact) -> Result<Vec<Contact>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteContactStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContactStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_contacts (
                user_id INTEGER PRIMARY KEY,
                contacts TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn get(&self, user_id: i64) -> Result<Option<Vec<Contact>>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<Vec<Contact>>, StoreError> {
            let conn = conn.lock();
            let doc: Option<String> = conn
                .query_row(
                    "SELECT contacts FROM user_contacts WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;

            match doc {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
        .await?
    }

    async fn set(&self, user_id: i64, contacts: &[Contact]) -> Result<(), StoreError> {
        let doc = serde_json::to_string(contacts)?;
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = conn.lock();
            conn.execute(
                "INSERT INTO user_contacts (user_id, contacts, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    contacts = excluded.contacts,
                    updated_at = excluded.updated_at",
                params![user_id, doc, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?
    }

    async fn append(&self, user_id: i64, contact: Contact) -> Result<Vec<Contact>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Contact>, StoreError> {
            let mut conn = conn.lock();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let doc: Option<String> = tx
                .query_row(
                    "SELECT contacts FROM user_contacts WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            let mut contacts: Vec<Contact> = match doc {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };
            contacts.push(contact);

            tx.execute(
                "INSERT INTO user_contacts (user_id, contacts, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    contacts = excluded.contacts,
                    updated_at = excluded.updated_at",
                params![user_id, serde_json::to_string(&contacts)?, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            Ok(contacts)
        })
        .await?
    }
}
