//! Refresh Registry
//! Mission: Remember which issued access tokens may be silently reissued

use crate::auth::kv_store::{KvError, KvStore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Marker for a failure that has already been logged and is intentionally ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logged;

/// Result of a fire-and-forget write: failures are logged, never propagated
pub type BestEffort = Result<(), Logged>;

/// Hex-encoded SHA-256 of the token; the raw token is never stored
pub fn token_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct RefreshRegistry {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl RefreshRegistry {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Record `token` as refreshable for the configured TTL.
    ///
    /// Re-registering an identical token keeps the original record and TTL.
    pub async fn register(&self, token: &str) -> BestEffort {
        match self.store.set_nx_ex(&token_key(token), "true", self.ttl).await {
            Ok(true) => {
                debug!(ttl_secs = self.ttl.as_secs(), "Refresh record stored");
                Ok(())
            }
            Ok(false) => {
                debug!("Refresh record already present");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Could not store refresh record");
                Err(Logged)
            }
        }
    }

    /// Whether a live refresh record exists for `token`
    pub async fn is_eligible(&self, token: &str) -> Result<bool, KvError> {
        Ok(self.store.get(&token_key(token)).await?.is_some())
    }
}
