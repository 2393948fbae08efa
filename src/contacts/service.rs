//! Contact Service
//! Mission: Append contacts to a user's list, creating the list on first use

use crate::contacts::store::{Contact, ContactStore};
use crate::error::{ApiError, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("could not save contact: {0}")]
    Store(#[from] StoreError),
}

impl From<ContactError> for ApiError {
    fn from(_: ContactError) -> Self {
        ApiError::server()
    }
}

pub struct ContactService {
    store: Arc<dyn ContactStore>,
}

impl ContactService {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self { store }
    }

    /// Add `contact` to the user's list and return the whole list
    pub async fn create_contact(
        &self,
        user_id: i64,
        contact: Contact,
    ) -> Result<Vec<Contact>, ContactError> {
        let contacts = self.store.append(user_id, contact).await.map_err(|e| {
            error!(user_id, error = %e, "Could not save user contacts");
            e
        })?;

        if contacts.len() == 1 {
            debug!(user_id, "User had no contacts list, created one");
        }
        info!(user_id, count = contacts.len(), "New contact added");
        Ok(contacts)
    }
}
