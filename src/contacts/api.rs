//! Contacts API Endpoints

use crate::api::{extract::ValidatedJson, AppState};
use crate::auth::AuthenticatedUser;
use crate::contacts::store::Contact;
use crate::error::ApiError;
use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

/// Create contact - POST /users/contacts (protected)
pub async fn create_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(contact): ValidatedJson<Contact>,
) -> Result<(StatusCode, Json<Vec<Contact>>), ApiError> {
    info!(user_id = user.user_id, "Create contact request");

    let contacts = state.contacts.create_contact(user.user_id, contact).await?;
    Ok((StatusCode::CREATED, Json(contacts)))
}
