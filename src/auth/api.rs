//! Authentication API Endpoints
//! Mission: Provide login and signup endpoints that hand out bearer tokens

use crate::api::{extract::ValidatedJson, AppState};
use crate::auth::models::{CredentialsRequest, TokenResponse};
use crate::error::ApiError;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

/// Login endpoint - POST /login (also mounted at /auth/login)
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CredentialsRequest>,
) -> Result<Response, ApiError> {
    info!(email = %payload.email, "Login attempt");

    let token = state.engine.login(&payload.email, &payload.password).await?;
    token_response(StatusCode::OK, token)
}

/// Signup endpoint - POST /users
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CredentialsRequest>,
) -> Result<Response, ApiError> {
    info!(email = %payload.email, "Signup attempt");

    let token = state.engine.signup(&payload.email, &payload.password).await?;
    token_response(StatusCode::CREATED, token)
}

/// `{token}` body echoed in the `Authorization` header
fn token_response(status: StatusCode, token: String) -> Result<Response, ApiError> {
    let bearer =
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| ApiError::server())?;

    Ok((
        status,
        [(header::AUTHORIZATION, bearer)],
        Json(TokenResponse { token }),
    )
        .into_response())
}
