//! Authentication Middleware
//! Mission: Guard protected paths with bearer tokens, silently refreshing expired ones

use crate::auth::{engine::AuthEngine, jwt::TokenError, models::AuthenticatedUser};
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

lazy_static! {
    static ref BEARER_REGEX: Regex =
        Regex::new(r"^Bearer [A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]+$")
            .expect("valid bearer regex");
}

/// Allow-list of protected paths plus the engine used to validate and refresh tokens.
/// Paths not on the list bypass authentication entirely.
pub struct Gatekeeper {
    engine: Arc<AuthEngine>,
    protected_paths: HashSet<String>,
}

impl Gatekeeper {
    pub fn new<I, S>(engine: Arc<AuthEngine>, protected_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            engine,
            protected_paths: protected_paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_paths.contains(path)
    }
}

/// Pull the token out of `Bearer <header>.<payload>.<signature>`
pub fn parse_bearer(value: &str) -> Option<&str> {
    if !BEARER_REGEX.is_match(value) {
        return None;
    }
    value.strip_prefix("Bearer ")
}

/// Gatekeeper middleware: attach identity on success, refresh on expiry, 401 otherwise
pub async fn gatekeeper(
    State(gate): State<Arc<Gatekeeper>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !gate.is_protected(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let auth = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            error!("Authorization header not provided");
            ApiError::Auth("No access token was provided".to_string())
        })?;

    let token = parse_bearer(auth)
        .ok_or_else(|| {
            error!("Authorization header value is not of a valid format");
            ApiError::Auth("Could not authenticate user".to_string())
        })?
        .to_string();

    match gate.engine.signer().verify(&token) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthenticatedUser {
                user_id: claims.user_id,
            });
            Ok(next.run(req).await)
        }
        Err(TokenError::Expired { expired_at }) => {
            debug!(expired_at, "Access token has expired. Checking refresh token...");

            let refreshed = gate.engine.refresh_auth(&token).await?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", refreshed.new_token))
                .map_err(|_| ApiError::server())?;

            req.extensions_mut().insert(AuthenticatedUser {
                user_id: refreshed.user_id,
            });

            let mut response = next.run(req).await;
            response.headers_mut().insert(header::AUTHORIZATION, bearer);
            Ok(response)
        }
        Err(e) => {
            error!(error = %e, "Invalid access token");
            Err(ApiError::Auth("Invalid access token".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or_else(|| ApiError::Auth("Could not authenticate user".to_string()))
    }
}
