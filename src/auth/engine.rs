//! Auth Engine
//! Mission: Login, signup and silent token refresh on top of the signer and registry
//!
//! Every token handed out goes through `issue_and_register`: sign first, then attempt
//! the refresh record, then return. A registry failure never fails the caller.

use crate::auth::jwt::{TokenError, TokenSigner};
use crate::auth::refresh::{BestEffort, RefreshRegistry};
use crate::auth::user_store::CredentialStore;
use crate::error::{ApiError, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Wrong username")]
    UserNotFound,

    #[error("Wrong password")]
    WrongPassword,

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Invalid access token")]
    InvalidToken,

    /// Downstream failure; the detail is logged, never shown to clients
    #[error("server error: {0}")]
    Server(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UserNotFound => ApiError::NotFound(e.to_string()),
            AuthError::WrongPassword => ApiError::Validation(e.to_string()),
            AuthError::EmailTaken => ApiError::Conflict(e.to_string()),
            AuthError::InvalidToken => ApiError::Auth(e.to_string()),
            AuthError::Server(_) => ApiError::server(),
        }
    }
}

/// Outcome of a successful silent refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedAuth {
    pub new_token: String,
    pub user_id: i64,
}

pub struct AuthEngine {
    users: Arc<dyn CredentialStore>,
    signer: TokenSigner,
    registry: RefreshRegistry,
    bcrypt_cost: u32,
}

impl AuthEngine {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        signer: TokenSigner,
        registry: RefreshRegistry,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            signer,
            registry,
            bcrypt_cost,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Verify credentials and issue an access token
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await
            .map_err(|e| {
                error!(email, error = %e, "Could not get user record");
                AuthError::Server(e.to_string())
            })?
            .ok_or_else(|| {
                error!(email, "User does not exist");
                AuthError::UserNotFound
            })?;

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Server(e.to_string()))
            .and_then(|r| r.map_err(|e| AuthError::Server(e.to_string())))
            .map_err(|e| {
                error!(user_id = user.user_id, error = %e, "Could not verify the password");
                e
            })?;

        if !matches {
            error!(user_id = user.user_id, "Wrong password");
            return Err(AuthError::WrongPassword);
        }

        info!(user_id = user.user_id, email = %user.email, "User signed in");
        self.issue_and_register(user.user_id).await
    }

    /// Create an account and issue its first access token
    pub async fn signup(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let taken = self.users.exists_by_email(email).await.map_err(|e| {
            error!(email, error = %e, "Could not query DB to check for existing user");
            AuthError::Server(e.to_string())
        })?;

        if taken {
            error!(email, "User with this email already exists");
            return Err(AuthError::EmailTaken);
        }

        let password = password.to_string();
        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Server(e.to_string()))
            .and_then(|r| r.map_err(|e| AuthError::Server(e.to_string())))
            .map_err(|e| {
                error!(error = %e, "Could not hash password");
                e
            })?;

        let user = self
            .users
            .create(email, &password_hash)
            .await
            .map_err(|e| match e {
                // lost a race with a concurrent signup
                StoreError::Duplicate(_) => {
                    error!(email, "User with this email already exists");
                    AuthError::EmailTaken
                }
                other => {
                    error!(email, error = %other, "Could not create new user record in DB");
                    AuthError::Server(other.to_string())
                }
            })?;

        info!(user_id = user.user_id, email = %user.email, "New user created");
        self.issue_and_register(user.user_id).await
    }

    /// Reissue a token for an expired one that still has a live refresh record.
    ///
    /// No credentials are checked here: the registry record is the only trust anchor,
    /// so this must only run after the signer reported `Expired` for `expired_token`.
    pub async fn refresh_auth(&self, expired_token: &str) -> Result<RefreshedAuth, AuthError> {
        let eligible = self
            .registry
            .is_eligible(expired_token)
            .await
            .map_err(|e| {
                error!(error = %e, "Could not get refresh token");
                AuthError::InvalidToken
            })?;

        if !eligible {
            error!("Refresh token does not exist");
            return Err(AuthError::InvalidToken);
        }

        let claims = self.signer.decode(expired_token).map_err(|_| {
            error!("Could not read payload of refreshable token");
            AuthError::InvalidToken
        })?;

        let new_token = self.issue_and_register(claims.user_id).await?;
        debug!(user_id = claims.user_id, "Access token refreshed");

        Ok(RefreshedAuth {
            new_token,
            user_id: claims.user_id,
        })
    }

    async fn issue_and_register(&self, user_id: i64) -> Result<String, AuthError> {
        let token = self
            .signer
            .issue(user_id)
            .map_err(|e: TokenError| AuthError::Server(e.to_string()))?;

        // Err(Logged) was already reported by the registry; the token is still good
        let _registered: BestEffort = self.registry.register(&token).await;

        Ok(token)
    }
}
