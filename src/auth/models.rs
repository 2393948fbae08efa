//! Authentication Models
//! Mission: Define user identity, token claims and auth request/response bodies

use crate::api::extract::Validate;
use crate::error::ApiError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub(crate) static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex");
}

/// Width of the stored email column
const MAX_EMAIL_LENGTH: usize = 60;

/// Stored user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
}

/// JWT claims payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub iat: i64, // issued-at, unix seconds
    pub exp: i64, // expiration, unix seconds
}

/// Identity attached to a request by the gatekeeper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

/// Login and signup request body
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

impl Validate for CredentialsRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ApiError::Validation("Input validation error".to_string()));
        }
        Ok(())
    }
}

/// Login and signup response body
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(ApiError::Validation("Input validation error".to_string()));
    }
    Ok(())
}
