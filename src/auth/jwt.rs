//! JWT Token Signer
//! Mission: Issue and validate short-lived, HMAC-signed access tokens

use crate::auth::models::Claims;
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Token signing / validation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("could not sign access token: {0}")]
    Signing(String),

    /// Signature is valid but `exp` has passed
    #[error("access token expired at {expired_at}")]
    Expired { expired_at: i64 },

    #[error("invalid access token")]
    Invalid,
}

/// Signs and validates access tokens with a server secret
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, access_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs: i64::try_from(access_ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `user_id` stamped with the current time
    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    /// Issue a token as if the clock read `now` (unix seconds)
    pub fn issue_at(&self, user_id: i64, now: i64) -> Result<String, TokenError> {
        let exp = now.checked_add(self.access_ttl_secs).ok_or_else(|| {
            error!(user_id, now, "Access token expiry out of range");
            TokenError::Signing("access token lifetime out of range".to_string())
        })?;
        let claims = Claims {
            user_id,
            iat: now,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                error!(user_id, exp = claims.exp, "Could not generate an access token");
                TokenError::Signing(e.to_string())
            })?;

        debug!(user_id, exp = claims.exp, "Issued access token");
        Ok(token)
    }

    /// Validate signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => {
                    let expired_at = self.decode(token).map(|c| c.exp)?;
                    Err(TokenError::Expired { expired_at })
                }
                _ => Err(TokenError::Invalid),
            },
        }
    }

    /// Read the claims without checking signature or expiry.
    ///
    /// Only for the refresh path, after the registry has vouched for the token.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}
