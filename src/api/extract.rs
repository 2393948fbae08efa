//! Request body extraction with boundary validation

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Field-level checks run after a body deserializes
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// `Json<T>` that rejects malformed or invalid bodies with a 400 `ApiError`
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let path = req.uri().path().to_string();

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| {
                warn!(path = %path, reason = %rejection.body_text(), "Input validation error");
                ApiError::Validation("Input validation error".to_string())
            })?;

        value.validate().map_err(|e| {
            warn!(path = %path, "Input validation error");
            e
        })?;

        Ok(ValidatedJson(value))
    }
}
