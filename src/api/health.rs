//! Unauthenticated service endpoints

use axum::http::StatusCode;

/// GET /
pub async fn index() -> (StatusCode, &'static str) {
    (
        StatusCode::OK,
        "This is not the endpoint you are looking for...",
    )
}

/// GET /ping - liveness probe for monitoring tools
pub async fn ping() -> (StatusCode, &'static str) {
    (StatusCode::IM_A_TEAPOT, "pong")
}
