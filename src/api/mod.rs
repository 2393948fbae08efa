//! HTTP API
//! Mission: Wire routes, shared state and middleware into one router

pub mod extract;
pub mod health;

use crate::auth::{api as auth_api, gatekeeper, AuthEngine, Gatekeeper};
use crate::contacts::{api as contacts_api, ContactService};
use crate::middleware::request_logging;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Collaborators handed to every handler; built once in `main`
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthEngine>,
    pub contacts: Arc<ContactService>,
}

/// Build the full application router.
///
/// The gatekeeper wraps every route but only enforces auth on its allow-list.
pub fn router(state: AppState, gate: Arc<Gatekeeper>) -> Router {
    Router::new()
        .route("/", get(health::index))
        .route("/ping", get(health::ping))
        .route("/login", post(auth_api::login))
        .route("/auth/login", post(auth_api::login))
        .route("/users", post(auth_api::signup))
        .route("/users/contacts", post(contacts_api::create_contact))
        .with_state(state)
        .layer(middleware::from_fn_with_state(gate, gatekeeper))
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}
