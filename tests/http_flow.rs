//! End-to-end HTTP flows against the full router
//!
//! Stores are in-memory SQLite plus the in-process registry cache, so no
//! external services are required.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use forro_backend::{
    api::{self, AppState},
    auth::{
        AuthEngine, CredentialStore, Gatekeeper, MemoryKvStore, RefreshRegistry,
        SqliteUserStore, TokenSigner,
    },
    contacts::{ContactService, SqliteContactStore},
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";

struct TestApp {
    router: Router,
    users: Arc<SqliteUserStore>,
    signer: TokenSigner,
    registry: RefreshRegistry,
}

fn test_app() -> TestApp {
    let users = Arc::new(SqliteUserStore::in_memory().unwrap());
    let signer = TokenSigner::new(SECRET, Duration::from_secs(3600));
    let registry =
        RefreshRegistry::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(600));
    let engine = Arc::new(AuthEngine::new(
        users.clone(),
        signer.clone(),
        registry.clone(),
        4,
    ));
    let gate = Arc::new(Gatekeeper::new(engine.clone(), ["/users/contacts"]));
    let state = AppState {
        engine,
        contacts: Arc::new(ContactService::new(Arc::new(
            SqliteContactStore::in_memory().unwrap(),
        ))),
    };

    TestApp {
        router: api::router(state, gate),
        users,
        signer,
        registry,
    }
}

fn post_json(uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn bearer_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

async fn seed_user(users: &SqliteUserStore, email: &str, password: &str) -> i64 {
    let hash = bcrypt::hash(password, 4).unwrap();
    users.create(email, &hash).await.unwrap().user_id
}

#[tokio::test]
async fn test_health_endpoints_are_public() {
    let app = test_app();

    let index = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(index.status(), StatusCode::OK);

    let ping = app
        .router
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ping.status(), StatusCode::IM_A_TEAPOT);
    let bytes = to_bytes(ping.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"pong");
}

#[tokio::test]
async fn test_login_then_contact_missing_name_is_400() {
    let app = test_app();
    let user_id = seed_user(&app.users, "a@b.com", "secret1").await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/login",
            json!({"email": "a@b.com", "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let header_token = bearer_header(&response).unwrap();
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(token, header_token);
    assert_eq!(token.split('.').count(), 3);
    assert_eq!(app.signer.verify(&token).unwrap().user_id, user_id);

    let response = app
        .router
        .oneshot(post_json(
            "/users/contacts",
            json!({"email": "borat@yo.com", "phone": 12345678}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["statusCode"], 400);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_login_failures_are_400() {
    let app = test_app();
    seed_user(&app.users, "a@b.com", "secret1").await;

    let wrong_password = app
        .router
        .clone()
        .oneshot(post_json(
            "/auth/login",
            json!({"email": "a@b.com", "password": "nope"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(wrong_password.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(wrong_password).await["message"], "Wrong password");

    let unknown = app
        .router
        .clone()
        .oneshot(post_json(
            "/login",
            json!({"email": "nobody@b.com", "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let invalid_body = app
        .router
        .oneshot(post_json("/login", json!({"email": "a@b.com"}), None))
        .await
        .unwrap();
    assert_eq!(invalid_body.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_and_add_contacts() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/users",
            json!({"email": "test1@test.com", "password": "@asd1234t"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(bearer_header(&response).is_some());
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let created = app
        .users
        .find_by_email("test1@test.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(app.signer.verify(&token).unwrap().user_id, created.user_id);

    let duplicate = app
        .router
        .clone()
        .oneshot(post_json(
            "/users",
            json!({"email": "test1@test.com", "password": "other"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let first = app
        .router
        .clone()
        .oneshot(post_json(
            "/users/contacts",
            json!({"name": "Borat", "email": "borat@yo.com", "phone": 12345678}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(body_json(first).await.as_array().unwrap().len(), 1);

    let second = app
        .router
        .oneshot(post_json(
            "/users/contacts",
            json!({"name": "Azamat", "email": "azamat@yo.com", "phone": 87654321}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CREATED);
    let contacts = body_json(second).await;
    assert_eq!(contacts[0]["name"], "Borat");
    assert_eq!(contacts[1]["name"], "Azamat");
}

#[tokio::test]
async fn test_protected_route_rejects_missing_or_bad_tokens() {
    let app = test_app();
    let contact = json!({"name": "Borat", "email": "borat@yo.com", "phone": 1});

    let missing = app
        .router
        .clone()
        .oneshot(post_json("/users/contacts", contact.clone(), None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["statusCode"], 401);

    let malformed = app
        .router
        .clone()
        .oneshot(post_json("/users/contacts", contact.clone(), Some("abc")))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);

    let forged = TokenSigner::new("wrong-secret", Duration::from_secs(60))
        .issue(1)
        .unwrap();
    let invalid = app
        .router
        .oneshot(post_json("/users/contacts", contact, Some(&forged)))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_registered_token_is_refreshed() {
    let app = test_app();
    let expired = app
        .signer
        .issue_at(99, Utc::now().timestamp() - 7200)
        .unwrap();
    app.registry.register(&expired).await.unwrap();

    let response = app
        .router
        .oneshot(post_json(
            "/users/contacts",
            json!({"name": "Borat", "email": "borat@yo.com", "phone": 12345678}),
            Some(&expired),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let refreshed = bearer_header(&response).unwrap();
    assert_ne!(refreshed, expired);
    assert_eq!(app.signer.verify(&refreshed).unwrap().user_id, 99);
    assert!(app.registry.is_eligible(&refreshed).await.unwrap());
}

#[tokio::test]
async fn test_expired_unregistered_token_is_401() {
    let app = test_app();
    let expired = app
        .signer
        .issue_at(99, Utc::now().timestamp() - 7200)
        .unwrap();

    let response = app
        .router
        .oneshot(post_json(
            "/users/contacts",
            json!({"name": "Borat", "email": "borat@yo.com", "phone": 12345678}),
            Some(&expired),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(bearer_header(&response).is_none());
}
