//! Authentication Module
//! Mission: Signup/login with JWT access tokens and registry-backed silent refresh

pub mod api;
pub mod engine;
pub mod jwt;
pub mod kv_store;
pub mod middleware;
pub mod models;
pub mod refresh;
pub mod user_store;

pub use engine::{AuthEngine, AuthError, RefreshedAuth};
pub use jwt::{TokenError, TokenSigner};
pub use kv_store::{KvStore, MemoryKvStore, SqliteKvStore};
pub use middleware::{gatekeeper, Gatekeeper};
pub use models::AuthenticatedUser;
pub use refresh::{BestEffort, Logged, RefreshRegistry};
pub use user_store::{CredentialStore, SqliteUserStore};
