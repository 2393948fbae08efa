//! Service Configuration
//! Mission: Load typed settings once from the environment, immutable afterwards

use clap::{Args, Parser};
use std::time::Duration;
use thiserror::Error;

/// Development-only signing secret; a warning is logged when it is in use.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

/// Longest accepted token or refresh lifetime (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must not be empty")]
    EmptySecret,

    #[error("{name} must be between 1 and {max} seconds, got {value}")]
    TtlOutOfRange {
        name: &'static str,
        value: u64,
        max: u64,
    },

    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    BcryptCost(u32),

    #[error("REGISTRY_CONNECT_ATTEMPTS must be at least 1")]
    NoConnectAttempts,
}

/// Top-level configuration, populated from flags or environment variables
#[derive(Parser, Debug, Clone)]
#[command(name = "forro")]
#[command(about = "User signup/login and contact list service")]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub stores: StoreConfig,
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Args, Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign access tokens
    #[arg(long = "jwt-secret", env = "JWT_SECRET", default_value = DEV_JWT_SECRET, hide_env_values = true)]
    pub secret: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_EXPIRY_TIME", default_value_t = 3600)]
    pub access_token_expiry_time: u64,

    /// Refresh record lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_EXPIRY_TIME", default_value_t = 604_800)]
    pub refresh_token_expiry_time: u64,

    /// bcrypt cost factor for new password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = 10)]
    pub bcrypt_cost: u32,

    /// Request paths that require a bearer token
    #[arg(
        long,
        env = "PROTECTED_PATHS",
        value_delimiter = ',',
        default_value = "/users/contacts"
    )]
    pub protected_paths: Vec<String>,
}

impl AuthConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expiry_time)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expiry_time)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret == DEV_JWT_SECRET
    }
}

#[derive(Args, Debug, Clone)]
pub struct StoreConfig {
    /// SQLite file holding user accounts
    #[arg(long, env = "AUTH_DB_PATH", default_value = "forro_auth.db")]
    pub auth_db_path: String,

    /// SQLite file holding contact documents
    #[arg(long, env = "CONTACTS_DB_PATH", default_value = "forro_contacts.db")]
    pub contacts_db_path: String,

    /// SQLite file backing the refresh registry; in-process cache when unset
    #[arg(long, env = "REGISTRY_DB_PATH")]
    pub registry_db_path: Option<String>,

    /// Fixed delay between registry connection attempts
    #[arg(long, env = "REGISTRY_RETRY_DELAY_SECS", default_value_t = 3)]
    pub registry_retry_delay_secs: u64,

    /// Connection attempts before giving up at startup
    #[arg(long, env = "REGISTRY_CONNECT_ATTEMPTS", default_value_t = 5)]
    pub registry_connect_attempts: u32,
}

impl StoreConfig {
    pub fn registry_retry_delay(&self) -> Duration {
        Duration::from_secs(self.registry_retry_delay_secs)
    }
}

impl Config {
    /// Reject settings that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        check_ttl("ACCESS_TOKEN_EXPIRY_TIME", self.auth.access_token_expiry_time)?;
        check_ttl("REFRESH_TOKEN_EXPIRY_TIME", self.auth.refresh_token_expiry_time)?;
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::BcryptCost(self.auth.bcrypt_cost));
        }
        if self.stores.registry_connect_attempts == 0 {
            return Err(ConfigError::NoConnectAttempts);
        }
        Ok(())
    }
}

fn check_ttl(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_TTL_SECS {
        return Err(ConfigError::TtlOutOfRange {
            name,
            value,
            max: MAX_TTL_SECS,
        });
    }
    Ok(())
}
