//! Forro - user accounts and contact lists over HTTP
//! Mission: Short-lived JWTs with silent, registry-backed refresh

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use forro_backend::{
    api::{self, AppState},
    auth::{
        AuthEngine, Gatekeeper, KvStore, MemoryKvStore, RefreshRegistry, SqliteKvStore,
        SqliteUserStore, TokenSigner,
    },
    config::Config,
    contacts::{ContactService, SqliteContactStore},
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired refresh records are swept
const REGISTRY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    info!("🚀 Forro backend starting");
    if config.auth.uses_dev_secret() {
        warn!("⚠️  JWT_SECRET not set, using development secret. CHANGE IN PRODUCTION!");
    }

    let users = Arc::new(
        SqliteUserStore::new(&config.stores.auth_db_path).context("Failed to open user store")?,
    );
    info!("🔐 User store initialized at: {}", config.stores.auth_db_path);

    let contact_store = Arc::new(
        SqliteContactStore::new(&config.stores.contacts_db_path)
            .context("Failed to open contact store")?,
    );
    info!("📇 Contact store initialized at: {}", config.stores.contacts_db_path);

    let registry_store = open_registry_store(&config).await?;
    let registry = RefreshRegistry::new(registry_store, config.auth.refresh_ttl());
    let signer = TokenSigner::new(&config.auth.secret, config.auth.access_ttl());

    let engine = Arc::new(AuthEngine::new(
        users,
        signer,
        registry,
        config.auth.bcrypt_cost,
    ));
    let gate = Arc::new(Gatekeeper::new(
        engine.clone(),
        config.auth.protected_paths.clone(),
    ));
    let state = AppState {
        engine,
        contacts: Arc::new(ContactService::new(contact_store)),
    };

    let app = api::router(state, gate);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        protected_paths = ?config.auth.protected_paths,
        "🎯 API server listening on {}", addr
    );

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Pick the refresh registry backend and start its expiry sweep
async fn open_registry_store(config: &Config) -> Result<Arc<dyn KvStore>> {
    match &config.stores.registry_db_path {
        Some(path) => {
            let store = SqliteKvStore::connect(
                path,
                config.stores.registry_connect_attempts,
                config.stores.registry_retry_delay(),
            )
            .await
            .context("Failed to connect refresh registry store")?;

            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(REGISTRY_PURGE_INTERVAL);
                loop {
                    ticker.tick().await;
                    match sweeper.purge_expired().await {
                        Ok(removed) if removed > 0 => {
                            info!(removed, "Expired refresh records purged")
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Refresh record purge failed"),
                    }
                }
            });

            Ok(Arc::new(store))
        }
        None => {
            info!("Refresh registry using in-process cache");
            let store = MemoryKvStore::new();

            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(REGISTRY_PURGE_INTERVAL);
                loop {
                    ticker.tick().await;
                    let removed = sweeper.purge_expired();
                    if removed > 0 {
                        info!(removed, "Expired refresh records purged");
                    }
                }
            });

            Ok(Arc::new(store))
        }
    }
}

/// Initialize tracing with env-filter control
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forro_backend=debug,forro=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate root .env when launched from elsewhere
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}
