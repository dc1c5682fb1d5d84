//! Bank back-office API server
//!
//! Accounts, cards, transfers, loans and bill payments behind bearer-token
//! authentication. Every money movement runs as one atomic unit of the
//! configured [`BankStore`].

use std::net::SocketAddr;
use std::sync::Arc;

use rand::RngCore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bank_backoffice::api::{self, AppState};
use bank_backoffice::config::StorageBackend;
use bank_backoffice::domain::{Branch, User};
use bank_backoffice::identifiers::IdentifierGenerator;
use bank_backoffice::{db, BankStore, Config, MemoryBankStore, PgBankStore};

/// Initialize tracing/logging
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bank_backoffice=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Demo branch, employee and customer for the in-memory backend
async fn seed_memory_store(store: &MemoryBankStore) -> anyhow::Result<()> {
    let branch = store
        .insert_branch(Branch::new("Casa Central", "Av. de Mayo 500", None))
        .await?;
    let employee = store.insert_user(User::employee("empleado", branch.id)).await?;
    let customer = store
        .insert_user(User::customer("cliente", Some(branch.id)))
        .await?;

    for user in [&employee, &customer] {
        let token = random_token();
        store.issue_token(user.id, &token).await?;
        tracing::info!(username = %user.username, token = %token, "Demo user ready");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.json_logs);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = %config.environment, "Starting bank back-office server");

    let mut pool = None;
    let store: Arc<dyn BankStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres"))?;

            tracing::info!("Connecting to database...");
            let connected = db::connect(url, config.database_max_connections).await?;
            db::verify_connection(&connected).await?;

            if !db::check_schema(&connected).await? {
                tracing::error!("Database schema is not complete. Please run migrations.");
                return Err(anyhow::anyhow!("Database schema incomplete"));
            }
            tracing::info!("Database connected successfully");

            pool = Some(connected.clone());
            Arc::new(PgBankStore::new(connected))
        }
        StorageBackend::Memory => {
            if config.is_production() {
                tracing::warn!("In-memory storage loses every record on shutdown");
            }
            let store = MemoryBankStore::new();
            seed_memory_store(&store).await?;
            Arc::new(store)
        }
    };

    let state = AppState::new(store, IdentifierGenerator::random());
    let app = api::build_router(state, config.cors_allowed_origin.as_deref());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database connections closed");
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
