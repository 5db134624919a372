//! # darkrelay-server
//!
//! HTTP front end for DarkRelay rooms.
//!
//! This binary provides:
//! - **REST API** (axum) to create, join, read, clear and delete rooms and to
//!   post messages into their encrypted hash chains
//! - **Optional SQLite persistence** so rooms survive a restart
//! - **Idle-room expiry** swept on a fixed interval

mod api;
mod config;
mod error;

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use darkrelay_store::{Database, RoomStore, SqliteJournal};

use crate::api::AppState;
use crate::config::{DatabaseLocation, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,darkrelay_server=debug,darkrelay_store=debug")
        }))
        .init();

    info!("Starting DarkRelay server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the room store (restored from disk when persistence is on)
    // -----------------------------------------------------------------------
    let store = Arc::new(open_store(&config)?);

    let app_state = AppState {
        store: store.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------
    if config.room_ttl.is_some() {
        let sweeper = store.clone();
        let period = config.purge_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let store = sweeper.clone();
                match tokio::task::spawn_blocking(move || store.purge_expired(Utc::now())).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Room expiry sweep failed"),
                    Err(e) => warn!(error = %e, "Room expiry task panicked"),
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

fn open_store(config: &ServerConfig) -> anyhow::Result<RoomStore> {
    let db = match &config.database {
        DatabaseLocation::Memory => {
            info!("Persistence disabled, rooms live in memory only");
            return Ok(RoomStore::new(config.store_config()));
        }
        DatabaseLocation::DataDir => Database::new()?,
        DatabaseLocation::File(path) => {
            info!(path = %path.display(), "Opening database");
            Database::open_at(path)?
        }
    };

    let journal = Arc::new(SqliteJournal::new(db));
    Ok(RoomStore::restore(config.store_config(), journal)?)
}
