//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use darkrelay_shared::constants::{APP_NAME, DEFAULT_APPEND_ATTEMPTS, MAX_MESSAGE_SIZE};
use darkrelay_store::StoreConfig;

/// Where (if anywhere) rooms are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// Keep everything in memory; rooms vanish on restart.
    Memory,
    /// Platform data directory (`DATABASE_PATH=default`).
    DataDir,
    /// Explicit file path.
    File(PathBuf),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite journal location.
    /// Env: `DATABASE_PATH` (unset = memory only, `default` = data dir)
    pub database: DatabaseLocation,

    /// Rooms idle for this long are deleted (`None` = never).
    /// Env: `ROOM_TTL_SECS` (0 disables)
    /// Default: never
    pub room_ttl: Option<Duration>,

    /// How often the expiry sweeper runs.
    /// Env: `PURGE_INTERVAL_SECS`
    /// Default: `60`
    pub purge_interval: Duration,

    /// Send attempts before a lost append race is reported to the client.
    /// Env: `APPEND_ATTEMPTS`
    /// Default: `3`
    pub append_attempts: u32,

    /// Maximum plaintext size in bytes.
    /// Env: `MAX_MESSAGE_SIZE`
    /// Default: 256 KiB
    pub max_message_size: usize,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"DarkRelay"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database: DatabaseLocation::Memory,
            room_ttl: None,
            purge_interval: Duration::from_secs(60),
            append_attempts: DEFAULT_APPEND_ATTEMPTS,
            max_message_size: MAX_MESSAGE_SIZE,
            instance_name: APP_NAME.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database = match path.trim() {
                "" => DatabaseLocation::Memory,
                "default" => DatabaseLocation::DataDir,
                other => DatabaseLocation::File(PathBuf::from(other)),
            };
        }

        if let Some(secs) = parse_u64(&lookup, "ROOM_TTL_SECS") {
            config.room_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(secs) = parse_u64(&lookup, "PURGE_INTERVAL_SECS") {
            if secs > 0 {
                config.purge_interval = Duration::from_secs(secs);
            } else {
                tracing::warn!("PURGE_INTERVAL_SECS must be positive, using default");
            }
        }

        if let Some(n) = parse_u64(&lookup, "APPEND_ATTEMPTS") {
            match u32::try_from(n) {
                Ok(n) if n > 0 => config.append_attempts = n,
                _ => tracing::warn!(value = n, "Invalid APPEND_ATTEMPTS, using default"),
            }
        }

        if let Some(n) = parse_u64(&lookup, "MAX_MESSAGE_SIZE") {
            match usize::try_from(n) {
                Ok(n) if n > 0 => config.max_message_size = n,
                _ => tracing::warn!(value = n, "Invalid MAX_MESSAGE_SIZE, using default"),
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            if !name.trim().is_empty() {
                config.instance_name = name;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Limits handed to the room store.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            room_ttl: self.room_ttl,
            append_attempts: self.append_attempts,
            max_message_size: self.max_message_size,
        }
    }
}

fn parse_u64<F>(lookup: &F, name: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Invalid number, using default");
            None
        }
    }
}
