//! # darkrelay-store
//!
//! Concurrency-safe registry of chat rooms and their hash-chained, encrypted
//! message logs.
//!
//! [`RoomStore`] is the single in-memory source of truth. Each room sits
//! behind its own mutex so unrelated rooms never contend; the registry map
//! has a separate lock that is only held long enough to hand out a room
//! handle. The [`conversation`] module layers the send/read workflow on top
//! (encrypt, chain, append with retry; decrypt, verify for display).
//!
//! Persistence is optional: a [`Journal`] receives every mutation after the
//! room lock is released. [`SqliteJournal`] writes through [`Database`] and can
//! rebuild a store on startup via [`RoomStore::restore`].

pub mod config;
pub mod conversation;
pub mod database;
pub mod journal;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod room_store;
pub mod rooms;

mod error;

pub use config::StoreConfig;
pub use database::Database;
pub use error::{Result, StoreError};
pub use journal::{Journal, SqliteJournal};
pub use models::*;
pub use room_store::RoomStore;
