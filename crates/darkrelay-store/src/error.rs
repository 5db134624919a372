use thiserror::Error;

use darkrelay_shared::{ChainBreak, CryptoError, RoomId};

/// Errors produced by the store layer.
///
/// Every failure mode is its own variant so callers can route them
/// differently: `NotFound` back to the lobby, `ChainMismatch` into a retry,
/// `ChainVerificationFailed` onto a visible tamper warning.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The room does not exist, was deleted, or expired.
    #[error("Room not found: {0}")]
    NotFound(RoomId),

    /// Fresh ids kept colliding with existing rooms.
    #[error("Room id collision after {attempts} attempts")]
    AlreadyExists { attempts: u32 },

    /// The room's tail moved between the caller's read and its append.
    #[error("Chain mismatch: message links to {claimed}, tail is {tail}")]
    ChainMismatch { claimed: String, tail: String },

    /// The record's stored hash does not recompute from its fields.
    #[error("Message hash does not match its contents")]
    InvalidMessageHash,

    /// Stored history failed verification (tamper detected).
    #[error("Chain verification failed: {0}")]
    ChainVerificationFailed(ChainBreak),

    /// Every append attempt lost the race to a concurrent sender.
    #[error("Message not sent: chain kept advancing after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Blank message bodies are not posted.
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Cipher failure.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A thread panicked while holding a store lock.
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Hex decoding error.
    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// A persisted record could not be turned back into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
