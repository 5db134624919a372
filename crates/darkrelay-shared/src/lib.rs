//! # darkrelay-shared
//!
//! Building blocks shared by the DarkRelay store and server: identifiers,
//! the per-room symmetric cipher, and the SHA-256 hash chain that makes a
//! room's history tamper-evident.

pub mod chain;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod types;

pub use chain::Message;
pub use error::{BreakKind, ChainBreak, CryptoError, IdError};
pub use types::{RoomId, SenderId};
