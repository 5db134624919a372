//! Store tuning knobs.

use std::time::Duration;

use darkrelay_shared::constants::{DEFAULT_APPEND_ATTEMPTS, MAX_MESSAGE_SIZE};

/// Runtime limits for a [`RoomStore`](crate::RoomStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Rooms idle for longer than this are removed by
    /// [`RoomStore::purge_expired`](crate::RoomStore::purge_expired).
    /// `None` keeps rooms until they are deleted explicitly.
    pub room_ttl: Option<Duration>,

    /// How many times a send re-reads the tail and retries after losing an
    /// append race. Values below 1 are treated as 1.
    pub append_attempts: u32,

    /// Maximum plaintext size accepted for a single message, in bytes.
    pub max_message_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            room_ttl: None,
            append_attempts: DEFAULT_APPEND_ATTEMPTS,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn with_room_ttl(mut self, ttl: Duration) -> Self {
        self.room_ttl = Some(ttl);
        self
    }

    pub fn with_append_attempts(mut self, attempts: u32) -> Self {
        self.append_attempts = attempts;
        self
    }

    pub(crate) fn effective_attempts(&self) -> u32 {
        self.append_attempts.max(1)
    }
}
