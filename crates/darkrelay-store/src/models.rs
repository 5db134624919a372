//! Values handed out by the store.
//!
//! Every struct here is an owned copy: holding one never pins a room lock,
//! and later appends never show up in a view that was already taken.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use darkrelay_shared::crypto::SymmetricKey;
use darkrelay_shared::{Message, RoomId, SenderId};

// ---------------------------------------------------------------------------
// RoomView
// ---------------------------------------------------------------------------

/// Snapshot of a room's metadata and full message sequence.
///
/// The room key is deliberately absent; fetch it with
/// [`RoomStore::get_key`](crate::RoomStore::get_key).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomView {
    pub id: RoomId,
    /// Display label.
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Last create / join / append / clear.
    pub last_activity: DateTime<Utc>,
    /// Senders that joined or posted, sorted.
    pub participants: Vec<SenderId>,
    /// Messages in chain order.
    pub messages: Vec<Message>,
}

impl RoomView {
    /// `prev_hash` the next message must carry.
    pub fn tail_hash(&self) -> &str {
        darkrelay_shared::chain::tail_hash(&self.messages)
    }
}

// ---------------------------------------------------------------------------
// RoomSummary
// ---------------------------------------------------------------------------

/// Lightweight listing entry (no messages).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    pub participant_count: usize,
}

// ---------------------------------------------------------------------------
// PersistedRoom
// ---------------------------------------------------------------------------

/// A room as read back from the journal, key included.
#[derive(Clone)]
pub struct PersistedRoom {
    pub id: RoomId,
    pub name: String,
    pub key: SymmetricKey,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Clear counter; only messages of this generation belong to the room.
    pub generation: u64,
    pub participants: Vec<SenderId>,
    pub messages: Vec<Message>,
}

impl std::fmt::Debug for PersistedRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedRoom")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("generation", &self.generation)
            .field("participants", &self.participants.len())
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}
