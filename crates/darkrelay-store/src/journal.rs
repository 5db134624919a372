//! Persistence hook for [`RoomStore`](crate::RoomStore).
//!
//! The store calls a [`Journal`] after every successful mutation, outside the
//! room lock. Journal failures are logged by the store and never undo the
//! in-memory change: persistence is best-effort.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use darkrelay_shared::{Message, RoomId, SenderId};

use crate::database::Database;
use crate::error::Result;
use crate::models::PersistedRoom;

/// Receives store mutations in the order each room applied them.
///
/// Calls for different rooms may interleave. Calls for the same room may
/// also arrive slightly out of order under contention, so implementations
/// key messages by `(generation, seq)` rather than by arrival.
pub trait Journal: Send + Sync {
    fn room_created(&self, room: &PersistedRoom) -> Result<()>;

    fn participant_joined(&self, room_id: &RoomId, sender: &SenderId, at: DateTime<Utc>) -> Result<()>;

    fn message_appended(
        &self,
        room_id: &RoomId,
        generation: u64,
        seq: u64,
        message: &Message,
    ) -> Result<()>;

    fn messages_cleared(&self, room_id: &RoomId, generation: u64, at: DateTime<Utc>) -> Result<()>;

    fn room_deleted(&self, room_id: &RoomId) -> Result<()>;
}

/// [`Journal`] backed by the SQLite [`Database`].
pub struct SqliteJournal {
    db: Mutex<Database>,
}

impl SqliteJournal {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Read every persisted room back (used on startup).
    pub fn load_rooms(&self) -> Result<Vec<PersistedRoom>> {
        self.db.lock()?.load_rooms()
    }
}

impl Journal for SqliteJournal {
    fn room_created(&self, room: &PersistedRoom) -> Result<()> {
        self.db.lock()?.insert_room(room)
    }

    fn participant_joined(&self, room_id: &RoomId, sender: &SenderId, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock()?;
        db.insert_participant(room_id, sender)?;
        db.touch_room(room_id, at)
    }

    fn message_appended(
        &self,
        room_id: &RoomId,
        generation: u64,
        seq: u64,
        message: &Message,
    ) -> Result<()> {
        let db = self.db.lock()?;
        db.insert_message(room_id, generation, seq, message)?;
        db.insert_participant(room_id, &message.sender_id)?;
        db.touch_room(room_id, message.timestamp)
    }

    fn messages_cleared(&self, room_id: &RoomId, generation: u64, at: DateTime<Utc>) -> Result<()> {
        let db = self.db.lock()?;
        db.set_generation(room_id, generation)?;
        db.touch_room(room_id, at)
    }

    fn room_deleted(&self, room_id: &RoomId) -> Result<()> {
        self.db.lock()?.delete_room(room_id)?;
        Ok(())
    }
}
