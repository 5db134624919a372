//! CRUD operations for room records, their keys and participants.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use darkrelay_shared::crypto;
use darkrelay_shared::{RoomId, SenderId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::PersistedRoom;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new room with its key. Messages are not written here.
    pub fn insert_room(&self, room: &PersistedRoom) -> Result<()> {
        self.conn().execute(
            "INSERT INTO rooms (id, name, key_hex, created_at, last_activity, generation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                room.id.as_str(),
                room.name,
                hex::encode(room.key),
                fmt_utc(&room.created_at),
                fmt_utc(&room.last_activity),
                room.generation as i64,
            ],
        )?;
        for sender in &room.participants {
            self.insert_participant(&room.id, sender)?;
        }
        Ok(())
    }

    /// Record a participant. Repeated joins are ignored.
    pub fn insert_participant(&self, room_id: &RoomId, sender: &SenderId) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO participants (room_id, sender_id) VALUES (?1, ?2)",
            params![room_id.as_str(), sender.as_str()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move `last_activity` forward. Never moves it backwards, so late
    /// journal writes cannot rewind expiry.
    pub fn touch_room(&self, room_id: &RoomId, at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "UPDATE rooms SET last_activity = ?2 WHERE id = ?1 AND last_activity < ?2",
            params![room_id.as_str(), fmt_utc(&at)],
        )?;
        Ok(())
    }

    /// Switch a room to `generation` and drop every message written under an
    /// older one.
    pub fn set_generation(&self, room_id: &RoomId, generation: u64) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "UPDATE rooms SET generation = ?2 WHERE id = ?1 AND generation < ?2",
            params![room_id.as_str(), generation as i64],
        )?;
        tx.execute(
            "DELETE FROM messages WHERE room_id = ?1 AND generation < ?2",
            params![room_id.as_str(), generation as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Load every room with its participants and current-generation messages.
    pub fn load_rooms(&self) -> Result<Vec<PersistedRoom>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, key_hex, created_at, last_activity, generation
             FROM rooms
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut rooms = Vec::new();
        for row in rows {
            let (id_str, name, key_hex, created_str, activity_str, generation) = row?;

            let id = RoomId::parse(&id_str)
                .map_err(|e| StoreError::Corrupt(format!("room id {id_str:?}: {e}")))?;
            let key = crypto::key_from_slice(&hex::decode(&key_hex)?)
                .map_err(|e| StoreError::Corrupt(format!("key for room {id}: {e}")))?;
            let created_at = parse_utc(&created_str)?;
            let last_activity = parse_utc(&activity_str)?;
            let generation = u64::try_from(generation)
                .map_err(|_| StoreError::Corrupt(format!("negative generation for room {id}")))?;

            let participants = self.get_participants(&id)?;
            let messages = self.get_messages_for_room(&id, generation)?;
            let discarded = self.discard_messages_from(&id, generation, messages.len() as u64)?;
            if discarded > 0 {
                tracing::warn!(
                    room = %id,
                    missing_seq = messages.len(),
                    discarded,
                    "journal gap: dropped messages that no longer link"
                );
            }

            rooms.push(PersistedRoom {
                id,
                name,
                key,
                created_at,
                last_activity,
                generation,
                participants,
                messages,
            });
        }
        Ok(rooms)
    }

    pub fn get_participants(&self, room_id: &RoomId) -> Result<Vec<SenderId>> {
        let mut stmt = self.conn().prepare(
            "SELECT sender_id FROM participants WHERE room_id = ?1 ORDER BY sender_id ASC",
        )?;
        let rows = stmt.query_map(params![room_id.as_str()], |row| row.get::<_, String>(0))?;

        let mut participants = Vec::new();
        for row in rows {
            participants.push(SenderId::from(row?));
        }
        Ok(participants)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a room; messages and participants cascade. Returns `true` if a
    /// row was deleted.
    pub fn delete_room(&self, room_id: &RoomId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM rooms WHERE id = ?1", params![room_id.as_str()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 (nanoseconds, `Z`), so text order is time order.
pub(crate) fn fmt_utc(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_utc(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
