use rusqlite::params;

use darkrelay_shared::chain::canonical_timestamp;
use darkrelay_shared::{Message, RoomId, SenderId};

use crate::database::Database;
use crate::error::Result;
use crate::rooms::parse_utc;

impl Database {
    /// Write one chain link. Replays of the same `(room, generation, seq)`
    /// are ignored.
    pub fn insert_message(
        &self,
        room_id: &RoomId,
        generation: u64,
        seq: u64,
        message: &Message,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO messages
                 (room_id, generation, seq, sender_id, ciphertext, timestamp, hash, prev_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                room_id.as_str(),
                generation as i64,
                seq as i64,
                message.sender_id.as_str(),
                message.ciphertext,
                canonical_timestamp(&message.timestamp),
                message.hash,
                message.prev_hash,
            ],
        )?;
        Ok(())
    }

    /// Messages of one generation in chain order.
    ///
    /// Reading stops at the first missing `seq`. Rows past a lost journal
    /// write cannot link to the messages before them.
    pub fn get_messages_for_room(&self, room_id: &RoomId, generation: u64) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT seq, sender_id, ciphertext, timestamp, hash, prev_hash
             FROM messages
             WHERE room_id = ?1 AND generation = ?2
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![room_id.as_str(), generation as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (seq, sender_id, ciphertext, ts_str, hash, prev_hash) = row?;
            if seq != messages.len() as i64 {
                break;
            }
            messages.push(Message {
                sender_id: SenderId::from(sender_id),
                ciphertext,
                timestamp: parse_utc(&ts_str)?,
                hash,
                prev_hash,
            });
        }
        Ok(messages)
    }

    /// Delete every message of `generation` at or after `from_seq`. Returns
    /// the number of rows removed.
    pub fn discard_messages_from(&self, room_id: &RoomId, generation: u64, from_seq: u64) -> Result<usize> {
        let removed = self.conn().execute(
            "DELETE FROM messages WHERE room_id = ?1 AND generation = ?2 AND seq >= ?3",
            params![room_id.as_str(), generation as i64, from_seq as i64],
        )?;
        Ok(removed)
    }

    pub fn count_messages(&self, room_id: &RoomId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE room_id = ?1",
            params![room_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}
