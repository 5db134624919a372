//! v001 -- Initial schema creation.
//!
//! Creates `rooms`, `messages` and `participants`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Rooms
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS rooms (
    id            TEXT PRIMARY KEY NOT NULL,  -- 16 hex chars
    name          TEXT NOT NULL,
    key_hex       TEXT NOT NULL,              -- hex-encoded 32-byte symmetric key
    created_at    TEXT NOT NULL,              -- RFC-3339
    last_activity TEXT NOT NULL,              -- RFC-3339
    generation    INTEGER NOT NULL DEFAULT 0  -- bumped on every clear
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    room_id    TEXT NOT NULL,                 -- FK -> rooms(id)
    generation INTEGER NOT NULL,
    seq        INTEGER NOT NULL,              -- position in the chain
    sender_id  TEXT NOT NULL,
    ciphertext TEXT NOT NULL,                 -- base64, exactly as hashed
    timestamp  TEXT NOT NULL,                 -- canonical RFC-3339 (micros, Z)
    hash       TEXT NOT NULL,
    prev_hash  TEXT NOT NULL,

    PRIMARY KEY (room_id, generation, seq),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Participants
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS participants (
    room_id   TEXT NOT NULL,                  -- FK -> rooms(id)
    sender_id TEXT NOT NULL,

    PRIMARY KEY (room_id, sender_id),
    FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
