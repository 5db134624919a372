//! Send and read workflows on top of [`RoomStore`].
//!
//! Sending is read-tail, encrypt-and-chain, append. The encrypt step runs
//! outside every lock, so the append can lose a race; a lost race is
//! retried against the new tail up to `StoreConfig::append_attempts` times.
//!
//! Reading decrypts each message independently. A message that fails to
//! decrypt gets a placeholder and the rest of the room still renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use darkrelay_shared::chain::{decrypt_message, next_message, verify_chain, verify_message};
use darkrelay_shared::constants::UNDECRYPTABLE_PLACEHOLDER;
use darkrelay_shared::crypto::SymmetricKey;
use darkrelay_shared::{ChainBreak, Message, RoomId, SenderId};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::room_store::RoomStore;

/// Encrypt `plaintext`, chain it to the room's tail and append it.
///
/// Blank bodies are rejected with [`StoreError::EmptyMessage`]. A chain
/// mismatch triggers a re-read of the tail and another attempt; after the
/// configured number of attempts the send fails with
/// [`StoreError::RetriesExhausted`].
pub fn post_message(
    store: &RoomStore,
    room_id: &RoomId,
    sender: &SenderId,
    plaintext: &str,
) -> Result<Message> {
    send_with_retry(store, room_id, sender, plaintext)
}

/// What the send loop needs from a room log.
trait ChainLog {
    fn config(&self) -> &StoreConfig;
    fn get_key(&self, room_id: &RoomId) -> Result<SymmetricKey>;
    fn tail_hash(&self, room_id: &RoomId) -> Result<String>;
    fn append_message(&self, room_id: &RoomId, message: Message) -> Result<()>;
}

impl ChainLog for RoomStore {
    fn config(&self) -> &StoreConfig {
        RoomStore::config(self)
    }

    fn get_key(&self, room_id: &RoomId) -> Result<SymmetricKey> {
        RoomStore::get_key(self, room_id)
    }

    fn tail_hash(&self, room_id: &RoomId) -> Result<String> {
        RoomStore::tail_hash(self, room_id)
    }

    fn append_message(&self, room_id: &RoomId, message: Message) -> Result<()> {
        RoomStore::append_message(self, room_id, message)
    }
}

fn send_with_retry<L: ChainLog>(
    log: &L,
    room_id: &RoomId,
    sender: &SenderId,
    plaintext: &str,
) -> Result<Message> {
    if plaintext.trim().is_empty() {
        return Err(StoreError::EmptyMessage);
    }
    let max = log.config().max_message_size;
    if plaintext.len() > max {
        return Err(StoreError::MessageTooLarge {
            size: plaintext.len(),
            max,
        });
    }

    let key = log.get_key(room_id)?;
    let attempts = log.config().effective_attempts();

    for attempt in 1..=attempts {
        let prev_hash = log.tail_hash(room_id)?;
        let message = next_message(plaintext, sender, &key, &prev_hash, Utc::now()).map_err(|e| {
            error!(room = %room_id, error = %e, "cipher failure while sealing message");
            StoreError::Crypto(e)
        })?;

        match log.append_message(room_id, message.clone()) {
            Ok(()) => return Ok(message),
            Err(StoreError::ChainMismatch { .. }) => {
                debug!(room = %room_id, attempt, "lost append race, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    warn!(room = %room_id, attempts, "message not sent: chain kept advancing");
    Err(StoreError::RetriesExhausted { attempts })
}

/// Decrypted body of a transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum MessageBody {
    Plaintext(String),
    /// Wrong key or corrupt ciphertext.
    Undecryptable,
}

impl MessageBody {
    /// Text to show: the plaintext, or a fixed placeholder.
    pub fn display(&self) -> &str {
        match self {
            MessageBody::Plaintext(text) => text,
            MessageBody::Undecryptable => UNDECRYPTABLE_PLACEHOLDER,
        }
    }
}

/// One decrypted message ready for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub sender_id: SenderId,
    pub timestamp: DateTime<Utc>,
    pub body: MessageBody,
    pub hash: String,
    pub prev_hash: String,
    /// The entry's own hash recomputes; linkage is reported by `chain`.
    pub verified: bool,
}

/// Integrity verdict for a whole room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChainStatus {
    Intact,
    Compromised { first_bad_index: usize },
}

impl From<&std::result::Result<(), ChainBreak>> for ChainStatus {
    fn from(result: &std::result::Result<(), ChainBreak>) -> Self {
        match result {
            Ok(()) => ChainStatus::Intact,
            Err(brk) => ChainStatus::Compromised {
                first_bad_index: brk.index,
            },
        }
    }
}

/// Everything a view layer needs to render a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcript {
    pub room_id: RoomId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub participant_count: usize,
    pub chain: ChainStatus,
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn is_intact(&self) -> bool {
        self.chain == ChainStatus::Intact
    }
}

/// Snapshot, verify and decrypt a room for display.
///
/// Tampering does not fail the read: it shows up as
/// [`ChainStatus::Compromised`] so the caller can flag it visibly.
pub fn read_transcript(store: &RoomStore, room_id: &RoomId) -> Result<Transcript> {
    let view = store.get_room(room_id)?;
    let key = store.get_key(room_id)?;

    let verdict = verify_chain(&view.messages);
    if let Err(brk) = &verdict {
        warn!(room = %room_id, index = brk.index, kind = %brk.kind, "tampered history detected");
    }

    let entries = view
        .messages
        .iter()
        .map(|msg| {
            let body = match decrypt_message(msg, &key) {
                Ok(text) => MessageBody::Plaintext(text),
                Err(_) => {
                    debug!(room = %room_id, hash = %msg.hash, "message failed to decrypt");
                    MessageBody::Undecryptable
                }
            };
            TranscriptEntry {
                sender_id: msg.sender_id.clone(),
                timestamp: msg.timestamp,
                body,
                hash: msg.hash.clone(),
                prev_hash: msg.prev_hash.clone(),
                verified: verify_message(msg),
            }
        })
        .collect();

    Ok(Transcript {
        room_id: view.id,
        name: view.name,
        created_at: view.created_at,
        participant_count: view.participants.len(),
        chain: ChainStatus::from(&verdict),
        entries,
    })
}
