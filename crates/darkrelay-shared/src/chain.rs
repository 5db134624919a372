//! SHA-256 hash chain over a room's encrypted messages.
//!
//! Every message commits to its predecessor:
//!
//!   hash_i = SHA256(ciphertext_i || timestamp_i || prev_hash_i || sender_i)
//!
//! where `prev_hash_0` is [`GENESIS_HASH`] and `prev_hash_i = hash_{i-1}`.
//! Fields are concatenated as UTF-8 text without separators; the timestamp
//! uses the canonical form from [`canonical_timestamp`]. Editing, dropping
//! or reordering any message changes a recomputed hash or breaks a link.
//!
//! These functions never touch storage. The store owns the sequence and is
//! responsible for appending atomically with respect to the tail it handed
//! out.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{GENESIS_HASH, HASH_HEX_LEN};
use crate::crypto::{self, SymmetricKey};
use crate::error::{BreakKind, ChainBreak, CryptoError};
use crate::types::SenderId;

/// One link of a room's chain. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub sender_id: SenderId,
    /// Base64 of nonce || ciphertext || tag.
    pub ciphertext: String,
    pub timestamp: DateTime<Utc>,
    /// Lowercase hex SHA-256 over the canonical field concatenation.
    pub hash: String,
    pub prev_hash: String,
}

/// RFC 3339, microsecond precision, `Z` suffix: `2026-10-17T08:30:00.123456Z`.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn digest(ciphertext: &str, timestamp: &DateTime<Utc>, prev_hash: &str, sender_id: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(ciphertext.as_bytes());
    hasher.update(canonical_timestamp(timestamp).as_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(sender_id.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Hex digest of the canonical concatenation. Empty fields are valid input.
pub fn compute_hash(
    ciphertext: &str,
    timestamp: &DateTime<Utc>,
    prev_hash: &str,
    sender_id: &str,
) -> String {
    hex::encode(digest(ciphertext, timestamp, prev_hash, sender_id))
}

/// Encrypt `plaintext` under `key` and link the result to `prev_hash`.
///
/// `now` is truncated to microseconds so the stored timestamp survives a
/// round trip through its canonical text form. The caller supplies the
/// current chain tail and must append the result atomically against it.
pub fn next_message(
    plaintext: &str,
    sender_id: &SenderId,
    key: &SymmetricKey,
    prev_hash: &str,
    now: DateTime<Utc>,
) -> Result<Message, CryptoError> {
    let ciphertext = crypto::seal_text(key, plaintext)?;
    let timestamp = now.trunc_subsecs(6);
    let hash = compute_hash(&ciphertext, &timestamp, prev_hash, sender_id.as_str());

    Ok(Message {
        sender_id: sender_id.clone(),
        ciphertext,
        timestamp,
        hash,
        prev_hash: prev_hash.to_string(),
    })
}

/// Decrypt a message body. Failure is per-message: callers render a
/// placeholder and keep going.
pub fn decrypt_message(msg: &Message, key: &SymmetricKey) -> Result<String, CryptoError> {
    crypto::open_text(key, &msg.ciphertext)
}

/// True when the stored hash matches a recomputation over the message's
/// own fields. Says nothing about linkage.
///
/// The hash only commits to microseconds, so a timestamp carrying finer
/// digits cannot have come from [`next_message`] and never verifies.
pub fn verify_message(msg: &Message) -> bool {
    if msg.timestamp.trunc_subsecs(6) != msg.timestamp {
        return false;
    }
    let computed = digest(
        &msg.ciphertext,
        &msg.timestamp,
        &msg.prev_hash,
        msg.sender_id.as_str(),
    );
    let mut buf = [0u8; HASH_HEX_LEN];
    if hex::encode_to_slice(computed, &mut buf).is_err() {
        return false;
    }
    buf.as_slice() == msg.hash.as_bytes()
}

/// Walk the chain once and report the first violation.
///
/// Index 0 must start from [`GENESIS_HASH`]; every later message must point
/// at its predecessor's hash. Each message's own hash must recompute.
pub fn verify_chain(messages: &[Message]) -> Result<(), ChainBreak> {
    let mut expected_prev: &str = GENESIS_HASH;

    for (index, msg) in messages.iter().enumerate() {
        if msg.prev_hash != expected_prev {
            let kind = if index == 0 {
                BreakKind::BadGenesis
            } else {
                BreakKind::BrokenLink
            };
            return Err(ChainBreak { index, kind });
        }
        if !verify_message(msg) {
            return Err(ChainBreak {
                index,
                kind: BreakKind::HashMismatch,
            });
        }
        expected_prev = msg.hash.as_str();
    }

    Ok(())
}

/// Hash the next message in a sequence must carry as `prev_hash`.
pub fn tail_hash(messages: &[Message]) -> &str {
    messages
        .last()
        .map(|m| m.hash.as_str())
        .unwrap_or(GENESIS_HASH)
}
