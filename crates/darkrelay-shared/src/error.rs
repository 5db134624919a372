use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid key length")]
    InvalidKeyLength,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Room id must be exactly {expected} hex characters, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("Room id contains non-hex character {0:?}")]
    BadCharacter(char),
}

/// Why a hash chain failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// The first message does not start from the genesis hash.
    BadGenesis,
    /// `prev_hash` does not equal the preceding message's `hash`.
    BrokenLink,
    /// The stored `hash` does not match a recomputation over the fields.
    HashMismatch,
}

impl std::fmt::Display for BreakKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakKind::BadGenesis => f.write_str("first message does not start at genesis"),
            BreakKind::BrokenLink => f.write_str("prev_hash does not match predecessor"),
            BreakKind::HashMismatch => f.write_str("stored hash does not match contents"),
        }
    }
}

/// First violation found while walking a chain.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Hash chain broken at message {index}: {kind}")]
pub struct ChainBreak {
    pub index: usize,
    pub kind: BreakKind,
}
