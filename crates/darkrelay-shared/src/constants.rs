/// Application name
pub const APP_NAME: &str = "DarkRelay";

/// `prev_hash` of the first message in every room (64 zero characters)
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size in bytes
pub const TAG_SIZE: usize = 16;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Random bytes in a room id (64 bits, rendered as 16 hex chars)
pub const ROOM_ID_BYTES: usize = 8;

/// Random bytes in a generated sender id (rendered as 32 hex chars)
pub const SENDER_ID_BYTES: usize = 16;

/// Reserved sender id for messages authored by the relay itself
pub const SYSTEM_SENDER: &str = "SYSTEM";

/// Maximum plaintext size in bytes (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// Default number of append attempts before a send is reported as failed
pub const DEFAULT_APPEND_ATTEMPTS: u32 = 3;

/// Number of fresh ids tried before room creation gives up
pub const MAX_ID_ATTEMPTS: u32 = 8;

/// Shown in place of a message body that could not be decrypted
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[DECRYPTION FAILED]";
