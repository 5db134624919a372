use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::{ROOM_ID_BYTES, SENDER_ID_BYTES, SYSTEM_SENDER};
use crate::error::IdError;

// Room identity = 8 random bytes, shared out-of-band as 16 hex chars.
// Carries no key material: the room key is generated independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    pub const HEX_LEN: usize = ROOM_ID_BYTES * 2;

    pub fn generate() -> Self {
        let mut bytes = [0u8; ROOM_ID_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Validate a user-supplied id. Uppercase hex is accepted and normalized.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN {
            return Err(IdError::BadLength {
                expected: Self::HEX_LEN,
                actual: s.chars().count(),
            });
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(IdError::BadCharacter(c));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, used for default room names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RoomId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

// Pseudonymous author id. Not authenticated; any string is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SENDER_ID_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The reserved relay id. Clients may not post or join under it.
    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_SENDER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form: first 12 characters followed by an ellipsis.
    pub fn short(&self) -> String {
        if self.0.chars().count() <= 12 {
            self.0.clone()
        } else {
            let head: String = self.0.chars().take(12).collect();
            format!("{head}...")
        }
    }
}

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SenderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SenderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
