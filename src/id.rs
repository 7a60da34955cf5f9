//! Record identifiers and cursor tokens
//!
//! Subscriber cursors cross the host boundary as opaque strings but must
//! be comparable internally. `MessageId` is the only type that understands
//! the log store's native id representation: a BSON ObjectId, assigned at
//! insertion time and monotonically increasing in insertion order for a
//! given log instance.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::BackplaneError;

/// Opaque, totally ordered identifier of a record in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(ObjectId);

impl MessageId {
    /// Mint a new id
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    /// Parse a cursor token previously produced by [`MessageId::token`]
    pub fn parse_token(token: &str) -> Result<Self, BackplaneError> {
        ObjectId::parse_str(token)
            .map(Self)
            .map_err(|e| BackplaneError::InvalidCursor {
                token: token.to_string(),
                message: e.to_string(),
            })
    }

    /// Format as an opaque cursor token for the host boundary
    pub fn token(&self) -> String {
        self.0.to_hex()
    }

    /// Creation time encoded in the id
    ///
    /// The log store assigns ids that embed a timestamp, so records carry
    /// no separate creation-time field.
    pub fn created_at(&self) -> bson::DateTime {
        self.0.timestamp()
    }

    /// The underlying store-native id
    pub fn as_object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for MessageId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // ObjectId bytes start with a big-endian timestamp followed by a
        // per-process counter, so byte order is insertion order.
        self.0.bytes().cmp(&other.0.bytes())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl std::str::FromStr for MessageId {
    type Err = BackplaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_token(s)
    }
}
