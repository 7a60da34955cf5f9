//! The persisted record type
//!
//! Records are immutable once written. The log store assigns the id at
//! insertion time; a record built for publishing carries none, a record
//! read back from the log always does. Field names are kept short because
//! every record in the capped log pays for them.

use serde::{Deserialize, Serialize};

use crate::id::MessageId;

/// A single published message as stored in the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned ordered id; `None` until inserted
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    /// Id of the client connection that published the message
    #[serde(rename = "ci")]
    pub connection_id: String,

    /// Event key the message is routed by
    #[serde(rename = "ek")]
    pub event_key: String,

    /// Best-effort textual representation of the published value
    #[serde(rename = "v")]
    pub payload: String,
}

impl Message {
    /// Build a record for publishing
    pub fn new(
        connection_id: impl Into<String>,
        event_key: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            connection_id: connection_id.into(),
            event_key: event_key.into(),
            payload: payload.into(),
        }
    }

    /// Creation time, derived from the store-assigned id
    ///
    /// `None` for records that have not been inserted yet.
    pub fn created_at(&self) -> Option<bson::DateTime> {
        self.id.map(|id| id.created_at())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let message = Message::new("conn1", "chat", "hello");
        let doc = bson::to_document(&message).unwrap();

        assert_eq!(doc.get_str("ci").unwrap(), "conn1");
        assert_eq!(doc.get_str("ek").unwrap(), "chat");
        assert_eq!(doc.get_str("v").unwrap(), "hello");
        // The store assigns the id; an unsent record must not carry one
        assert!(!doc.contains_key("_id"));
    }

    #[test]
    fn test_round_trip_with_id() {
        let mut message = Message::new("conn1", "chat", "hello");
        message.id = Some(MessageId::generate());

        let doc = bson::to_document(&message).unwrap();
        let back: Message = bson::from_document(doc).unwrap();

        assert_eq!(back.id, message.id);
        assert_eq!(back.connection_id, "conn1");
        assert_eq!(back.event_key, "chat");
        assert_eq!(back.payload, "hello");
    }

    #[test]
    fn test_created_at_follows_id() {
        let mut message = Message::new("conn1", "chat", "hello");
        assert!(message.created_at().is_none());

        let id = MessageId::generate();
        message.id = Some(id);
        assert_eq!(message.created_at(), Some(id.created_at()));
    }
}
