//! Message structures and delivery status tracking

use crate::protocol::MessageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix of locally generated message identifiers
pub const TEMPORARY_ID_PREFIX: &str = "temp-";

/// Message delivery status as reported by the chat backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    /// Accepted by the client (or the server) but not yet delivered
    #[default]
    Sent,
    /// Delivered to the recipient's client
    Delivered,
    /// Read by the recipient
    Read,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MessageStatus::Sent => "SENT",
            MessageStatus::Delivered => "DELIVERED",
            MessageStatus::Read => "READ",
        };
        f.write_str(text)
    }
}

/// Message identifier
///
/// Server identifiers come from the backend. Temporary identifiers are
/// generated locally for optimistic sends and never match a server id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Identifier assigned by the chat backend
    Server(String),
    /// Locally generated identifier pending confirmation
    Temporary(String),
}

impl MessageId {
    /// Generate a fresh temporary identifier
    pub fn temporary() -> Self {
        Self::Temporary(format!("{}{}", TEMPORARY_ID_PREFIX, Uuid::new_v4()))
    }

    /// Raw identifier text
    pub fn as_str(&self) -> &str {
        match self {
            Self::Server(id) | Self::Temporary(id) => id,
        }
    }

    /// Server identifier, if this id has been confirmed
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::Server(id) => Some(id),
            Self::Temporary(_) => None,
        }
    }

    /// Whether this is a locally generated identifier
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message held in the conversation store
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Message ID
    pub id: MessageId,
    /// Conversation (chat room) ID, unknown until the server assigns one
    pub chat_id: Option<String>,
    /// Sender user ID
    pub sender_id: String,
    /// Recipient user ID
    pub recipient_id: String,
    /// Message text
    pub content: String,
    /// Delivery status
    pub status: MessageStatus,
    /// Time the message was sent
    pub sent_at: DateTime<Utc>,
    /// Time the message was delivered, if known
    pub delivered_at: Option<DateTime<Utc>>,
    /// Time the message was read, if known
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create an optimistic message for immediate display
    pub fn optimistic(
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
        chat_id: Option<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::temporary(),
            chat_id,
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            content: content.into(),
            status: MessageStatus::Sent,
            sent_at: Utc::now(),
            delivered_at: None,
            read_at: None,
        }
    }

    /// Whether this message is still awaiting server confirmation
    pub fn is_pending(&self) -> bool {
        self.id.is_temporary()
    }

    /// The other participant, seen from `user_id`
    pub fn partner_of(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.recipient_id
        } else {
            &self.sender_id
        }
    }

    /// Apply a status change, stamping the matching timestamp field
    pub fn apply_status(&mut self, status: MessageStatus, at: DateTime<Utc>) {
        self.status = status;
        match status {
            MessageStatus::Delivered => self.delivered_at = Some(at),
            MessageStatus::Read => self.read_at = Some(at),
            MessageStatus::Sent => {}
        }
    }

    /// Get human-readable delivery status indicator
    pub fn status_indicator(&self) -> &str {
        match self.status {
            MessageStatus::Sent => "✓",
            MessageStatus::Delivered | MessageStatus::Read => "✓✓",
        }
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: MessageId::Server(record.id),
            chat_id: record.chat_id,
            sender_id: record.sender_id,
            recipient_id: record.recipient_id,
            content: record.content,
            status: record.status,
            sent_at: record.sent_at,
            delivered_at: record.delivered_at,
            read_at: record.read_at,
        }
    }
}
