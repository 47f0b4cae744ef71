//! Protocol module
//!
//! This module defines the JSON payloads exchanged with the chat backend:
//! - Outbound channel payloads (chat, mark-as-read, presence announcements)
//! - Inbound notifications (messages, status updates, presence)
//! - Channel destinations

use crate::storage::{MessageStatus, PresenceStatus};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Destination for outgoing chat messages
pub const CHAT_DESTINATION: &str = "/app/chat";

/// Destination for read receipts
pub const MARK_AS_READ_DESTINATION: &str = "/app/chat.markAsRead";

/// Destination for the presence announcement sent after connecting
pub const ADD_USER_DESTINATION: &str = "/app/user.addUser";

/// Destination for the announcement sent before disconnecting
pub const DISCONNECT_USER_DESTINATION: &str = "/app/user.disconnectUser";

/// Global presence broadcast topic
pub const PRESENCE_TOPIC: &str = "/topic/presence";

/// Personal inbox destination for a user
pub fn inbox_destination(user_id: &str) -> String {
    format!("/user/{}/queue/messages", user_id)
}

/// Personal status-update destination for a user
pub fn status_updates_destination(user_id: &str) -> String {
    format!("/user/{}/queue/status-updates", user_id)
}

/// Outbound chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    /// Sending user
    pub sender_id: String,
    /// Receiving user
    pub recipient_id: String,
    /// Message text
    pub content: String,
}

/// Outbound read receipt for every message in a chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPayload {
    /// Chat whose messages were read
    pub chat_id: String,
}

/// Outbound presence announcement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceAnnouncement {
    /// Announcing user
    pub user_id: String,
    /// Username
    pub username: String,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
}

/// Outbound announcement that the user is leaving
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectAnnouncement {
    /// Departing user
    pub user_id: String,
}

/// A message as delivered by the inbox topic or the history endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Server-assigned message ID
    pub id: String,
    /// Chat room ID
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Sender user ID
    pub sender_id: String,
    /// Recipient user ID
    pub recipient_id: String,
    /// Message text
    pub content: String,
    /// Delivery status
    #[serde(default)]
    pub status: MessageStatus,
    /// Time the server stored the message
    pub sent_at: DateTime<Utc>,
    /// Time of the latest status change (notifications only)
    #[serde(default)]
    pub status_timestamp: Option<DateTime<Utc>>,
    /// Delivery time (history only)
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    /// Read time (history only)
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

/// Inbound status change for one or more messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Chat the messages belong to
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Affected server message IDs
    pub message_ids: Vec<String>,
    /// New status for every listed message
    pub new_status: MessageStatus,
    /// When the status changed
    #[serde(default)]
    pub status_timestamp: Option<DateTime<Utc>>,
    /// User whose action caused the change
    #[serde(default)]
    pub updated_by_user_id: Option<String>,
}

/// Inbound presence broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    /// User whose presence changed
    pub id: String,
    /// New presence
    pub status: PresenceStatus,
}

/// Encode a payload as JSON for the channel
pub fn encode<T: Serialize>(payload: &T) -> Result<String> {
    Ok(serde_json::to_string(payload)?)
}

/// Decode a JSON payload received from the channel
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}
