//! Conversation identity and message list

use crate::storage::message::Message;
use tracing::warn;

/// Unordered pair of participants identifying a conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    low: String,
    high: String,
}

impl ParticipantPair {
    /// Create a pair; argument order does not matter
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Whether `user_id` takes part in this conversation
    pub fn contains(&self, user_id: &str) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The participant that is not `user_id`
    pub fn other(&self, user_id: &str) -> &str {
        if self.low == user_id { &self.high } else { &self.low }
    }
}

/// A conversation between two participants
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Participants
    pub participants: ParticipantPair,
    /// Server chat ID, set by the first message that carries one
    pub chat_id: Option<String>,
    /// Messages in display order
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new(participants: ParticipantPair) -> Self {
        Self {
            participants,
            chat_id: None,
            messages: Vec::new(),
        }
    }

    /// Record the server chat ID; the first one seen is kept
    pub fn adopt_chat_id(&mut self, chat_id: Option<&str>) {
        let Some(chat_id) = chat_id else { return };
        match &self.chat_id {
            None => self.chat_id = Some(chat_id.to_string()),
            Some(existing) if existing != chat_id => {
                warn!(
                    "Ignoring chat ID {} for conversation already bound to {}",
                    chat_id, existing
                );
            }
            Some(_) => {}
        }
    }

    /// Whether a message with this server ID is stored
    pub fn contains_server_id(&self, server_id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.id.server_id() == Some(server_id))
    }

    /// Number of pending optimistic messages
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending()).count()
    }
}
