//! In-memory conversation store
//!
//! Holds every conversation the local user has seen, keyed by participant
//! pair. Server pushes, history reloads and optimistic sends all land here.

use crate::storage::conversation::{Conversation, ParticipantPair};
use crate::storage::message::{Message, MessageId, MessageStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of [`ConversationStore::append_incoming`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New message appended at the end of its conversation
    Appended,
    /// Confirmed a pending optimistic message in place
    Reconciled,
    /// A message with the same server ID is already stored
    Duplicate,
}

/// Conversation store for the local user
#[derive(Debug, Clone)]
pub struct ConversationStore {
    self_id: String,
    conversations: HashMap<ParticipantPair, Conversation>,
    match_window: Duration,
}

impl ConversationStore {
    /// Create an empty store for `self_id`
    ///
    /// `match_window` bounds how far apart an optimistic message and its
    /// server echo may be in time and still be treated as the same message.
    pub fn new(self_id: impl Into<String>, match_window: std::time::Duration) -> Self {
        Self {
            self_id: self_id.into(),
            conversations: HashMap::new(),
            match_window: Duration::from_std(match_window).unwrap_or(Duration::MAX),
        }
    }

    /// ID of the local user
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Pair key for a conversation with `partner_id`
    pub fn pair_with(&self, partner_id: &str) -> ParticipantPair {
        ParticipantPair::new(self.self_id.as_str(), partner_id)
    }

    /// Conversation with `partner_id`, if any
    pub fn conversation(&self, partner_id: &str) -> Option<&Conversation> {
        self.conversations.get(&self.pair_with(partner_id))
    }

    /// Messages exchanged with `partner_id`, in display order
    pub fn messages(&self, partner_id: &str) -> &[Message] {
        self.conversation(partner_id)
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Server chat ID of the conversation with `partner_id`
    pub fn chat_id(&self, partner_id: &str) -> Option<&str> {
        self.conversation(partner_id)
            .and_then(|c| c.chat_id.as_deref())
    }

    /// Find a message anywhere in the store
    pub fn find(&self, id: &MessageId) -> Option<&Message> {
        self.conversations
            .values()
            .flat_map(|c| c.messages.iter())
            .find(|m| &m.id == id)
    }

    /// Total number of stored messages
    pub fn len(&self) -> usize {
        self.conversations.values().map(|c| c.messages.len()).sum()
    }

    /// Whether the store holds no messages
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_server_id(&self, server_id: &str) -> bool {
        self.conversations
            .values()
            .any(|c| c.contains_server_id(server_id))
    }

    fn conversation_mut(&mut self, pair: ParticipantPair) -> &mut Conversation {
        self.conversations
            .entry(pair.clone())
            .or_insert_with(|| Conversation::new(pair))
    }

    fn is_echo_of(&self, pending: &Message, confirmed: &Message) -> bool {
        pending.is_pending()
            && pending.sender_id == confirmed.sender_id
            && pending.recipient_id == confirmed.recipient_id
            && pending.content == confirmed.content
            && within(pending.sent_at, confirmed.sent_at, self.match_window)
    }

    /// Replace the server-confirmed history with `partner_id` wholesale
    ///
    /// Duplicate server IDs in `history` are collapsed (first wins). Pending
    /// optimistic messages that the history does not confirm are kept after
    /// the fetched messages.
    pub fn replace_history(&mut self, partner_id: &str, history: Vec<Message>) {
        let pair = self.pair_with(partner_id);
        let pending: Vec<Message> = self
            .conversations
            .get(&pair)
            .map(|c| c.messages.iter().filter(|m| m.is_pending()).cloned().collect())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut messages: Vec<Message> = history
            .into_iter()
            .filter(|m| match m.id.server_id() {
                Some(id) => seen.insert(id.to_string()),
                None => true,
            })
            .collect();

        let mut claimed = vec![false; messages.len()];
        let mut unconfirmed = Vec::new();
        for optimistic in pending {
            let echo = messages
                .iter()
                .enumerate()
                .position(|(i, m)| !claimed[i] && self.is_echo_of(&optimistic, m));
            match echo {
                Some(i) => claimed[i] = true,
                None => unconfirmed.push(optimistic),
            }
        }

        let chat_id = messages.iter().find_map(|m| m.chat_id.clone());
        debug!(
            "Replacing history with {}: {} messages, {} still pending",
            partner_id,
            messages.len(),
            unconfirmed.len()
        );
        messages.extend(unconfirmed);

        let conversation = self.conversation_mut(pair);
        conversation.adopt_chat_id(chat_id.as_deref());
        conversation.messages = messages;
    }

    /// Insert a server-confirmed message
    ///
    /// Messages whose server ID is already stored are ignored. A message
    /// sent by the local user that echoes a pending optimistic message
    /// confirms that entry in place instead of adding a second one.
    pub fn append_incoming(&mut self, message: Message) -> AppendOutcome {
        if let Some(server_id) = message.id.server_id() {
            if self.contains_server_id(server_id) {
                debug!("Ignoring duplicate message {}", server_id);
                return AppendOutcome::Duplicate;
            }
        }

        let pair = ParticipantPair::new(message.sender_id.as_str(), message.recipient_id.as_str());
        let from_self = message.sender_id == self.self_id;
        let echo_index = if from_self {
            self.conversations.get(&pair).and_then(|c| {
                c.messages.iter().position(|m| self.is_echo_of(m, &message))
            })
        } else {
            None
        };

        let conversation = self.conversation_mut(pair);
        conversation.adopt_chat_id(message.chat_id.as_deref());

        match echo_index {
            Some(index) => {
                let local = &mut conversation.messages[index];
                debug!("Confirmed optimistic message {} as {}", local.id, message.id);
                local.id = message.id;
                local.chat_id = message.chat_id.or(local.chat_id.take());
                local.status = message.status;
                local.delivered_at = message.delivered_at;
                local.read_at = message.read_at;
                AppendOutcome::Reconciled
            }
            None => {
                conversation.messages.push(message);
                AppendOutcome::Appended
            }
        }
    }

    /// Insert a locally created message awaiting confirmation
    pub fn append_optimistic(&mut self, message: Message) {
        let pair = ParticipantPair::new(message.sender_id.as_str(), message.recipient_id.as_str());
        let conversation = self.conversation_mut(pair);
        conversation.adopt_chat_id(message.chat_id.as_deref());
        conversation.messages.push(message);
    }

    /// Set `status` on every stored message whose server ID is listed
    ///
    /// Returns the number of messages updated. Updates are applied in the
    /// order received; a later update always overwrites an earlier one.
    pub fn apply_status_update(
        &mut self,
        message_ids: &[String],
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> usize {
        let ids: HashSet<&str> = message_ids.iter().map(String::as_str).collect();
        let mut updated = 0;

        for conversation in self.conversations.values_mut() {
            for message in conversation.messages.iter_mut() {
                if message.id.server_id().is_some_and(|id| ids.contains(id)) {
                    message.apply_status(status, at);
                    updated += 1;
                }
            }
        }

        updated
    }
}

fn within(a: DateTime<Utc>, b: DateTime<Utc>, window: Duration) -> bool {
    (a - b).abs() <= window
}
