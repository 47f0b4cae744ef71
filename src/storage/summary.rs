//! Conversation summaries shown in the chat list

use crate::storage::presence::PresenceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The other participant of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatPartner {
    /// User ID
    pub id: String,
    /// Username
    pub username: String,
    /// Given name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Presence reported with the summary
    #[serde(default)]
    pub status: Option<PresenceStatus>,
}

impl ChatPartner {
    /// Full name when known, otherwise the username
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();

        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Condensed per-partner record for the chat list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Conversation partner
    pub chat_partner: ChatPartner,
    /// Chat ID, absent until the first message
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Time of the latest message, absent for empty conversations
    #[serde(default)]
    pub latest_message_timestamp: Option<DateTime<Utc>>,
    /// Messages to the local user not yet read
    #[serde(default)]
    pub unread_count: u64,
}

/// Ordered list of conversation summaries
///
/// Always sorted by latest-message time, newest first; conversations
/// without messages come last.
#[derive(Debug, Clone, Default)]
pub struct SummaryList {
    summaries: Vec<ConversationSummary>,
}

impl SummaryList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list wholesale with a fresh server snapshot
    pub fn replace(&mut self, summaries: Vec<ConversationSummary>) {
        self.summaries = summaries;
        self.sort();
    }

    fn sort(&mut self) {
        // Option orders None first, so descending puts empty conversations last
        self.summaries
            .sort_by(|a, b| b.latest_message_timestamp.cmp(&a.latest_message_timestamp));
    }

    /// Summaries in display order
    pub fn iter(&self) -> impl Iterator<Item = &ConversationSummary> {
        self.summaries.iter()
    }

    /// Summaries in display order
    pub fn as_slice(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    /// Number of summaries
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Summary for a partner
    pub fn get(&self, partner_id: &str) -> Option<&ConversationSummary> {
        self.summaries.iter().find(|s| s.chat_partner.id == partner_id)
    }

    /// Summary for a chat ID
    pub fn get_by_chat(&self, chat_id: &str) -> Option<&ConversationSummary> {
        self.summaries
            .iter()
            .find(|s| s.chat_id.as_deref() == Some(chat_id))
    }

    fn position(&self, chat_id: Option<&str>, partner_id: &str) -> Option<usize> {
        chat_id
            .and_then(|id| {
                self.summaries
                    .iter()
                    .position(|s| s.chat_id.as_deref() == Some(id))
            })
            .or_else(|| {
                self.summaries
                    .iter()
                    .position(|s| s.chat_id.is_none() && s.chat_partner.id == partner_id)
            })
    }

    /// Zero the unread counter of a conversation the user just opened
    pub fn mark_opened(&mut self, chat_id: &str) -> bool {
        match self.summaries.iter_mut().find(|s| s.chat_id.as_deref() == Some(chat_id)) {
            Some(summary) => {
                summary.unread_count = 0;
                true
            }
            None => false,
        }
    }

    /// Count one more unread message for a conversation not currently open
    ///
    /// Matches by chat ID, falling back to the partner for summaries that
    /// have no chat ID yet.
    pub fn bump_unread(&mut self, chat_id: Option<&str>, partner_id: &str) -> bool {
        match self.position(chat_id, partner_id) {
            Some(index) => {
                self.summaries[index].unread_count += 1;
                true
            }
            None => false,
        }
    }

    /// Reflect a new message in the matching summary
    ///
    /// Advances the latest-message time, fills in a missing chat ID and
    /// re-sorts. Partners without a summary are left for the next refresh.
    pub fn record_message(&mut self, chat_id: Option<&str>, partner_id: &str, at: DateTime<Utc>) -> bool {
        let Some(index) = self.position(chat_id, partner_id) else {
            return false;
        };

        let summary = &mut self.summaries[index];
        if summary.chat_id.is_none() {
            summary.chat_id = chat_id.map(str::to_string);
        }
        if summary.latest_message_timestamp.is_none_or(|latest| latest < at) {
            summary.latest_message_timestamp = Some(at);
        }
        self.sort();
        true
    }

    /// Update the presence shown for a partner
    pub fn set_partner_status(&mut self, partner_id: &str, status: PresenceStatus) -> bool {
        let mut changed = false;
        for summary in self.summaries.iter_mut().filter(|s| s.chat_partner.id == partner_id) {
            summary.chat_partner.status = Some(status);
            changed = true;
        }
        changed
    }

    /// Sum of unread counters
    pub fn unread_total(&self) -> u64 {
        self.summaries.iter().map(|s| s.unread_count).sum()
    }
}
