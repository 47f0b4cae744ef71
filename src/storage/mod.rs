//! In-memory chat state
//!
//! The module is organized into submodules:
//! - `message` - Message structures, identifiers and delivery status
//! - `conversation` - Conversation identity (participant pairs)
//! - `conversation_store` - Message lists per conversation, dedup and optimistic reconciliation
//! - `summary` - Conversation summaries for the chat list
//! - `presence` - Partner presence tracking

// Submodules
pub mod conversation;
pub mod conversation_store;
pub mod message;
pub mod presence;
pub mod summary;

// Re-export commonly used types
pub use conversation::{Conversation, ParticipantPair};
pub use conversation_store::{AppendOutcome, ConversationStore};
pub use message::{Message, MessageId, MessageStatus};
pub use presence::{PresenceMap, PresenceSource, PresenceStatus};
pub use summary::{ChatPartner, ConversationSummary, SummaryList};
