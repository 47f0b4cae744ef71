//! Observer hooks and session signals

use crate::protocol::StatusUpdate;
use crate::storage::{Message, PresenceStatus};
use std::fmt;

/// Called for every new or confirmed message
pub type MessageHandler = Box<dyn FnMut(&Message) + Send>;

/// Called for every status update received
pub type StatusUpdateHandler = Box<dyn FnMut(&StatusUpdate) + Send>;

/// Called for every presence broadcast received
pub type PresenceHandler = Box<dyn FnMut(&str, PresenceStatus) + Send>;

/// Called for every session signal
pub type SignalHandler = Box<dyn FnMut(&SessionSignal) + Send>;

/// UI pane a fetch error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    /// Conversation list
    Summaries,
    /// Open conversation
    History,
}

/// Session-level notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    /// Channel established and subscriptions in place
    Connected,
    /// Established channel lost
    Disconnected,
    /// No usable credential, or the backend rejected it
    AuthenticationFailed,
    /// Channel could not be established
    ConnectionError(String),
    /// A REST fetch failed
    FetchFailed {
        /// Pane whose data could not be loaded
        pane: Pane,
        /// Error text
        message: String,
    },
}

/// Registered observers
#[derive(Default)]
pub struct SessionHooks {
    pub(crate) message: Option<MessageHandler>,
    pub(crate) status_update: Option<StatusUpdateHandler>,
    pub(crate) presence: Option<PresenceHandler>,
    pub(crate) signal: Option<SignalHandler>,
}

impl SessionHooks {
    pub(crate) fn message(&mut self, message: &Message) {
        if let Some(handler) = self.message.as_mut() {
            handler(message);
        }
    }

    pub(crate) fn status_update(&mut self, update: &StatusUpdate) {
        if let Some(handler) = self.status_update.as_mut() {
            handler(update);
        }
    }

    pub(crate) fn presence(&mut self, user_id: &str, status: PresenceStatus) {
        if let Some(handler) = self.presence.as_mut() {
            handler(user_id, status);
        }
    }

    pub(crate) fn signal(&mut self, signal: SessionSignal) {
        if let Some(handler) = self.signal.as_mut() {
            handler(&signal);
        }
    }
}

impl fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHooks")
            .field("message", &self.message.is_some())
            .field("status_update", &self.status_update.is_some())
            .field("presence", &self.presence.is_some())
            .field("signal", &self.signal.is_some())
            .finish()
    }
}
