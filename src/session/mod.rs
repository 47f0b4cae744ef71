//! Chat session controller
//!
//! [`ChatSession`] owns all chat state for one signed-in user: the channel,
//! the conversation store, summaries, presence and the open conversation.
//! It is driven by a single event queue. Timers, channel I/O and REST
//! fetches run as tasks that post [`SessionEvent`]s back into it, so every
//! mutation happens through `&mut self`.
//!
//! ```rust,no_run
//! # async fn demo() -> spshpau_chat::Result<()> {
//! use spshpau_chat::api::RestChatApi;
//! use spshpau_chat::auth::{Credential, TokenStore, UserProfile};
//! use spshpau_chat::config::ChatConfig;
//! use spshpau_chat::session::ChatSession;
//! use spshpau_chat::transport::{StompTransport, TransportConfig};
//! use std::sync::Arc;
//!
//! let config = ChatConfig::default();
//! let credentials = Arc::new(TokenStore::new(Credential::new("token")));
//! let api = RestChatApi::new(&config.api_base_url, credentials.clone());
//! let transport = StompTransport::new(TransportConfig::from(&config));
//! let user = UserProfile::new("user-1", "alice");
//!
//! let mut session = ChatSession::new(config, user, transport, api, credentials);
//! session.connect().await?;
//! while let Some(event) = session.next_event().await {
//!     session.handle_event(event).await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod hooks;
pub mod subscriptions;
pub mod timers;

pub use hooks::{Pane, SessionSignal};
pub use subscriptions::{SubscriptionRegistry, Topic};
pub use timers::{SessionTimers, TimerHandle};

use crate::api::ChatApi;
use crate::auth::{CredentialProvider, UserProfile};
use crate::config::ChatConfig;
use crate::protocol::{
    self, ChatMessagePayload, DisconnectAnnouncement, MarkAsReadPayload, MessageRecord,
    PresenceAnnouncement, PresenceUpdate, StatusUpdate, ADD_USER_DESTINATION, CHAT_DESTINATION,
    DISCONNECT_USER_DESTINATION, MARK_AS_READ_DESTINATION,
};
use crate::storage::{
    AppendOutcome, ConversationStore, ConversationSummary, Message, MessageStatus, PresenceMap,
    PresenceStatus, SummaryList,
};
use crate::transport::{ChannelTransport, TransportEvent, TransportSink};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use hooks::SessionHooks;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No channel
    Disconnected,
    /// Channel requested, waiting for the broker
    Connecting,
    /// Channel established and subscribed
    Connected,
    /// The last connection attempt failed
    Errored,
}

/// Work item in the session queue
#[derive(Debug)]
pub enum SessionEvent {
    /// Something happened on the channel opened as `generation`
    Transport {
        /// Connection generation the event belongs to
        generation: u64,
        /// What happened
        event: TransportEvent,
    },
    /// Summary refresh timer fired
    SummaryRefreshDue,
    /// Poll timer fired for a conversation
    ActivePollDue {
        /// Conversation partner being polled
        partner_id: String,
    },
    /// Reconnect timer fired
    ReconnectDue,
    /// Summary fetch finished
    SummariesLoaded {
        /// Fetch epoch the request was issued in
        epoch: u64,
        /// When the request was issued
        requested_at: DateTime<Utc>,
        /// Fetched summaries
        result: Result<Vec<ConversationSummary>>,
    },
    /// History fetch finished
    HistoryLoaded {
        /// Fetch epoch the request was issued in
        epoch: u64,
        /// Conversation partner
        partner_id: String,
        /// Fetched history
        result: Result<Vec<MessageRecord>>,
    },
}

/// The conversation currently open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConversation {
    /// Conversation partner
    pub partner_id: String,
    /// Chat ID, once known
    pub chat_id: Option<String>,
}

/// Real-time chat session for one user
pub struct ChatSession<T, A, C> {
    config: ChatConfig,
    user: UserProfile,
    transport: T,
    api: Arc<A>,
    credentials: Arc<C>,

    state: SessionState,
    want_connected: bool,
    generation: u64,
    last_error: Option<String>,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    timers: SessionTimers,
    subscriptions: SubscriptionRegistry,
    hooks: SessionHooks,

    store: ConversationStore,
    summaries: SummaryList,
    presence: PresenceMap,
    active: Option<ActiveConversation>,
    pending_open: Option<String>,

    /// Bumped by `disconnect`; older fetch results are discarded
    fetch_epoch: u64,
    summary_in_flight: bool,
    history_in_flight: HashSet<String>,
    summary_error: Option<String>,
    history_error: Option<String>,
}

impl<T, A, C> ChatSession<T, A, C>
where
    T: ChannelTransport,
    A: ChatApi + 'static,
    C: CredentialProvider,
{
    /// Create a disconnected session for `user`
    pub fn new(config: ChatConfig, user: UserProfile, transport: T, api: A, credentials: Arc<C>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let store = ConversationStore::new(user.id.clone(), config.optimistic_match_window());

        Self {
            config,
            user,
            transport,
            api: Arc::new(api),
            credentials,
            state: SessionState::Disconnected,
            want_connected: false,
            generation: 0,
            last_error: None,
            events_tx,
            events_rx,
            timers: SessionTimers::default(),
            subscriptions: SubscriptionRegistry::new(),
            hooks: SessionHooks::default(),
            store,
            summaries: SummaryList::new(),
            presence: PresenceMap::new(),
            active: None,
            pending_open: None,
            fetch_epoch: 0,
            summary_in_flight: false,
            history_in_flight: HashSet::new(),
            summary_error: None,
            history_error: None,
        }
    }

    // ---- accessors ----

    /// Connection state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the channel is established
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// The local user
    pub fn user(&self) -> &UserProfile {
        &self.user
    }

    /// Session configuration
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// All stored conversations
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Messages exchanged with `partner_id`
    pub fn messages(&self, partner_id: &str) -> &[Message] {
        self.store.messages(partner_id)
    }

    /// Conversation summaries in display order
    pub fn summaries(&self) -> &SummaryList {
        &self.summaries
    }

    /// Presence of every known user
    pub fn presence(&self) -> &PresenceMap {
        &self.presence
    }

    /// The open conversation
    pub fn active_conversation(&self) -> Option<&ActiveConversation> {
        self.active.as_ref()
    }

    /// Last summary fetch error, cleared by the next success
    pub fn summary_error(&self) -> Option<&str> {
        self.summary_error.as_deref()
    }

    /// Last history fetch error for the open conversation
    pub fn history_error(&self) -> Option<&str> {
        self.history_error.as_deref()
    }

    /// Last connection error
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a summary fetch is in flight
    pub fn is_loading_summaries(&self) -> bool {
        self.summary_in_flight
    }

    /// Whether a history fetch for `partner_id` is in flight
    pub fn is_loading_history(&self, partner_id: &str) -> bool {
        self.history_in_flight.contains(partner_id)
    }

    /// Whether a reconnect is scheduled
    pub fn reconnect_pending(&self) -> bool {
        self.timers.reconnect_pending()
    }

    /// Partner whose conversation is being polled
    pub fn polling(&self) -> Option<&str> {
        self.timers.polling()
    }

    /// Whether the summary refresh timer is running
    pub fn is_refreshing_summaries(&self) -> bool {
        self.timers.is_refreshing()
    }

    // ---- hooks ----

    /// Observe new and confirmed messages
    pub fn set_message_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&Message) + Send + 'static,
    {
        self.hooks.message = Some(Box::new(handler));
    }

    /// Observe status updates
    pub fn set_status_update_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&StatusUpdate) + Send + 'static,
    {
        self.hooks.status_update = Some(Box::new(handler));
    }

    /// Observe presence broadcasts
    pub fn set_presence_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str, PresenceStatus) + Send + 'static,
    {
        self.hooks.presence = Some(Box::new(handler));
    }

    /// Observe session signals
    pub fn set_signal_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&SessionSignal) + Send + 'static,
    {
        self.hooks.signal = Some(Box::new(handler));
    }

    // ---- connection lifecycle ----

    /// Open the channel
    ///
    /// A fresh token is requested from the credential provider. Without one
    /// the session stays disconnected and is not retried. Calling this while
    /// connecting or connected does nothing.
    pub async fn connect(&mut self) -> Result<()> {
        if matches!(self.state, SessionState::Connecting | SessionState::Connected) {
            debug!("Connect requested while {:?}; ignoring", self.state);
            return Ok(());
        }

        self.want_connected = true;
        self.timers.cancel_reconnect();
        self.open_channel().await
    }

    async fn open_channel(&mut self) -> Result<()> {
        let token = match self.credentials.bearer_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("Cannot connect without a usable access token: {}", e);
                self.want_connected = false;
                self.state = SessionState::Disconnected;
                self.last_error = Some(e.to_string());
                self.hooks.signal(SessionSignal::AuthenticationFailed);
                return Err(match e {
                    Error::Authentication(_) => e,
                    other => Error::Authentication(other.to_string()),
                });
            }
        };

        self.generation += 1;
        self.state = SessionState::Connecting;
        info!("Connecting as {} (attempt {})", self.user.username, self.generation);

        let sink = TransportSink::new(self.generation, self.events_tx.clone());
        if let Err(e) = self.transport.open(&token, sink) {
            self.connection_failed(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Close the channel and stop every timer
    ///
    /// Conversations, summaries and the open conversation are kept. Fetches
    /// still in flight are abandoned and a pending open is forgotten.
    pub fn disconnect(&mut self) {
        self.want_connected = false;
        self.pending_open = None;
        self.fetch_epoch += 1;
        self.summary_in_flight = false;
        self.history_in_flight.clear();

        if self.state == SessionState::Connected {
            let announcement = DisconnectAnnouncement {
                user_id: self.user.id.clone(),
            };
            self.publish(DISCONNECT_USER_DESTINATION, &announcement);
        }

        self.timers.cancel_all();
        self.retire_channel();
        self.state = SessionState::Disconnected;
        info!("Disconnected");
    }

    /// Close the transport; events it already queued become stale
    fn retire_channel(&mut self) {
        self.transport.close();
        self.subscriptions.clear();
        self.generation += 1;
    }

    fn on_connected(&mut self) {
        if self.state != SessionState::Connecting {
            debug!("Ignoring connected event while {:?}", self.state);
            return;
        }

        if let Err(e) = self.subscriptions.establish(&mut self.transport, &self.user.id) {
            warn!("Failed to subscribe: {}", e);
            self.retire_channel();
            self.connection_failed(e.to_string());
            return;
        }

        self.state = SessionState::Connected;
        self.last_error = None;
        info!("Connected as {}", self.user.username);

        let announcement = PresenceAnnouncement::from(&self.user);
        self.publish(ADD_USER_DESTINATION, &announcement);

        self.request_summaries();
        self.timers
            .start_summary_refresh(self.config.summary_refresh_interval(), self.events_tx.clone());

        if let Some(partner_id) = self.active.as_ref().map(|a| a.partner_id.clone()) {
            self.timers.start_active_poll(
                &partner_id,
                self.config.active_poll_interval(),
                self.events_tx.clone(),
            );
            self.request_history(&partner_id);
        }

        self.hooks.signal(SessionSignal::Connected);
    }

    fn on_dropped(&mut self, reason: String) {
        match self.state {
            SessionState::Connected => {}
            SessionState::Connecting => {
                self.connection_failed(reason);
                return;
            }
            SessionState::Disconnected | SessionState::Errored => return,
        }

        warn!("Channel lost: {}", reason);
        self.state = SessionState::Disconnected;
        self.last_error = Some(reason);
        self.timers.cancel_periodic();
        self.subscriptions.clear();
        self.hooks.signal(SessionSignal::Disconnected);
        self.schedule_reconnect();
    }

    fn connection_failed(&mut self, reason: String) {
        warn!("Connection failed: {}", reason);
        self.state = SessionState::Errored;
        self.last_error = Some(reason.clone());
        self.timers.cancel_periodic();
        self.subscriptions.clear();
        self.hooks.signal(SessionSignal::ConnectionError(reason));
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.want_connected || !self.config.auto_reconnect {
            return;
        }
        info!("Reconnecting in {:?}", self.config.reconnect_delay());
        self.timers
            .schedule_reconnect(self.config.reconnect_delay(), self.events_tx.clone());
    }

    async fn on_reconnect_due(&mut self) {
        self.timers.cancel_reconnect();
        if !self.want_connected
            || matches!(self.state, SessionState::Connecting | SessionState::Connected)
        {
            return;
        }
        // Failures are reported through signals and rescheduling
        let _ = self.open_channel().await;
    }

    // ---- outbound ----

    fn publish<P: Serialize>(&mut self, destination: &str, payload: &P) -> bool {
        let body = match protocol::encode(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to encode payload for {}: {}", destination, e);
                return false;
            }
        };

        match self.transport.publish(destination, body) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to publish to {}: {}", destination, e);
                false
            }
        }
    }

    fn publish_mark_as_read(&mut self, chat_id: &str) {
        if !self.is_connected() {
            return;
        }
        debug!("Marking chat {} as read", chat_id);
        let payload = MarkAsReadPayload {
            chat_id: chat_id.to_string(),
        };
        self.publish(MARK_AS_READ_DESTINATION, &payload);
    }

    /// Send a message to `partner_id`
    ///
    /// The message is stored optimistically and returned at once. When the
    /// channel is down it stays local and unconfirmed.
    pub fn send(&mut self, partner_id: &str, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidMessage("Message content is empty".to_string()));
        }
        if partner_id.trim().is_empty() {
            return Err(Error::InvalidMessage("Message has no recipient".to_string()));
        }

        let chat_id = self.known_chat_id(partner_id);
        let message = Message::optimistic(&self.user.id, partner_id, chat_id, content);
        self.store.append_optimistic(message.clone());
        self.summaries
            .record_message(message.chat_id.as_deref(), partner_id, message.sent_at);

        if !self.is_connected() {
            warn!("Not connected; message {} kept locally", message.id);
            return Ok(message);
        }

        let payload = ChatMessagePayload {
            sender_id: self.user.id.clone(),
            recipient_id: partner_id.to_string(),
            content: content.to_string(),
        };
        if self.publish(CHAT_DESTINATION, &payload) {
            self.request_summaries();
        }
        Ok(message)
    }

    // ---- conversations ----

    fn known_chat_id(&self, partner_id: &str) -> Option<String> {
        self.store
            .chat_id(partner_id)
            .map(str::to_string)
            .or_else(|| self.summaries.get(partner_id).and_then(|s| s.chat_id.clone()))
    }

    fn is_open(&self, partner_id: &str) -> bool {
        self.active.as_ref().is_some_and(|a| a.partner_id == partner_id)
    }

    /// Open the conversation with `partner_id`
    pub fn select_conversation(&mut self, partner_id: &str) {
        if self.is_open(partner_id) {
            return;
        }

        self.timers.cancel_active_poll();
        self.history_error = None;

        let chat_id = self.known_chat_id(partner_id);
        info!("Opening conversation with {}", partner_id);
        self.active = Some(ActiveConversation {
            partner_id: partner_id.to_string(),
            chat_id: chat_id.clone(),
        });

        if let Some(chat_id) = chat_id {
            self.summaries.mark_opened(&chat_id);
            self.publish_mark_as_read(&chat_id);
        }

        self.request_history(partner_id);

        if self.is_connected() {
            self.timers.start_active_poll(
                partner_id,
                self.config.active_poll_interval(),
                self.events_tx.clone(),
            );
        }
    }

    /// Close the open conversation
    pub fn close_conversation(&mut self) {
        self.timers.cancel_active_poll();
        self.history_error = None;
        if let Some(active) = self.active.take() {
            debug!("Closed conversation with {}", active.partner_id);
        }
    }

    /// Open `partner_id` once it shows up in a summary load
    pub fn open_on_first_summaries(&mut self, partner_id: &str) {
        if self.summaries.get(partner_id).is_some() {
            self.select_conversation(partner_id);
        } else {
            self.pending_open = Some(partner_id.to_string());
        }
    }

    /// Re-fetch the open conversation's history
    pub fn reload_active_conversation(&mut self) {
        if let Some(partner_id) = self.active.as_ref().map(|a| a.partner_id.clone()) {
            self.request_history(&partner_id);
        }
    }

    /// Re-fetch the summary list
    pub fn refresh_summaries(&mut self) {
        self.request_summaries();
    }

    fn request_summaries(&mut self) {
        if self.summary_in_flight {
            debug!("Summary fetch already in flight");
            return;
        }
        self.summary_in_flight = true;

        let requested_at = Utc::now();
        let epoch = self.fetch_epoch;
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_conversation_summaries().await;
            let _ = tx.send(SessionEvent::SummariesLoaded {
                epoch,
                requested_at,
                result,
            });
        });
    }

    fn request_history(&mut self, partner_id: &str) {
        if !self.history_in_flight.insert(partner_id.to_string()) {
            debug!("History fetch for {} already in flight", partner_id);
            return;
        }

        let epoch = self.fetch_epoch;
        let api = self.api.clone();
        let tx = self.events_tx.clone();
        let self_id = self.user.id.clone();
        let partner_id = partner_id.to_string();
        tokio::spawn(async move {
            let result = api.fetch_message_history(&self_id, &partner_id).await;
            let _ = tx.send(SessionEvent::HistoryLoaded {
                epoch,
                partner_id,
                result,
            });
        });
    }

    fn on_summaries_loaded(&mut self, requested_at: DateTime<Utc>, result: Result<Vec<ConversationSummary>>) {
        self.summary_in_flight = false;

        let mut list = match result {
            Ok(list) => list,
            Err(e) => {
                self.fetch_failed(Pane::Summaries, e);
                return;
            }
        };

        self.summary_error = None;
        self.presence.seed_from_summaries(&list, requested_at);
        for summary in list.iter_mut() {
            summary.chat_partner.status = Some(self.presence.status(&summary.chat_partner.id));
        }
        debug!("Loaded {} conversation summaries", list.len());
        self.summaries.replace(list);

        if let Some(active) = self.active.as_mut() {
            if active.chat_id.is_none() {
                active.chat_id = self
                    .summaries
                    .get(&active.partner_id)
                    .and_then(|s| s.chat_id.clone());
            }
            if let Some(chat_id) = active.chat_id.as_deref() {
                self.summaries.mark_opened(chat_id);
            }
        }

        let ready = self
            .pending_open
            .as_deref()
            .is_some_and(|partner_id| self.summaries.get(partner_id).is_some());
        if ready {
            if let Some(partner_id) = self.pending_open.take() {
                self.select_conversation(&partner_id);
            }
        }
    }

    fn on_history_loaded(&mut self, partner_id: String, result: Result<Vec<MessageRecord>>) {
        self.history_in_flight.remove(&partner_id);

        if !self.is_open(&partner_id) {
            debug!("Discarding history for {}; conversation no longer open", partner_id);
            return;
        }

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                self.fetch_failed(Pane::History, e);
                return;
            }
        };

        self.history_error = None;
        let messages = records.into_iter().map(Message::from).collect();
        self.store.replace_history(&partner_id, messages);

        let chat_id = self.known_chat_id(&partner_id);
        if let Some(active) = self.active.as_mut() {
            if active.chat_id.is_none() {
                active.chat_id = chat_id.clone();
            }
        }

        let unread = self
            .store
            .messages(&partner_id)
            .iter()
            .any(|m| m.sender_id == partner_id && m.status != MessageStatus::Read);
        if unread {
            if let Some(chat_id) = chat_id {
                self.summaries.mark_opened(&chat_id);
                self.publish_mark_as_read(&chat_id);
            }
        }
    }

    fn fetch_failed(&mut self, pane: Pane, error: Error) {
        warn!("Failed to load {:?}: {}", pane, error);
        if matches!(error, Error::Authentication(_)) {
            self.hooks.signal(SessionSignal::AuthenticationFailed);
        }

        let message = error.to_string();
        match pane {
            Pane::Summaries => self.summary_error = Some(message.clone()),
            Pane::History => self.history_error = Some(message.clone()),
        }
        self.hooks.signal(SessionSignal::FetchFailed { pane, message });
    }

    // ---- inbound ----

    fn on_channel_message(&mut self, subscription: Option<&str>, destination: &str, body: &str) {
        match self.subscriptions.route(subscription, destination) {
            Some(Topic::Inbox) => self.on_inbox(body),
            Some(Topic::StatusUpdates) => self.on_status_update(body),
            Some(Topic::Presence) => self.on_presence(body),
            None => debug!(
                "Ignoring message for unrouted subscription {:?} on {}",
                subscription, destination
            ),
        }
    }

    fn on_inbox(&mut self, body: &str) {
        let record: MessageRecord = match protocol::decode(body) {
            Ok(record) => record,
            Err(e) => {
                warn!("Dropping undecodable chat message: {}", e);
                return;
            }
        };

        let message = Message::from(record);
        let partner_id = message.partner_of(&self.user.id).to_string();
        let to_self = message.recipient_id == self.user.id;

        let outcome = self.store.append_incoming(message.clone());
        if outcome == AppendOutcome::Duplicate {
            return;
        }

        let chat_id = message
            .chat_id
            .clone()
            .or_else(|| self.known_chat_id(&partner_id));
        if !self
            .summaries
            .record_message(chat_id.as_deref(), &partner_id, message.sent_at)
        {
            // First message of a conversation the list doesn't have yet
            self.request_summaries();
        }

        let open = self.is_open(&partner_id);
        if open {
            if let Some(active) = self.active.as_mut() {
                if active.chat_id.is_none() {
                    active.chat_id = chat_id.clone();
                }
            }
        }

        if to_self && outcome == AppendOutcome::Appended {
            match (open, chat_id.as_deref()) {
                (true, Some(chat_id)) => {
                    self.summaries.mark_opened(chat_id);
                    self.publish_mark_as_read(chat_id);
                }
                (true, None) => {}
                (false, chat_id) => {
                    self.summaries.bump_unread(chat_id, &partner_id);
                }
            }
        }

        let stored = self.store.find(&message.id).cloned().unwrap_or(message);
        self.hooks.message(&stored);
    }

    fn on_status_update(&mut self, body: &str) {
        let update: StatusUpdate = match protocol::decode(body) {
            Ok(update) => update,
            Err(e) => {
                warn!("Dropping undecodable status update: {}", e);
                return;
            }
        };

        let at = update.status_timestamp.unwrap_or_else(Utc::now);
        let updated = self
            .store
            .apply_status_update(&update.message_ids, update.new_status, at);
        debug!(
            "Status {} applied to {} of {} messages",
            update.new_status,
            updated,
            update.message_ids.len()
        );
        self.hooks.status_update(&update);
    }

    fn on_presence(&mut self, body: &str) {
        let update: PresenceUpdate = match protocol::decode(body) {
            Ok(update) => update,
            Err(e) => {
                warn!("Dropping undecodable presence update: {}", e);
                return;
            }
        };

        if self.presence.apply_live(&update.id, update.status, Utc::now()) {
            self.summaries.set_partner_status(&update.id, update.status);
        }
        self.hooks.presence(&update.id, update.status);
    }

    // ---- event loop ----

    /// Wait for the next queued event
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Handle every event already queued; returns how many were handled
    pub async fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.try_next_event() {
            self.handle_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Apply one event to the session
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Transport { generation, event } => {
                if generation != self.generation {
                    debug!("Ignoring event from closed connection {}", generation);
                    return;
                }
                match event {
                    TransportEvent::Connected => self.on_connected(),
                    TransportEvent::Message {
                        subscription,
                        destination,
                        body,
                    } => self.on_channel_message(subscription.as_deref(), &destination, &body),
                    TransportEvent::Disconnected { reason } => self.on_dropped(reason),
                    TransportEvent::ConnectFailed(reason) => {
                        if self.state == SessionState::Connecting {
                            self.connection_failed(reason);
                        }
                    }
                }
            }
            SessionEvent::SummaryRefreshDue => {
                if self.is_connected() {
                    self.request_summaries();
                }
            }
            SessionEvent::ActivePollDue { partner_id } => {
                if self.is_connected() && self.is_open(&partner_id) {
                    self.request_history(&partner_id);
                } else {
                    debug!("Ignoring stale poll for {}", partner_id);
                }
            }
            SessionEvent::ReconnectDue => self.on_reconnect_due().await,
            SessionEvent::SummariesLoaded { epoch, .. } | SessionEvent::HistoryLoaded { epoch, .. }
                if epoch != self.fetch_epoch =>
            {
                debug!("Discarding fetch result from before disconnect");
            }
            SessionEvent::SummariesLoaded {
                requested_at,
                result,
                ..
            } => self.on_summaries_loaded(requested_at, result),
            SessionEvent::HistoryLoaded {
                partner_id, result, ..
            } => self.on_history_loaded(partner_id, result),
        }
    }
}
