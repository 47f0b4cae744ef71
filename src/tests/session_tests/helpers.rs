// Session test fixtures: in-memory transport and REST fakes

use crate::api::ChatApi;
use crate::auth::{Credential, TokenStore, UserProfile};
use crate::config::ChatConfig;
use crate::protocol::{self, MessageRecord, StatusUpdate};
use crate::session::{ChatSession, SessionSignal};
use crate::storage::{ChatPartner, ConversationSummary, Message, MessageStatus, PresenceStatus};
use crate::transport::{ChannelTransport, TransportEvent, TransportSink};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub(super) const ME: &str = "u-alice";
pub(super) const BOB: &str = "u-bob";
pub(super) const CAROL: &str = "u-carol";

// Transport fake

#[derive(Default)]
pub(super) struct TransportLog {
    pub tokens: Vec<String>,
    pub sinks: Vec<TransportSink>,
    /// "subscribe:<destination>" and "publish:<destination>" in call order
    pub actions: Vec<String>,
    pub published: Vec<(String, String)>,
    /// Latest subscription ID per destination
    pub subscription_ids: HashMap<String, String>,
    pub closes: usize,
    pub open: bool,
    pub fail_open: bool,
}

#[derive(Clone, Default)]
pub(super) struct MockTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl MockTransport {
    pub fn log(&self) -> MutexGuard<'_, TransportLog> {
        self.log.lock().expect("transport log poisoned")
    }

    fn emit(&self, event: TransportEvent) {
        let sink = self.log().sinks.last().cloned().expect("transport was never opened");
        sink.emit(event);
    }

    /// Broker accepts the latest connection attempt
    pub fn accept(&self) {
        self.log().open = true;
        self.emit(TransportEvent::Connected);
    }

    /// Latest connection attempt fails
    pub fn fail_connect(&self, reason: &str) {
        self.emit(TransportEvent::ConnectFailed(reason.to_string()));
    }

    /// Established connection is lost
    pub fn drop_connection(&self, reason: &str) {
        self.log().open = false;
        self.emit(TransportEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Broker pushes `body` on `destination`, tagged with its subscription
    pub fn deliver(&self, destination: &str, body: impl Into<String>) {
        let subscription = self.log().subscription_ids.get(destination).cloned();
        self.emit(TransportEvent::Message {
            subscription,
            destination: destination.to_string(),
            body: body.into(),
        });
    }

    /// Broker pushes on the subscription for `subscribed`, reporting the
    /// rewritten `delivered_to` destination the way user queues arrive
    pub fn deliver_rewritten(&self, subscribed: &str, delivered_to: &str, body: impl Into<String>) {
        let subscription = self.log().subscription_ids.get(subscribed).cloned();
        assert!(subscription.is_some(), "not subscribed to {}", subscribed);
        self.emit(TransportEvent::Message {
            subscription,
            destination: delivered_to.to_string(),
            body: body.into(),
        });
    }

    /// Bodies published to `destination`
    pub fn published_to(&self, destination: &str) -> Vec<serde_json::Value> {
        self.log()
            .published
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, body)| serde_json::from_str(body).expect("published body is JSON"))
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.log()
            .actions
            .iter()
            .filter_map(|a| a.strip_prefix("subscribe:").map(str::to_string))
            .collect()
    }
}

impl ChannelTransport for MockTransport {
    fn open(&mut self, bearer_token: &str, sink: TransportSink) -> Result<()> {
        let mut log = self.log();
        log.tokens.push(bearer_token.to_string());
        if log.fail_open {
            return Err(Error::Transport("open refused".to_string()));
        }
        log.sinks.push(sink);
        log.open = false;
        Ok(())
    }

    fn subscribe(&mut self, destination: &str) -> Result<String> {
        let mut log = self.log();
        if !log.open {
            return Err(Error::NotConnected);
        }
        log.actions.push(format!("subscribe:{}", destination));
        let id = format!("sub-{}", log.actions.len());
        log.subscription_ids.insert(destination.to_string(), id.clone());
        Ok(id)
    }

    fn publish(&mut self, destination: &str, body: String) -> Result<()> {
        let mut log = self.log();
        if !log.open {
            return Err(Error::NotConnected);
        }
        log.actions.push(format!("publish:{}", destination));
        log.published.push((destination.to_string(), body));
        Ok(())
    }

    fn close(&mut self) {
        let mut log = self.log();
        log.closes += 1;
        log.open = false;
    }

    fn is_open(&self) -> bool {
        self.log().open
    }
}

// REST fake

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Failure {
    Unauthorized,
    Unavailable,
}

impl Failure {
    fn into_error(self) -> Error {
        match self {
            Failure::Unauthorized => Error::Authentication("401".to_string()),
            Failure::Unavailable => Error::Api("503 Service Unavailable".to_string()),
        }
    }
}

#[derive(Default)]
pub(super) struct ApiState {
    pub summaries: Vec<ConversationSummary>,
    pub histories: HashMap<String, Vec<MessageRecord>>,
    pub summary_failure: Option<Failure>,
    pub history_failure: Option<Failure>,
    pub summary_calls: usize,
    pub history_calls: Vec<String>,
}

#[derive(Clone, Default)]
pub(super) struct MockApi {
    state: Arc<Mutex<ApiState>>,
}

impl MockApi {
    pub fn state(&self) -> MutexGuard<'_, ApiState> {
        self.state.lock().expect("api state poisoned")
    }

    pub fn history_calls_for(&self, partner_id: &str) -> usize {
        self.state()
            .history_calls
            .iter()
            .filter(|p| p.as_str() == partner_id)
            .count()
    }
}

impl ChatApi for MockApi {
    async fn fetch_conversation_summaries(&self) -> Result<Vec<ConversationSummary>> {
        let mut state = self.state();
        state.summary_calls += 1;
        match state.summary_failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(state.summaries.clone()),
        }
    }

    async fn fetch_message_history(&self, self_id: &str, partner_id: &str) -> Result<Vec<MessageRecord>> {
        assert_eq!(self_id, ME);
        let mut state = self.state();
        state.history_calls.push(partner_id.to_string());
        match state.history_failure {
            Some(failure) => Err(failure.into_error()),
            None => Ok(state.histories.get(partner_id).cloned().unwrap_or_default()),
        }
    }
}

// Payload builders

pub(super) fn summary(
    partner_id: &str,
    chat_id: Option<&str>,
    latest: Option<DateTime<Utc>>,
    unread: u64,
    status: Option<PresenceStatus>,
) -> ConversationSummary {
    ConversationSummary {
        chat_partner: ChatPartner {
            id: partner_id.to_string(),
            username: partner_id.trim_start_matches("u-").to_string(),
            first_name: None,
            last_name: None,
            status,
        },
        chat_id: chat_id.map(str::to_string),
        latest_message_timestamp: latest,
        unread_count: unread,
    }
}

pub(super) fn record(id: &str, chat_id: &str, from: &str, to: &str, content: &str) -> MessageRecord {
    MessageRecord {
        id: id.to_string(),
        chat_id: Some(chat_id.to_string()),
        sender_id: from.to_string(),
        recipient_id: to.to_string(),
        content: content.to_string(),
        status: MessageStatus::Sent,
        sent_at: Utc::now(),
        status_timestamp: None,
        delivered_at: None,
        read_at: None,
    }
}

pub(super) fn status_update(ids: &[&str], status: MessageStatus) -> StatusUpdate {
    StatusUpdate {
        chat_id: None,
        message_ids: ids.iter().map(|id| id.to_string()).collect(),
        new_status: status,
        status_timestamp: None,
        updated_by_user_id: Some(BOB.to_string()),
    }
}

pub(super) fn json<T: Serialize>(payload: &T) -> String {
    protocol::encode(payload).expect("payload encodes")
}

// Harness

pub(super) type TestSession = ChatSession<MockTransport, MockApi, TokenStore>;

pub(super) struct Harness {
    pub session: TestSession,
    pub transport: MockTransport,
    pub api: MockApi,
    pub credentials: Arc<TokenStore>,
    pub signals: Arc<Mutex<Vec<SessionSignal>>>,
    pub messages: Arc<Mutex<Vec<Message>>>,
    pub status_updates: Arc<Mutex<Vec<StatusUpdate>>>,
    pub presence_events: Arc<Mutex<Vec<(String, PresenceStatus)>>>,
}

pub(super) fn harness() -> Harness {
    harness_with(ChatConfig::default(), Some(Credential::new("token-1")))
}

pub(super) fn harness_with(config: ChatConfig, credential: Option<Credential>) -> Harness {
    let transport = MockTransport::default();
    let api = MockApi::default();
    let credentials = Arc::new(match credential {
        Some(credential) => TokenStore::new(credential),
        None => TokenStore::empty(),
    });

    let mut session = ChatSession::new(
        config,
        UserProfile::new(ME, "alice"),
        transport.clone(),
        api.clone(),
        credentials.clone(),
    );

    let signals = Arc::new(Mutex::new(Vec::new()));
    let messages = Arc::new(Mutex::new(Vec::new()));
    let status_updates = Arc::new(Mutex::new(Vec::new()));
    let presence_events = Arc::new(Mutex::new(Vec::new()));

    let sink = signals.clone();
    session.set_signal_handler(move |signal| sink.lock().expect("signals").push(signal.clone()));
    let sink = messages.clone();
    session.set_message_handler(move |message| sink.lock().expect("messages").push(message.clone()));
    let sink = status_updates.clone();
    session.set_status_update_handler(move |update| sink.lock().expect("updates").push(update.clone()));
    let sink = presence_events.clone();
    session.set_presence_handler(move |user_id, status| {
        sink.lock().expect("presence").push((user_id.to_string(), status))
    });

    Harness {
        session,
        transport,
        api,
        credentials,
        signals,
        messages,
        status_updates,
        presence_events,
    }
}

impl Harness {
    /// Let spawned fetches finish and handle everything they queued
    pub async fn settle(&mut self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
            self.session.run_pending().await;
        }
    }

    /// Connect and let the broker accept
    pub async fn connect(&mut self) {
        self.session.connect().await.expect("connect");
        self.settle().await;
        self.transport.accept();
        self.settle().await;
    }

    /// Move the paused clock forward and process what fired
    pub async fn advance(&mut self, by: Duration) {
        tokio::time::sleep(by).await;
        self.settle().await;
    }

    /// Move the clock just past one poll/refresh period
    pub async fn advance_period(&mut self) {
        self.advance(Duration::from_millis(5_100)).await;
    }

    pub fn signals(&self) -> Vec<SessionSignal> {
        self.signals.lock().expect("signals").clone()
    }

    pub fn delivered(&self) -> Vec<Message> {
        self.messages.lock().expect("messages").clone()
    }

    pub fn unread(&self, partner_id: &str) -> Option<u64> {
        self.session.summaries().get(partner_id).map(|s| s.unread_count)
    }
}
