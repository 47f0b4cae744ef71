//! Channel transport module
//!
//! This module handles the bidirectional channel to the chat backend:
//! - STOMP frame encoding and decoding (`stomp`)
//! - STOMP over WebSocket with heartbeats (`websocket`)
//! - Delivery of channel events into the session's event queue

pub mod stomp;
pub mod websocket;

pub use websocket::{StompTransport, TransportConfig};

use crate::session::SessionEvent;
use crate::Result;
use tokio::sync::mpsc;

/// Something that happened on the channel
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The broker accepted the connection
    Connected,
    /// A message arrived on a subscribed destination
    Message {
        /// ID of the subscription the broker delivered on
        subscription: Option<String>,
        /// Destination the message was published to
        destination: String,
        /// Raw message body
        body: String,
    },
    /// An established channel was lost
    Disconnected {
        /// Human-readable cause
        reason: String,
    },
    /// The channel could not be established
    ConnectFailed(String),
}

/// Handle a transport uses to report events to its session
///
/// Every sink is stamped with the connection generation it was created
/// for, so the session can discard events from channels it already closed.
#[derive(Debug, Clone)]
pub struct TransportSink {
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl TransportSink {
    /// Create a sink for one connection attempt
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { generation, tx }
    }

    /// Connection generation this sink belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event; returns false once the session is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent::Transport {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// A bidirectional publish/subscribe channel
///
/// `open` only starts the connection; the outcome arrives through the sink
/// as [`TransportEvent::Connected`] or [`TransportEvent::ConnectFailed`].
pub trait ChannelTransport: Send {
    /// Start connecting with the given bearer token
    fn open(&mut self, bearer_token: &str, sink: TransportSink) -> Result<()>;

    /// Subscribe to a destination; returns the subscription ID
    fn subscribe(&mut self, destination: &str) -> Result<String>;

    /// Publish a JSON body to a destination
    ///
    /// Fails with [`crate::Error::NotConnected`] when the channel is not open.
    fn publish(&mut self, destination: &str, body: String) -> Result<()>;

    /// Close the channel; no further events are reported
    fn close(&mut self);

    /// Whether the channel is established
    fn is_open(&self) -> bool;
}
