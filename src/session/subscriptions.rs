//! Subscription registry
//!
//! Maps subscriptions to the handler family that processes them.
//! Rebuilt from scratch on every (re)connect.
//!
//! Messages are routed by the `subscription` header the broker echoes
//! back. User destinations are rewritten by the broker on delivery
//! (`/user/{id}/queue/messages` arrives as `/user/queue/messages`), so the
//! destination is only a fallback for frames without that header.

use crate::protocol::{inbox_destination, status_updates_destination, PRESENCE_TOPIC};
use crate::transport::ChannelTransport;
use crate::Result;
use std::collections::HashMap;
use tracing::debug;

/// Inbound message family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Personal message queue
    Inbox,
    /// Personal status-update queue
    StatusUpdates,
    /// Global presence broadcasts
    Presence,
}

/// Destinations the session is subscribed to
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_subscription: HashMap<String, Topic>,
    by_destination: HashMap<String, Topic>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Destinations for `user_id`, in subscription order
    pub fn destinations(user_id: &str) -> [(Topic, String); 3] {
        [
            (Topic::Inbox, inbox_destination(user_id)),
            (Topic::StatusUpdates, status_updates_destination(user_id)),
            (Topic::Presence, PRESENCE_TOPIC.to_string()),
        ]
    }

    /// Subscribe to inbox, status updates and presence, in that order
    pub fn establish<T: ChannelTransport + ?Sized>(&mut self, transport: &mut T, user_id: &str) -> Result<()> {
        self.clear();
        for (topic, destination) in Self::destinations(user_id) {
            let id = transport.subscribe(&destination)?;
            debug!("Subscription {} routes {} to {:?}", id, destination, topic);
            self.by_subscription.insert(id, topic);
            self.by_destination.insert(destination, topic);
        }
        Ok(())
    }

    /// Handler family for a delivered message
    ///
    /// A known subscription ID decides; an unknown one is not routed.
    pub fn route(&self, subscription: Option<&str>, destination: &str) -> Option<Topic> {
        match subscription {
            Some(id) => self.by_subscription.get(id).copied(),
            None => self.by_destination.get(destination).copied(),
        }
    }

    /// Forget every subscription
    pub fn clear(&mut self) {
        self.by_subscription.clear();
        self.by_destination.clear();
    }

    /// Number of active subscriptions
    pub fn len(&self) -> usize {
        self.by_subscription.len()
    }

    /// Whether there are no active subscriptions
    pub fn is_empty(&self) -> bool {
        self.by_subscription.is_empty()
    }
}
