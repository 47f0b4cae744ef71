//! Partner presence tracking

use crate::storage::summary::ConversationSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Online status of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PresenceStatus {
    /// Connected to the chat backend
    Online,
    /// Not connected (default for users never seen online)
    #[default]
    Offline,
}

/// Where a presence observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceSource {
    /// Partner status carried in a summary refresh
    Summary,
    /// Broadcast on the presence topic
    Live,
}

#[derive(Debug, Clone, Copy)]
struct PresenceEntry {
    status: PresenceStatus,
    observed_at: DateTime<Utc>,
    source: PresenceSource,
}

/// Presence of every user the session has heard about
///
/// Observations are last-write-wins by observation time. A summary
/// refresh counts as observed when its request was issued, so a live
/// broadcast received while the request was in flight is not overwritten
/// by the older snapshot.
#[derive(Debug, Clone, Default)]
pub struct PresenceMap {
    entries: HashMap<String, PresenceEntry>,
}

impl PresenceMap {
    /// Create an empty presence map
    pub fn new() -> Self {
        Self::default()
    }

    /// Presence of `user_id`; unknown users are offline
    pub fn status(&self, user_id: &str) -> PresenceStatus {
        self.entries
            .get(user_id)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    /// Source of the current observation for `user_id`
    pub fn source(&self, user_id: &str) -> Option<PresenceSource> {
        self.entries.get(user_id).map(|e| e.source)
    }

    /// Record an observation; returns whether it was applied
    pub fn observe(
        &mut self,
        user_id: &str,
        status: PresenceStatus,
        observed_at: DateTime<Utc>,
        source: PresenceSource,
    ) -> bool {
        if let Some(existing) = self.entries.get(user_id) {
            let stale = existing.observed_at > observed_at
                || (existing.observed_at == observed_at
                    && existing.source == PresenceSource::Live
                    && source == PresenceSource::Summary);
            if stale {
                return false;
            }
        }

        self.entries.insert(
            user_id.to_string(),
            PresenceEntry {
                status,
                observed_at,
                source,
            },
        );
        true
    }

    /// Record a broadcast from the presence topic
    pub fn apply_live(&mut self, user_id: &str, status: PresenceStatus, at: DateTime<Utc>) -> bool {
        self.observe(user_id, status, at, PresenceSource::Live)
    }

    /// Merge partner presence carried by a summary refresh
    ///
    /// Partners without a reported status are only recorded (as offline)
    /// when nothing is known about them yet.
    pub fn seed_from_summaries(&mut self, summaries: &[ConversationSummary], observed_at: DateTime<Utc>) {
        for summary in summaries {
            let partner = &summary.chat_partner;
            match partner.status {
                Some(status) => {
                    self.observe(&partner.id, status, observed_at, PresenceSource::Summary);
                }
                None if !self.entries.contains_key(&partner.id) => {
                    self.observe(
                        &partner.id,
                        PresenceStatus::Offline,
                        observed_at,
                        PresenceSource::Summary,
                    );
                }
                None => {}
            }
        }
    }

    /// Number of users currently online
    pub fn online_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.status == PresenceStatus::Online)
            .count()
    }
}
