//! Client configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat client configuration
///
/// Stored as JSON. Every field has a default, so a partial file only
/// overrides what it names.
///
/// # Example
/// ```rust,no_run
/// use spshpau_chat::config::ChatConfig;
///
/// // Load config (returns defaults if the file doesn't exist)
/// let config = ChatConfig::load("chat.json").expect("Failed to load");
///
/// println!("Channel endpoint: {}", config.ws_url);
/// println!("Summary refresh: {:?}", config.summary_refresh_interval());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// WebSocket URL of the STOMP endpoint
    pub ws_url: String,
    /// Base URL of the REST gateway
    pub api_base_url: String,
    /// Summary list refresh period in milliseconds
    pub summary_refresh_interval_ms: u64,
    /// Open conversation poll period in milliseconds
    pub active_poll_interval_ms: u64,
    /// Delay before reconnecting after a lost or failed channel, in milliseconds
    pub reconnect_delay_ms: u64,
    /// Reconnect automatically after a lost or failed channel
    pub auto_reconnect: bool,
    /// Offered outgoing heartbeat interval in milliseconds (0 disables)
    pub heartbeat_outgoing_ms: u64,
    /// Requested incoming heartbeat interval in milliseconds (0 disables)
    pub heartbeat_incoming_ms: u64,
    /// Channel handshake timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Largest clock distance between an optimistic message and its echo, in milliseconds
    pub optimistic_match_window_ms: u64,
}

impl ChatConfig {
    /// Load configuration from a JSON file
    ///
    /// Returns the defaults if the file doesn't exist or is blank.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Summary list refresh period
    pub fn summary_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.summary_refresh_interval_ms)
    }

    /// Open conversation poll period
    pub fn active_poll_interval(&self) -> Duration {
        Duration::from_millis(self.active_poll_interval_ms)
    }

    /// Delay before an automatic reconnect
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Channel handshake timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Optimistic echo match window
    pub fn optimistic_match_window(&self) -> Duration {
        Duration::from_millis(self.optimistic_match_window_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8081/ws/websocket".to_string(),
            api_base_url: "http://localhost:8081".to_string(),
            summary_refresh_interval_ms: 5_000,
            active_poll_interval_ms: 5_000,
            reconnect_delay_ms: 5_000,
            auto_reconnect: true,
            heartbeat_outgoing_ms: 4_000,
            heartbeat_incoming_ms: 4_000,
            connect_timeout_ms: 10_000,
            optimistic_match_window_ms: 60_000,
        }
    }
}
