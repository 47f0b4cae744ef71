//! SPSHPAU Chat - real-time chat session client
//!
//! This library provides the chat core of the SPSHPAU collaboration platform:
//! a STOMP-over-WebSocket channel to the chat backend, an in-memory
//! conversation store with optimistic sends, conversation summaries,
//! partner presence, and the session controller that ties them together.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod config;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod transport;


/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable bearer credential, or the backend rejected it
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Channel transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed STOMP frame or unexpected channel traffic
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// REST collaborator returned an unsuccessful response
    #[error("API error: {0}")]
    Api(String),

    /// Message rejected before sending
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Operation requires an open channel
    #[error("Channel is not connected")]
    NotConnected,

    /// Configuration could not be loaded or saved
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Initialize logging for the chat client
///
/// Honors `RUST_LOG`; defaults to `info`. Safe to call more than once.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
