//! STOMP 1.2 frame codec
//!
//! Frames travel one per WebSocket text message. A message consisting only
//! of end-of-line characters is a heartbeat.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// STOMP frame command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Client connection request
    Connect,
    /// Client connection request (STOMP 1.2 spelling)
    Stomp,
    /// Broker accepted the connection
    Connected,
    /// Client publishes to a destination
    Send,
    /// Client subscribes to a destination
    Subscribe,
    /// Client cancels a subscription
    Unsubscribe,
    /// Client is leaving
    Disconnect,
    /// Broker delivers a message
    Message,
    /// Broker acknowledges a receipt request
    Receipt,
    /// Broker reports an error
    Error,
}

impl Command {
    /// Wire spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are not escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CONNECT" => Ok(Command::Connect),
            "STOMP" => Ok(Command::Stomp),
            "CONNECTED" => Ok(Command::Connected),
            "SEND" => Ok(Command::Send),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "DISCONNECT" => Ok(Command::Disconnect),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            other => Err(Error::Protocol(format!("Unknown STOMP command: {}", other))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame command
    pub command: Command,
    /// Headers in wire order (repeated names allowed; the first one wins)
    pub headers: Vec<(String, String)>,
    /// Frame body
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first header named `name`
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame carrying a bearer token
    pub fn connect(host: &str, bearer_token: &str, heartbeat: (u64, u64)) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.1,1.2")
            .header("host", host)
            .header("heart-beat", format!("{},{}", heartbeat.0, heartbeat.1))
            .header("Authorization", format!("Bearer {}", bearer_token))
    }

    /// SUBSCRIBE frame
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    /// SEND frame with a JSON body
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", body.len().to_string())
            .body(body)
    }

    /// DISCONNECT frame
    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    /// Heart-beat header as (outgoing, incoming) milliseconds
    pub fn heartbeat(&self) -> (u64, u64) {
        self.get_header("heart-beat")
            .and_then(|value| {
                let (x, y) = value.split_once(',')?;
                Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
            })
            .unwrap_or((0, 0))
    }

    /// Encode to wire text, NUL-terminated
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if self.command.escapes_headers() {
                out.push_str(&escape(name));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode one frame from wire text
    ///
    /// Returns `Ok(None)` for heartbeats.
    pub fn decode(input: &str) -> Result<Option<Frame>> {
        let input = input.trim_start_matches(['\r', '\n']);
        if input.is_empty() {
            return Ok(None);
        }

        let (command_line, mut rest) = split_line(input)
            .ok_or_else(|| Error::Protocol("Frame has no header terminator".to_string()))?;
        let command: Command = command_line.parse()?;

        let mut headers = Vec::new();
        loop {
            let (line, after) = split_line(rest)
                .ok_or_else(|| Error::Protocol("Unterminated frame headers".to_string()))?;
            rest = after;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Protocol(format!("Malformed header line: {}", line)))?;
            if command.escapes_headers() {
                headers.push((unescape(name)?, unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let frame = Frame {
            command,
            headers,
            body: String::new(),
        };

        let length = match frame.get_header("content-length") {
            Some(value) => Some(value.trim().parse::<usize>().map_err(|_| {
                Error::Protocol(format!("Invalid content-length: {}", value))
            })?),
            None => None,
        };

        let body = match length {
            Some(length) => {
                let body = rest
                    .get(..length)
                    .ok_or_else(|| Error::Protocol("Frame body shorter than content-length".to_string()))?;
                if !rest[length..].starts_with('\0') {
                    return Err(Error::Protocol("Frame body not NUL-terminated".to_string()));
                }
                body
            }
            None => {
                let end = rest
                    .find('\0')
                    .ok_or_else(|| Error::Protocol("Frame body not NUL-terminated".to_string()))?;
                &rest[..end]
            }
        };

        Ok(Some(Frame {
            body: body.to_string(),
            ..frame
        }))
    }
}

/// Negotiate heart-beat intervals
///
/// `client` is what this side offered, `server` what the broker answered in
/// CONNECTED. Returns (send every, expect traffic every); `None` disables.
pub fn negotiate_heartbeat(client: (u64, u64), server: (u64, u64)) -> (Option<Duration>, Option<Duration>) {
    let send = match (client.0, server.1) {
        (0, _) | (_, 0) => None,
        (cx, sy) => Some(Duration::from_millis(cx.max(sy))),
    };
    let receive = match (client.1, server.0) {
        (0, _) | (_, 0) => None,
        (cy, sx) => Some(Duration::from_millis(cy.max(sx))),
    };
    (send, receive)
}

fn split_line(input: &str) -> Option<(&str, &str)> {
    let index = input.find('\n')?;
    let line = input[..index].strip_suffix('\r').unwrap_or(&input[..index]);
    Some((line, &input[index + 1..]))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(Error::Protocol(format!(
                    "Invalid header escape sequence: \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}
