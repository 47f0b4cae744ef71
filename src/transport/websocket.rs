//! STOMP over WebSocket
//!
//! One spawned task owns the socket. The handle talks to it through an
//! unbounded frame queue; the task reports back through a [`TransportSink`].

use crate::config::ChatConfig;
use crate::transport::stomp::{negotiate_heartbeat, Command, Frame};
use crate::transport::{ChannelTransport, TransportEvent, TransportSink};
use crate::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection parameters for [`StompTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// WebSocket URL of the STOMP endpoint
    pub url: String,
    /// Value of the CONNECT `host` header
    pub host: String,
    /// Offered outgoing heartbeat interval in milliseconds (0 disables)
    pub heartbeat_outgoing_ms: u64,
    /// Requested incoming heartbeat interval in milliseconds (0 disables)
    pub heartbeat_incoming_ms: u64,
    /// Limit for the WebSocket and STOMP handshakes together
    pub connect_timeout: Duration,
}

impl TransportConfig {
    /// Config for `url` with heartbeats disabled
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            host: host_of(&url),
            url,
            heartbeat_outgoing_ms: 0,
            heartbeat_incoming_ms: 0,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ChatConfig> for TransportConfig {
    fn from(config: &ChatConfig) -> Self {
        Self {
            url: config.ws_url.clone(),
            host: host_of(&config.ws_url),
            heartbeat_outgoing_ms: config.heartbeat_outgoing_ms,
            heartbeat_incoming_ms: config.heartbeat_incoming_ms,
            connect_timeout: config.connect_timeout(),
        }
    }
}

fn host_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
        _ => authority.to_string(),
    }
}

/// [`ChannelTransport`] speaking STOMP 1.2 over a WebSocket
pub struct StompTransport {
    config: TransportConfig,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    task: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    next_subscription: u64,
}

impl StompTransport {
    /// Create a closed transport
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            outbound: None,
            task: None,
            connected: Arc::new(AtomicBool::new(false)),
            next_subscription: 0,
        }
    }

    fn send_frame(&self, frame: Frame) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(Error::NotConnected)?;
        outbound
            .send(frame)
            .map_err(|_| Error::Transport("Connection task has stopped".to_string()))
    }
}

impl ChannelTransport for StompTransport {
    fn open(&mut self, bearer_token: &str, sink: TransportSink) -> Result<()> {
        self.close();

        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_connection(
            self.config.clone(),
            bearer_token.to_string(),
            rx,
            sink,
            connected.clone(),
        ));

        self.outbound = Some(tx);
        self.task = Some(task);
        self.connected = connected;
        self.next_subscription = 0;
        Ok(())
    }

    fn subscribe(&mut self, destination: &str) -> Result<String> {
        let id = format!("sub-{}", self.next_subscription);
        self.send_frame(Frame::subscribe(&id, destination))?;
        self.next_subscription += 1;
        debug!("Subscribed {} to {}", id, destination);
        Ok(id)
    }

    fn publish(&mut self, destination: &str, body: String) -> Result<()> {
        self.send_frame(Frame::send(destination, body))
    }

    fn close(&mut self) {
        let was_open = self.connected.swap(false, Ordering::SeqCst);
        if let Some(outbound) = self.outbound.take() {
            if was_open {
                let _ = outbound.send(Frame::disconnect());
            }
            // Dropping the sender lets the task flush, close the socket and exit
        }
        if let Some(task) = self.task.take() {
            if !was_open {
                task.abort();
            }
        }
    }

    fn is_open(&self) -> bool {
        self.outbound.is_some() && self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for StompTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    config: TransportConfig,
    bearer_token: String,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    sink: TransportSink,
    connected: Arc<AtomicBool>,
) {
    let handshake = tokio::time::timeout(config.connect_timeout, handshake(&config, &bearer_token)).await;
    let (stream, send_every, receive_every) = match handshake {
        Ok(Ok(established)) => established,
        Ok(Err(e)) => {
            warn!("Failed to connect to {}: {}", config.url, e);
            sink.emit(TransportEvent::ConnectFailed(e.to_string()));
            return;
        }
        Err(_) => {
            warn!("Connecting to {} timed out", config.url);
            sink.emit(TransportEvent::ConnectFailed(format!(
                "Connection timed out after {:?}",
                config.connect_timeout
            )));
            return;
        }
    };

    info!(
        "Connection {} to {} established (heartbeat send {:?}, receive {:?})",
        sink.generation(),
        config.url,
        send_every,
        receive_every
    );
    connected.store(true, Ordering::SeqCst);
    sink.emit(TransportEvent::Connected);

    let reason = pump(stream, &mut outbound, &sink, send_every, receive_every).await;
    connected.store(false, Ordering::SeqCst);

    match reason {
        Some(reason) => {
            warn!("Connection {} to {} lost: {}", sink.generation(), config.url, reason);
            sink.emit(TransportEvent::Disconnected { reason });
        }
        None => debug!("Connection {} to {} closed", sink.generation(), config.url),
    }
}

async fn handshake(
    config: &TransportConfig,
    bearer_token: &str,
) -> Result<(WsStream, Option<Duration>, Option<Duration>)> {
    let (mut stream, _response) = connect_async(config.url.as_str()).await?;

    let offered = (config.heartbeat_outgoing_ms, config.heartbeat_incoming_ms);
    let connect = Frame::connect(&config.host, bearer_token, offered);
    stream.send(WsMessage::Text(connect.encode())).await?;

    while let Some(message) = stream.next().await {
        let text = match message? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let Some(frame) = Frame::decode(&text)? else {
            continue;
        };

        match frame.command {
            Command::Connected => {
                let (send_every, receive_every) = negotiate_heartbeat(offered, frame.heartbeat());
                return Ok((stream, send_every, receive_every));
            }
            Command::Error => {
                let detail = frame.get_header("message").unwrap_or(frame.body.as_str());
                return Err(Error::Transport(format!("Broker refused connection: {}", detail)));
            }
            other => {
                return Err(Error::Protocol(format!("Unexpected {} frame before CONNECTED", other)));
            }
        }
    }

    Err(Error::Transport("Connection closed during STOMP handshake".to_string()))
}

/// Move frames until the channel ends; `None` means a local close
async fn pump(
    stream: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<Frame>,
    sink: &TransportSink,
    send_every: Option<Duration>,
    receive_every: Option<Duration>,
) -> Option<String> {
    let (mut write, mut read) = stream.split();
    let mut heartbeat = send_every.map(|period| interval_at(Instant::now() + period, period));
    let mut watchdog = receive_every.map(|period| interval_at(Instant::now() + period, period));
    let mut last_inbound = Instant::now();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = write.send(WsMessage::Text(frame.encode())).await {
                        return Some(format!("Send failed: {}", e));
                    }
                }
                None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return None;
                }
            },
            inbound = read.next() => {
                last_inbound = Instant::now();
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(reason) = dispatch(&text, sink) {
                            return Some(reason);
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => return Some("Closed by server".to_string()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Some(e.to_string()),
                    None => return Some("Connection ended".to_string()),
                }
            }
            _ = tick(&mut heartbeat) => {
                if let Err(e) = write.send(WsMessage::Text("\n".to_string())).await {
                    return Some(format!("Heartbeat failed: {}", e));
                }
            }
            _ = tick(&mut watchdog) => {
                if let Some(period) = receive_every {
                    if last_inbound.elapsed() > period * 2 {
                        return Some(format!("No traffic from server for {:?}", last_inbound.elapsed()));
                    }
                }
            }
        }
    }
}

/// Handle one inbound text message; returns a reason when the channel must drop
fn dispatch(text: &str, sink: &TransportSink) -> Option<String> {
    let frame = match Frame::decode(text) {
        Ok(Some(frame)) => frame,
        Ok(None) => return None,
        Err(e) => {
            warn!("Dropping malformed frame: {}", e);
            return None;
        }
    };

    match frame.command {
        Command::Message => {
            let Some(destination) = frame.get_header("destination").map(str::to_string) else {
                warn!("Dropping MESSAGE frame without destination");
                return None;
            };
            sink.emit(TransportEvent::Message {
                subscription: frame.get_header("subscription").map(str::to_string),
                destination,
                body: frame.body,
            });
            None
        }
        Command::Error => Some(format!(
            "Broker error: {}",
            frame.get_header("message").unwrap_or(frame.body.as_str())
        )),
        other => {
            debug!("Ignoring {} frame", other);
            None
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
