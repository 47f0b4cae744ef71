//! SPSHPAU chat client
//!
//! A line-oriented driver for the chat session.
//!
//! Usage: `spshpau-chat [config.json]` with `SPSHPAU_ACCESS_TOKEN` set.

use anyhow::Context;
use spshpau_chat::api::RestChatApi;
use spshpau_chat::auth::{Credential, TokenStore};
use spshpau_chat::config::ChatConfig;
use spshpau_chat::session::{ChatSession, SessionSignal};
use spshpau_chat::transport::{StompTransport, TransportConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

type Session = ChatSession<StompTransport, RestChatApi<TokenStore>, TokenStore>;

const HELP: &str = "Commands: /open <partnerId>, /close, /list, /quit; anything else is sent to the open conversation";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    spshpau_chat::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ChatConfig::load(&path).with_context(|| format!("Failed to load config from {}", path))?,
        None => ChatConfig::default(),
    };

    let token = std::env::var("SPSHPAU_ACCESS_TOKEN").context("SPSHPAU_ACCESS_TOKEN is not set")?;
    let credential = Credential::from_jwt(token).context("Access token is not a valid JWT")?;
    let user = credential.claims()?.profile();
    println!("Signed in as {} ({})", user.username, user.id);

    let credentials = Arc::new(TokenStore::new(credential));
    let api = RestChatApi::new(&config.api_base_url, credentials.clone());
    let transport = StompTransport::new(TransportConfig::from(&config));
    let mut session: Session = ChatSession::new(config, user.clone(), transport, api, credentials);

    let self_id = user.id.clone();
    session.set_message_handler(move |message| {
        let from = if message.sender_id == self_id { "you" } else { message.sender_id.as_str() };
        println!("[{}] {}: {}", message.partner_of(&self_id), from, message.content);
    });
    session.set_status_update_handler(|update| {
        println!("* {} message(s) now {}", update.message_ids.len(), update.new_status);
    });
    session.set_presence_handler(|user_id, status| {
        println!("* {} is {:?}", user_id, status);
    });
    session.set_signal_handler(|signal| match signal {
        SessionSignal::Connected => println!("* connected"),
        SessionSignal::Disconnected => println!("* connection lost, reconnecting"),
        SessionSignal::AuthenticationFailed => println!("* authentication failed"),
        SessionSignal::ConnectionError(reason) => println!("* connection error: {}", reason),
        SessionSignal::FetchFailed { pane, message } => println!("* failed to load {:?}: {}", pane, message),
    });

    println!("Connecting to {}", session.config().ws_url);
    session.connect().await?;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_command(&mut session, line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            Some(event) = session.next_event() => session.handle_event(event).await,
        }
    }

    session.disconnect();
    Ok(())
}

/// Apply one input line; returns false to quit
fn handle_command(session: &mut Session, line: &str) -> bool {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "/quit" => return false,
        "/close" => session.close_conversation(),
        "/list" => print_summaries(session),
        "/open" if !argument.is_empty() => {
            session.select_conversation(argument);
            for message in session.messages(argument) {
                println!("  {} {} {}", message.sender_id, message.content, message.status_indicator());
            }
        }
        "/open" => println!("Usage: /open <partnerId>"),
        other if other.starts_with('/') => println!("{}", HELP),
        _ => match session.active_conversation().map(|a| a.partner_id.clone()) {
            Some(partner_id) => {
                if let Err(e) = session.send(&partner_id, line) {
                    println!("! {}", e);
                }
            }
            None => println!("Open a conversation first (/open <partnerId>)"),
        },
    }
    true
}

fn print_summaries(session: &Session) {
    if let Some(error) = session.summary_error() {
        println!("! {}", error);
    }
    if session.summaries().is_empty() {
        println!("No conversations");
        return;
    }
    for summary in session.summaries().iter() {
        let partner = &summary.chat_partner;
        println!(
            "{:<24} {:<10} {:>3} unread  ({:?})",
            partner.display_name(),
            partner.id,
            summary.unread_count,
            session.presence().status(&partner.id)
        );
    }
}
