//! Interactive terminal client for the relay server.
//!
//! ```text
//! cargo run -p relay-server --example chat_client -- --name Alice
//! ```
//!
//! Type `@<id> text` to message a connection from the roster, plain text to
//! message the last one you picked, `/who` to print the roster, `/quit` to leave.
//!
//! The relay broadcasts every message to every client by default; this client
//! only prints the ones it sent or that are addressed to it.

use std::error::Error;

use chrono::Utc;
use clap::Parser;
use futures::{SinkExt, StreamExt};
use relay_core::{ChatMessage, ConnectionEntry, ConnectionId, InputMessage, MessageId, OutputMessage, Profile};
use relay_protocol::{decode_server_event, encode_client_event};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[clap(name = "chat-client")]
#[clap(about = "Terminal client for the presence relay")]
struct Cli {
    /// Relay WebSocket URL
    #[clap(short, long, default_value = "ws://127.0.0.1:5000/ws")]
    server: String,

    /// Display name to register with
    #[clap(short, long)]
    name: String,

    /// Optional avatar URL
    #[clap(short, long)]
    avatar: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    println!("Connecting to {}...", cli.server);
    let (ws, _) = connect_async(cli.server.as_str()).await?;
    let (mut sink, mut stream) = ws.split();
    println!("Connected. Type `@<id> text`, `/who` or `/quit`.\n");

    let mut profile = Profile::new(cli.name.clone());
    if let Some(avatar) = cli.avatar {
        profile = profile.with_avatar(avatar);
    }
    sink.send(Message::text(encode_client_event(&InputMessage::Register(profile))?))
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut roster: Vec<ConnectionEntry> = Vec::new();
    let mut target: Option<ConnectionId> = None;
    let mut my_id: Option<ConnectionId> = None;

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(frame) = frame else {
                    println!("Server closed the connection.");
                    break;
                };
                if let Message::Text(text) = frame? {
                    match decode_server_event(text.as_str()) {
                        Ok(OutputMessage::RosterUpdate(entries)) => {
                            roster = entries;
                            if my_id.is_none() {
                                // Registration re-appends, so our entry is the last with our name.
                                my_id = roster
                                    .iter()
                                    .rev()
                                    .find(|e| e.display_name == cli.name)
                                    .map(|e| e.connection_id);
                            }
                            print_roster(&roster);
                        }
                        Ok(OutputMessage::MessageReceived(msg)) => {
                            if msg.concerns(&cli.name, my_id) {
                                print_message(&msg);
                            }
                        }
                        Err(e) => eprintln!("Could not decode server event: {e}"),
                    }
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    println!("\nEOF on stdin, exiting client.");
                    break;
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "/quit" {
                    break;
                }
                if trimmed == "/who" {
                    print_roster(&roster);
                    continue;
                }

                let (to, text) = match parse_addressed(trimmed) {
                    Some((id, text)) => {
                        target = Some(id);
                        (id, text)
                    }
                    None => match target {
                        Some(id) => (id, trimmed),
                        None => {
                            eprintln!("Pick a recipient first with `@<id> text`.");
                            continue;
                        }
                    },
                };

                let now = Utc::now();
                let msg = ChatMessage {
                    id: MessageId::Numeric(now.timestamp_millis().max(0) as u64),
                    text: text.to_string(),
                    sender_name: cli.name.clone(),
                    target: to,
                    created_at: now,
                };
                sink.send(Message::text(encode_client_event(&InputMessage::Message(msg))?))
                    .await?;
            }
        }
    }

    let _ = sink.close().await;
    Ok(())
}

/// `@12 hello there` -> (ConnectionId(12), "hello there")
fn parse_addressed(line: &str) -> Option<(ConnectionId, &str)> {
    let rest = line.strip_prefix('@')?;
    let (id, text) = rest.split_once(' ')?;
    let id = id.parse::<u64>().ok()?;
    Some((ConnectionId(id), text.trim()))
}

fn print_roster(roster: &[ConnectionEntry]) {
    println!("-- online ({}) --", roster.len());
    for entry in roster {
        println!(
            "  [{}] {} (since {})",
            entry.connection_id,
            entry.display_name,
            entry.online_since.format("%H:%M:%S")
        );
    }
}

fn print_message(msg: &ChatMessage) {
    println!(
        "{} {} -> [{}]: {}",
        msg.created_at.format("%H:%M:%S"),
        msg.sender_name,
        msg.target,
        msg.text
    );
}
