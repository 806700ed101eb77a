//! JSON encoding/decoding of relay events.
//!
//! Server side: [`decode_client_event`] + [`encode_server_event`].
//! Client side (tools, tests): [`encode_client_event`] + [`decode_server_event`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use relay_core::{InputMessage, OutputMessage};

use crate::wire_types::{ClientEvent, ServerEvent, WireChatMessage, WireProfile, WireRosterEntry};

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not JSON, unknown event name, or a payload missing required fields.
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Lifecycle inputs come from the transport, never from a frame.
    #[error("`{0}` is a transport event and has no wire form")]
    NotAWireEvent(&'static str),
}

/// Decode one client text frame, stamping missing timestamps with "now".
pub fn decode_client_event(text: &str) -> Result<InputMessage, ProtocolError> {
    decode_client_event_at(text, Utc::now())
}

/// Decode one client text frame, stamping missing timestamps with `received_at`.
pub fn decode_client_event_at(
    text: &str,
    received_at: DateTime<Utc>,
) -> Result<InputMessage, ProtocolError> {
    let event: ClientEvent = serde_json::from_str(text)?;

    Ok(match event {
        ClientEvent::Register(profile) => InputMessage::Register(profile.into()),
        ClientEvent::Message(msg) => InputMessage::Message(msg.into_chat(received_at)),
    })
}

/// Encode a client-originated input as a text frame.
pub fn encode_client_event(msg: &InputMessage) -> Result<String, ProtocolError> {
    let event = match msg {
        InputMessage::Register(profile) => ClientEvent::Register(WireProfile::from(profile)),
        InputMessage::Message(chat) => ClientEvent::Message(WireChatMessage::from(chat)),
        InputMessage::Connect => return Err(ProtocolError::NotAWireEvent("connect")),
        InputMessage::Disconnect => return Err(ProtocolError::NotAWireEvent("disconnect")),
    };

    Ok(serde_json::to_string(&event)?)
}

/// Encode a relay output as a text frame.
pub fn encode_server_event(msg: &OutputMessage) -> Result<String, ProtocolError> {
    let event = match msg {
        OutputMessage::RosterUpdate(entries) => {
            ServerEvent::RosterUpdate(entries.iter().map(WireRosterEntry::from).collect())
        }
        OutputMessage::MessageReceived(chat) => {
            ServerEvent::MessageReceived(WireChatMessage::from(chat))
        }
    };

    Ok(serde_json::to_string(&event)?)
}

/// Decode one server text frame.
pub fn decode_server_event(text: &str) -> Result<OutputMessage, ProtocolError> {
    let event: ServerEvent = serde_json::from_str(text)?;

    Ok(match event {
        ServerEvent::RosterUpdate(entries) => {
            OutputMessage::RosterUpdate(entries.into_iter().map(Into::into).collect())
        }
        // The server always fills the timestamp; "now" only covers hand-written frames.
        ServerEvent::MessageReceived(msg) => OutputMessage::MessageReceived(msg.into_chat(Utc::now())),
    })
}
