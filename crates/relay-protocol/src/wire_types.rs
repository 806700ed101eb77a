//! Wire document shapes.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//!
//! ```text
//! client -> server
//!   register          { name, avatarPreview? }              (alias: register_user)
//!   message           { id, text, from, to, timestamp? }    (alias: send_message)
//!
//! server -> client
//!   roster-update     [ { connectionId, name, avatarRef?, online, onlineSince } ]
//!   message-received  { id, text, from, to, timestamp }
//! ```
//!
//! Unknown fields in client payloads are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::{ChatMessage, ConnectionEntry, ConnectionId, MessageId, Profile};

/// Events a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "register", alias = "register_user")]
    Register(WireProfile),

    #[serde(rename = "message", alias = "send_message")]
    Message(WireChatMessage),
}

/// Events the server pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    RosterUpdate(Vec<WireRosterEntry>),
    MessageReceived(WireChatMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProfile {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_preview: Option<String>,
}

/// Message ids keep whatever JSON type the client picked.
///
/// Variant order matters: plain unsigned integers land in `Numeric`,
/// every other number in `Number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireMessageId {
    Numeric(u64),
    Number(serde_json::Number),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireChatMessage {
    pub id: WireMessageId,
    pub text: String,
    pub from: String,

    /// Target connection id, as published in the roster.
    pub to: u64,

    /// Filled with the receipt time when a client leaves it out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRosterEntry {
    pub connection_id: u64,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,

    /// Always true; offline users are simply absent from the roster.
    pub online: bool,

    pub online_since: DateTime<Utc>,
}

// -----------------------------------------------------------------------------
// Conversions to / from relay-core types
// -----------------------------------------------------------------------------

impl From<WireProfile> for Profile {
    fn from(p: WireProfile) -> Self {
        Profile {
            display_name: p.name,
            // The browser client sends `null` before an avatar is picked;
            // an empty string means the same thing.
            avatar_ref: p.avatar_preview.filter(|a| !a.is_empty()),
        }
    }
}

impl From<&Profile> for WireProfile {
    fn from(p: &Profile) -> Self {
        WireProfile {
            name: p.display_name.clone(),
            avatar_preview: p.avatar_ref.clone(),
        }
    }
}

impl From<WireMessageId> for MessageId {
    fn from(id: WireMessageId) -> Self {
        match id {
            WireMessageId::Numeric(n) => MessageId::Numeric(n),
            WireMessageId::Number(n) => MessageId::Number(n.to_string()),
            WireMessageId::Text(s) => MessageId::Text(s),
        }
    }
}

impl From<&MessageId> for WireMessageId {
    fn from(id: &MessageId) -> Self {
        match id {
            MessageId::Numeric(n) => WireMessageId::Numeric(*n),
            // Only ever built from a serde_json::Number, so this parses back.
            MessageId::Number(s) => match s.parse::<serde_json::Number>() {
                Ok(n) => WireMessageId::Number(n),
                Err(_) => WireMessageId::Text(s.clone()),
            },
            MessageId::Text(s) => WireMessageId::Text(s.clone()),
        }
    }
}

impl WireChatMessage {
    /// Convert into a core message, stamping `received_at` if the client sent no timestamp.
    pub fn into_chat(self, received_at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: self.id.into(),
            text: self.text,
            sender_name: self.from,
            target: ConnectionId(self.to),
            created_at: self.timestamp.unwrap_or(received_at),
        }
    }
}

impl From<&ChatMessage> for WireChatMessage {
    fn from(m: &ChatMessage) -> Self {
        WireChatMessage {
            id: (&m.id).into(),
            text: m.text.clone(),
            from: m.sender_name.clone(),
            to: m.target.0,
            timestamp: Some(m.created_at),
        }
    }
}

impl From<&ConnectionEntry> for WireRosterEntry {
    fn from(e: &ConnectionEntry) -> Self {
        WireRosterEntry {
            connection_id: e.connection_id.0,
            name: e.display_name.clone(),
            avatar_ref: e.avatar_ref.clone(),
            online: true,
            online_since: e.online_since,
        }
    }
}

impl From<WireRosterEntry> for ConnectionEntry {
    fn from(e: WireRosterEntry) -> Self {
        ConnectionEntry {
            connection_id: ConnectionId(e.connection_id),
            display_name: e.name,
            avatar_ref: e.avatar_ref,
            online_since: e.online_since,
        }
    }
}
