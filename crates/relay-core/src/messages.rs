//! Message types used by the relay core.
//!
//! These are **transport-agnostic** logical messages:
//! - [`InputMessage`]: what the relay consumes, one per connection event.
//! - [`OutputMessage`]: what the relay produces for clients.
//! - [`Delivery`]: an output message plus who should receive it.
//!
//! Note: JSON encoders live in the `relay-protocol` crate;
//! this module is purely logical.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::connection::ConnectionId;
use crate::profile::{ConnectionEntry, Profile};

/// A single event from one connection into the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMessage {
    /// Transport handshake finished; the connection is now live but unregistered.
    Connect,

    /// Client submitted (or re-submitted) its profile.
    Register(Profile),

    /// Client sent a chat message.
    Message(ChatMessage),

    /// Transport closed, gracefully or not. Never client-initiated.
    Disconnect,
}

/// An event emitted by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMessage {
    /// Full roster in registry order; replaces the client's local view.
    RosterUpdate(Vec<ConnectionEntry>),

    /// A relayed chat message, same shape as it was sent.
    MessageReceived(ChatMessage),
}

/// Client-generated message identifier.
///
/// Browsers typically send a millisecond timestamp, other clients a
/// string. Whatever form arrives is echoed back in the same form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    Numeric(u64),

    /// Any other number (negative, fractional, exponent), as its JSON text.
    Number(String),

    Text(String),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Numeric(n) => write!(f, "{n}"),
            MessageId::Number(s) | MessageId::Text(s) => f.write_str(s),
        }
    }
}

/// Chat message (input and output).
///
/// The relay does not store these; it only forwards them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,

    /// Message body. Must be non-empty after trimming, but is relayed untrimmed.
    pub text: String,

    /// Display name of the sender, as claimed by the client.
    pub sender_name: String,

    /// Intended recipient, as chosen by the client from the roster.
    pub target: ConnectionId,

    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Client-side filter for broadcast delivery: was this message sent by
    /// `my_name`, or addressed to `my_id`?
    ///
    /// Sender matching is by display name only, so two clients sharing a
    /// name see each other's outgoing messages.
    pub fn concerns(&self, my_name: &str, my_id: Option<ConnectionId>) -> bool {
        self.sender_name == my_name || Some(self.target) == my_id
    }
}

/// Who should receive an [`OutputMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every currently open connection, registered or not.
    All,

    /// Only these connections (in this order). Unknown ids are skipped
    /// by the fan-out layer.
    Only(Vec<ConnectionId>),
}

impl Recipients {
    pub fn includes(&self, id: ConnectionId) -> bool {
        match self {
            Recipients::All => true,
            Recipients::Only(ids) => ids.contains(&id),
        }
    }
}

/// A routed output: the networking layer sends `message` to `recipients`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipients: Recipients,
    pub message: OutputMessage,
}

// -----------------------------------------------------------------------------
// Convenience constructors
// -----------------------------------------------------------------------------

impl Delivery {
    /// Roster snapshot to everyone.
    pub fn roster(entries: Vec<ConnectionEntry>) -> Self {
        Delivery {
            recipients: Recipients::All,
            message: OutputMessage::RosterUpdate(entries),
        }
    }

    /// Chat message to everyone.
    pub fn broadcast_message(msg: ChatMessage) -> Self {
        Delivery {
            recipients: Recipients::All,
            message: OutputMessage::MessageReceived(msg),
        }
    }

    /// Chat message to a fixed set of connections.
    pub fn targeted_message(recipients: Vec<ConnectionId>, msg: ChatMessage) -> Self {
        Delivery {
            recipients: Recipients::Only(recipients),
            message: OutputMessage::MessageReceived(msg),
        }
    }
}

impl OutputMessage {
    /// Short event name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutputMessage::RosterUpdate(_) => "roster-update",
            OutputMessage::MessageReceived(_) => "message-received",
        }
    }
}
