//! Error types for the relay core.
//!
//! None of these are fatal: each one describes why a single event from a
//! single connection was dropped. The server logs them and carries on.

use thiserror::Error;

use crate::connection::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Event for a connection the relay has never seen, or has already closed.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// `Connect` for an id that is already live.
    #[error("connection {0} is already connected")]
    AlreadyConnected(ConnectionId),

    #[error("connection {0} tried to register with an empty display name")]
    EmptyDisplayName(ConnectionId),

    #[error("connection {0} sent a message with empty text")]
    EmptyMessageText(ConnectionId),

    /// Only raised when the relay policy requires registration before messaging.
    #[error("connection {0} sent a message before registering")]
    NotRegistered(ConnectionId),
}
