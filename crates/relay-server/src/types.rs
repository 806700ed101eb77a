//! Shared types for the relay server.
//!
//! This module defines:
//! - channel aliases between connection tasks and the relay task
//! - `RelayRequest`: everything a connection task can tell the relay task

use relay_core::{ConnectionId, InputMessage, OutputMessage};
use tokio::sync::mpsc;

/// Outbound messages from the relay task to a given connection.
pub type OutboundTx = mpsc::UnboundedSender<OutputMessage>;
pub type OutboundRx = mpsc::UnboundedReceiver<OutputMessage>;

/// Message flowing from a connection task into the relay task.
///
/// Requests from one connection arrive in the order that connection sent
/// them, so `Connect` always precedes its events and `Disconnect` follows them.
#[derive(Debug)]
pub enum RelayRequest {
    /// A new connection and the channel the relay should push its events into.
    Connect {
        connection_id: ConnectionId,
        outbound: OutboundTx,
    },

    /// A decoded client event.
    Event {
        connection_id: ConnectionId,
        msg: InputMessage,
    },

    /// The transport closed.
    Disconnect { connection_id: ConnectionId },
}

/// Channel from connection tasks → relay task.
pub type RelayTx = mpsc::UnboundedSender<RelayRequest>;
pub type RelayRx = mpsc::UnboundedReceiver<RelayRequest>;
