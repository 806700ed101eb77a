//! Connection identity and per-connection lifecycle state.

use std::fmt;

/// Identifier for a live connection.
///
/// This is intentionally opaque; the server guarantees uniqueness
/// over the lifetime of the process. A reconnecting client always
/// gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol state of a single connection.
///
/// ```text
/// Connected --register--> Registered --register--> Registered
///     |                       |
///     +------disconnect-------+-----> Closed (terminal)
/// ```
///
/// `Closed` connections are dropped from the relay entirely; there is no
/// way back from `Closed`, a reconnecting client starts over as `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport handshake done, no profile yet.
    Connected,

    /// At least one `register` event accepted.
    Registered,

    /// Transport closed; entry removed. Never stored by the relay, which
    /// drops the connection instead; kept so transitions out of it can be
    /// expressed.
    Closed,
}

impl ConnectionState {
    /// State after a successful `register`.
    ///
    /// Re-registration keeps the connection `Registered`.
    pub fn after_register(self) -> Option<ConnectionState> {
        match self {
            ConnectionState::Connected | ConnectionState::Registered => {
                Some(ConnectionState::Registered)
            }
            ConnectionState::Closed => None,
        }
    }

    pub fn is_registered(self) -> bool {
        matches!(self, ConnectionState::Registered)
    }
}
