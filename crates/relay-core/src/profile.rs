//! Profile data submitted by clients and the roster entries built from it.

use chrono::{DateTime, Utc};

use crate::connection::ConnectionId;

/// Profile snapshot sent with a `register` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Name shown in the roster. Not unique: two connections may share it.
    pub display_name: String,

    /// Optional avatar reference (URI or data URL), passed through untouched.
    pub avatar_ref: Option<String>,
}

impl Profile {
    pub fn new(display_name: impl Into<String>) -> Self {
        Profile {
            display_name: display_name.into(),
            avatar_ref: None,
        }
    }

    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar_ref.into());
        self
    }

    /// True when the display name is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.display_name.trim().is_empty()
    }
}

/// One row of the roster: a registered, currently open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub avatar_ref: Option<String>,

    /// When this entry was (re-)registered.
    pub online_since: DateTime<Utc>,
}

impl ConnectionEntry {
    pub fn new(connection_id: ConnectionId, profile: Profile, online_since: DateTime<Utc>) -> Self {
        ConnectionEntry {
            connection_id,
            display_name: profile.display_name,
            avatar_ref: profile.avatar_ref,
            online_since,
        }
    }
}
