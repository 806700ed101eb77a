//! Connection registry: the authoritative "who is online" roster.
//!
//! Entries are kept in registry-insertion order. Re-registering a
//! connection removes its old entry and re-appends it, so the roster
//! order reflects the latest registration, not the first one.
//!
//! The registry does no locking of its own; it is owned by a single
//! [`Relay`](crate::Relay), which in turn is owned by a single task.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::connection::ConnectionId;
use crate::profile::{ConnectionEntry, Profile};

#[derive(Debug, Default)]
pub struct Registry {
    /// ConnectionId -> entry, in insertion order.
    entries: IndexMap<ConnectionId, ConnectionEntry>,
}

impl Registry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Insert or replace the entry for `connection_id`, stamped with the current time.
    pub fn upsert(&mut self, connection_id: ConnectionId, profile: Profile) -> ConnectionEntry {
        self.upsert_at(connection_id, profile, Utc::now())
    }

    /// Insert or replace the entry for `connection_id`.
    ///
    /// Never duplicates: an existing entry for the same id is removed
    /// first and the new one is appended at the end.
    pub fn upsert_at(
        &mut self,
        connection_id: ConnectionId,
        profile: Profile,
        online_since: DateTime<Utc>,
    ) -> ConnectionEntry {
        // shift_remove keeps the relative order of everyone else.
        self.entries.shift_remove(&connection_id);

        let entry = ConnectionEntry::new(connection_id, profile, online_since);
        self.entries.insert(connection_id, entry.clone());
        entry
    }

    /// Remove the entry for `connection_id`, if any.
    ///
    /// Returns the removed entry; absent ids are a no-op.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        self.entries.shift_remove(&connection_id)
    }

    /// Current roster in registry order.
    pub fn snapshot(&self) -> Vec<ConnectionEntry> {
        self.entries.values().cloned().collect()
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&ConnectionEntry> {
        self.entries.get(&connection_id)
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
