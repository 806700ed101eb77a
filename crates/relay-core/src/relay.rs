//! Relay state machine.
//!
//! The relay owns the [`Registry`] plus the lifecycle state of every open
//! connection, and turns each [`InputMessage`] into zero or more
//! [`Delivery`]s:
//!
//! - `Connect`    => no output; the connection becomes a broadcast recipient.
//! - `Register`   => registry upsert, roster to everyone (sender included).
//! - `Message`    => relayed according to [`DeliveryPolicy`].
//! - `Disconnect` => registry remove, roster to everyone left
//!                   (only if the roster actually changed).
//!
//! The relay performs no I/O and no locking. Callers serialize access by
//! owning it from a single task.

use std::collections::HashMap;

use crate::connection::{ConnectionId, ConnectionState};
use crate::error::RelayError;
use crate::messages::{ChatMessage, Delivery, InputMessage};
use crate::profile::Profile;
use crate::registry::Registry;

/// How chat messages are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Every open connection receives every message and filters locally
    /// on `to`/`from`. This leaks each message to all clients.
    #[default]
    Broadcast,

    /// Only the target connection receives the message, plus an echo to
    /// the sender so its own view stays in sync.
    Targeted,
}

/// Tunables for [`Relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayPolicy {
    pub delivery: DeliveryPolicy,

    /// Reject messages from connections that never registered.
    /// Off by default: unregistered senders are relayed like anyone else.
    pub require_registration: bool,
}

#[derive(Debug, Default)]
pub struct Relay {
    policy: RelayPolicy,

    /// Every open connection (registered or not) and its state.
    connections: HashMap<ConnectionId, ConnectionState>,

    /// Registered connections, in roster order.
    registry: Registry,
}

impl Relay {
    /// Create a relay with the default (broadcast, permissive) policy.
    pub fn new() -> Self {
        Relay::default()
    }

    pub fn with_policy(policy: RelayPolicy) -> Self {
        Relay {
            policy,
            ..Relay::default()
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lifecycle state of a connection; `None` once closed or never seen.
    ///
    /// Never returns `Closed`: closing removes the connection outright.
    pub fn connection_state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&id).copied()
    }

    /// Number of open connections, registered or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Process a single event from `origin` and return the resulting deliveries.
    ///
    /// An error means the event was dropped; relay state is unchanged.
    pub fn process(
        &mut self,
        origin: ConnectionId,
        msg: InputMessage,
    ) -> Result<Vec<Delivery>, RelayError> {
        match msg {
            InputMessage::Connect => self.process_connect(origin),
            InputMessage::Register(profile) => self.process_register(origin, profile),
            InputMessage::Message(chat) => self.process_message(origin, chat),
            InputMessage::Disconnect => Ok(self.process_disconnect(origin)),
        }
    }

    // -------------------------------------------------------------------------
    // Internal handlers
    // -------------------------------------------------------------------------

    fn process_connect(&mut self, origin: ConnectionId) -> Result<Vec<Delivery>, RelayError> {
        if self.connections.contains_key(&origin) {
            return Err(RelayError::AlreadyConnected(origin));
        }

        self.connections.insert(origin, ConnectionState::Connected);
        Ok(Vec::new())
    }

    fn process_register(
        &mut self,
        origin: ConnectionId,
        profile: Profile,
    ) -> Result<Vec<Delivery>, RelayError> {
        let state = self
            .connections
            .get_mut(&origin)
            .ok_or(RelayError::UnknownConnection(origin))?;

        if profile.is_blank() {
            return Err(RelayError::EmptyDisplayName(origin));
        }

        let next = state
            .after_register()
            .ok_or(RelayError::UnknownConnection(origin))?;
        *state = next;

        self.registry.upsert(origin, profile);

        Ok(vec![Delivery::roster(self.registry.snapshot())])
    }

    fn process_message(
        &mut self,
        origin: ConnectionId,
        chat: ChatMessage,
    ) -> Result<Vec<Delivery>, RelayError> {
        let state = self
            .connections
            .get(&origin)
            .copied()
            .ok_or(RelayError::UnknownConnection(origin))?;

        if chat.is_blank() {
            return Err(RelayError::EmptyMessageText(origin));
        }

        if self.policy.require_registration && !state.is_registered() {
            return Err(RelayError::NotRegistered(origin));
        }

        let delivery = match self.policy.delivery {
            DeliveryPolicy::Broadcast => Delivery::broadcast_message(chat),
            DeliveryPolicy::Targeted => {
                let mut recipients = Vec::with_capacity(2);
                if self.connections.contains_key(&chat.target) {
                    recipients.push(chat.target);
                }
                if !recipients.contains(&origin) {
                    recipients.push(origin);
                }
                Delivery::targeted_message(recipients, chat)
            }
        };

        Ok(vec![delivery])
    }

    fn process_disconnect(&mut self, origin: ConnectionId) -> Vec<Delivery> {
        // Second disconnect (or one for a connection we never saw): no-op.
        if self.connections.remove(&origin).is_none() {
            return Vec::new();
        }

        match self.registry.remove(origin) {
            Some(_) => vec![Delivery::roster(self.registry.snapshot())],
            // Never registered: roster unchanged, nothing to announce.
            None => Vec::new(),
        }
    }
}
