//! Central relay loop.
//!
//! This task owns the `Relay` instance and the outbound channel of every
//! open connection. All registry mutations and all fan-out happen here,
//! one request at a time, so a roster broadcast is always computed from a
//! fully applied registry and each recipient sees events in receipt order.

use std::collections::HashMap;

use relay_core::{ConnectionId, Delivery, InputMessage, Recipients, Relay, RelayPolicy};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::{OutboundTx, RelayRequest, RelayRx, RelayTx};

/// Spawn the relay loop and return the sender connection tasks use to reach it.
pub fn spawn(policy: RelayPolicy) -> (RelayTx, JoinHandle<()>) {
    let (relay_tx, relay_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_relay_loop(relay_rx, policy));
    (relay_tx, handle)
}

/// Run the central relay processing loop until every sender is dropped.
pub async fn run_relay_loop(mut relay_rx: RelayRx, policy: RelayPolicy) {
    let mut relay = Relay::with_policy(policy);
    let mut outbound: HashMap<ConnectionId, OutboundTx> = HashMap::new();

    while let Some(req) = relay_rx.recv().await {
        let (connection_id, result) = match req {
            RelayRequest::Connect {
                connection_id,
                outbound: tx,
            } => {
                let result = relay.process(connection_id, InputMessage::Connect);
                if result.is_ok() {
                    outbound.insert(connection_id, tx);
                }
                (connection_id, result)
            }
            RelayRequest::Event { connection_id, msg } => {
                (connection_id, relay.process(connection_id, msg))
            }
            RelayRequest::Disconnect { connection_id } => {
                // Drop the channel first so the roster below skips the leaver.
                outbound.remove(&connection_id);
                (
                    connection_id,
                    relay.process(connection_id, InputMessage::Disconnect),
                )
            }
        };

        match result {
            Ok(deliveries) => {
                for delivery in &deliveries {
                    route_delivery(delivery, &outbound);
                }
            }
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "dropping event");
            }
        }
    }

    info!("Relay loop shutting down (relay_rx closed)");
}

/// Push a single `Delivery` into the outbound channels of its recipients.
///
/// A closed channel only means that connection is on its way out; its
/// `Disconnect` request is already queued behind this one.
fn route_delivery(delivery: &Delivery, outbound: &HashMap<ConnectionId, OutboundTx>) {
    let kind = delivery.message.kind();

    match &delivery.recipients {
        Recipients::All => {
            debug!(event = kind, recipients = outbound.len(), "broadcast");
            for tx in outbound.values() {
                let _ = tx.send(delivery.message.clone());
            }
        }
        Recipients::Only(ids) => {
            debug!(event = kind, recipients = ids.len(), "targeted");
            for id in ids {
                if let Some(tx) = outbound.get(id) {
                    let _ = tx.send(delivery.message.clone());
                }
            }
        }
    }
}
