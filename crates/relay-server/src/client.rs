// crates/relay-server/src/client.rs

//! Per-connection I/O.
//!
//! Each WebSocket gets a writer task (encodes relay output and control
//! frames) and a reader loop (decodes client events, tracks heartbeats).
//! Nothing here touches shared state; every decoded event is handed to
//! the relay task.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use relay_core::ConnectionId;
use relay_protocol::{decode_client_event, encode_server_event};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Heartbeat;
use crate::types::{OutboundRx, RelayRequest, RelayTx};

/// Close code sent when a peer stops answering pings (1001 = going away).
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer gets to flush a final close frame.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Why the reader loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    StreamEnded,
    ReadError,
    PongTimeout,
    RelayGone,
}

/// Run the client I/O loop for a single connection.
///
/// Returns once the connection is gone; by then a `Disconnect` for it has
/// been queued on the relay channel.
pub async fn run_client(
    connection_id: ConnectionId,
    socket: WebSocket,
    relay_tx: RelayTx,
    out_rx: OutboundRx,
    heartbeat: Option<Heartbeat>,
) {
    let (sink, mut stream) = socket.split();
    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<Message>();

    let mut writer_handle = tokio::spawn(writer_task(connection_id, sink, out_rx, ctrl_rx));

    let mut ping_timer = heartbeat.map(|hb| {
        let mut timer = interval(hb.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });
    if let Some(timer) = ping_timer.as_mut() {
        // Skip the first immediate tick
        timer.tick().await;
    }
    let mut pong_deadline: Option<Instant> = None;

    let reason = loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(connection = %connection_id, len = text.as_str().len(), "text frame");
                    match decode_client_event(text.as_str()) {
                        Ok(msg) => {
                            let req = RelayRequest::Event { connection_id, msg };
                            if relay_tx.send(req).is_err() {
                                break CloseReason::RelayGone;
                            }
                        }
                        Err(err) => {
                            warn!(connection = %connection_id, error = %err, "ignoring malformed event");
                        }
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(connection = %connection_id, len = data.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Pong(_))) => {
                    pong_deadline = None;
                }
                // Pings are answered by the WebSocket layer itself.
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(connection = %connection_id, reason = ?frame, "client initiated close");
                    break CloseReason::ClientClosed;
                }
                Some(Err(err)) => {
                    debug!(connection = %connection_id, error = %err, "websocket receive error");
                    break CloseReason::ReadError;
                }
                None => break CloseReason::StreamEnded,
            },

            _ = next_tick(&mut ping_timer) => {
                if pong_deadline.is_none() {
                    if ctrl_tx.send(Message::Ping(Vec::new().into())).is_err() {
                        break CloseReason::StreamEnded;
                    }
                    pong_deadline = heartbeat.map(|hb| Instant::now() + hb.timeout);
                }
            }

            _ = wait_until(pong_deadline) => {
                warn!(connection = %connection_id, "pong timeout, closing connection");
                let _ = ctrl_tx.send(Message::Close(Some(CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "pong timeout".into(),
                })));
                break CloseReason::PongTimeout;
            }
        }
    };

    info!(connection = %connection_id, reason = ?reason, "connection closing");

    // Cleanup must not depend on the client: queue the disconnect first.
    let _ = relay_tx.send(RelayRequest::Disconnect { connection_id });

    // Writer exits once the control channel closes (after any queued close frame).
    drop(ctrl_tx);
    if tokio::time::timeout(WRITER_DRAIN, &mut writer_handle)
        .await
        .is_err()
    {
        writer_handle.abort();
    }
}

/// Writer task: encodes relay output and forwards control frames to the sink.
async fn writer_task(
    connection_id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut out_rx: OutboundRx,
    mut ctrl_rx: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        let frame = tokio::select! {
            msg = out_rx.recv() => match msg {
                Some(msg) => match encode_server_event(&msg) {
                    Ok(text) => Message::Text(text.into()),
                    Err(err) => {
                        warn!(connection = %connection_id, error = %err, "failed to encode event");
                        continue;
                    }
                },
                None => break,
            },
            ctrl = ctrl_rx.recv() => match ctrl {
                Some(frame) => frame,
                None => break,
            },
        };

        let closing = matches!(frame, Message::Close(_));
        if let Err(err) = sink.send(frame).await {
            debug!(connection = %connection_id, error = %err, "write failed");
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
