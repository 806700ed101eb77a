//! End-to-end tests: real WebSocket clients against a server bound on a random port.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_core::{ChatMessage, ConnectionEntry, ConnectionId, DeliveryPolicy, OutputMessage, RelayPolicy};
use relay_protocol::decode_server_event;
use relay_server::config::{Config, Heartbeat};
use relay_server::server;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(3);
const SILENCE: Duration = Duration::from_millis(300);

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        heartbeat: None,
        ..Config::default()
    }
}

/// Start the server on a random port and return its address.
async fn start_server(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        server::serve(listener, config, std::future::pending())
            .await
            .unwrap();
    });

    addr
}

struct TestClient {
    ws: Ws,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("websocket connect");
        TestClient { ws }
    }

    async fn send_raw(&mut self, text: &str) {
        self.ws.send(Message::text(text)).await.expect("send");
    }

    async fn send_json(&mut self, value: Value) {
        self.send_raw(&value.to_string()).await;
    }

    async fn register(&mut self, name: &str) {
        self.send_json(json!({"event": "register", "data": {"name": name}}))
            .await;
    }

    async fn say(&mut self, id: u64, text: &str, from: &str, to: ConnectionId) {
        self.send_json(json!({
            "event": "message",
            "data": {
                "id": id,
                "text": text,
                "from": from,
                "to": to.0,
                "timestamp": "2025-03-01T09:30:00Z"
            }
        }))
        .await;
    }

    async fn next_event(&mut self) -> OutputMessage {
        loop {
            let frame = tokio::time::timeout(EVENT_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for event")
                .expect("stream ended")
                .expect("websocket error");

            match frame {
                Message::Text(text) => return decode_server_event(text.as_str()).expect("decode"),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    async fn next_roster(&mut self) -> Vec<ConnectionEntry> {
        match self.next_event().await {
            OutputMessage::RosterUpdate(entries) => entries,
            other => panic!("expected roster update, got {other:?}"),
        }
    }

    async fn next_message(&mut self) -> ChatMessage {
        match self.next_event().await {
            OutputMessage::MessageReceived(msg) => msg,
            other => panic!("expected message, got {other:?}"),
        }
    }

    async fn expect_silence(&mut self) {
        if let Ok(frame) = tokio::time::timeout(SILENCE, self.ws.next()).await {
            panic!("expected no event, got {frame:?}");
        }
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

fn names(roster: &[ConnectionEntry]) -> Vec<&str> {
    roster.iter().map(|e| e.display_name.as_str()).collect()
}

fn id_of(roster: &[ConnectionEntry], name: &str) -> ConnectionId {
    roster
        .iter()
        .find(|e| e.display_name == name)
        .map(|e| e.connection_id)
        .unwrap_or_else(|| panic!("{name} not in roster"))
}

/// Connect and register a client, consuming its own roster update.
async fn join(addr: SocketAddr, name: &str) -> (TestClient, Vec<ConnectionEntry>) {
    let mut client = TestClient::connect(addr).await;
    client.register(name).await;
    let roster = client.next_roster().await;
    (client, roster)
}

#[tokio::test]
async fn alice_and_bob_scenario() {
    let addr = start_server(test_config()).await;

    let (mut alice, roster) = join(addr, "Alice").await;
    assert_eq!(names(&roster), vec!["Alice"]);

    let (mut bob, roster) = join(addr, "Bob").await;
    assert_eq!(names(&roster), vec!["Alice", "Bob"]);
    assert_eq!(names(&alice.next_roster().await), vec!["Alice", "Bob"]);

    let bob_id = id_of(&roster, "Bob");
    alice.say(1, "hi", "Alice", bob_id).await;

    let seen_by_alice = alice.next_message().await;
    let seen_by_bob = bob.next_message().await;
    assert_eq!(seen_by_alice, seen_by_bob);
    assert_eq!(seen_by_bob.text, "hi");
    assert_eq!(seen_by_bob.sender_name, "Alice");
    assert_eq!(seen_by_bob.target, bob_id);

    bob.close().await;
    assert_eq!(names(&alice.next_roster().await), vec!["Alice"]);
}

#[tokio::test]
async fn abrupt_close_still_frees_the_entry() {
    let addr = start_server(test_config()).await;

    let (mut alice, _) = join(addr, "Alice").await;
    let (bob, _) = join(addr, "Bob").await;
    alice.next_roster().await;

    // No close handshake, just gone.
    drop(bob);
    assert_eq!(names(&alice.next_roster().await), vec!["Alice"]);
}

#[tokio::test]
async fn same_name_gets_two_entries() {
    let addr = start_server(test_config()).await;

    let (mut first, _) = join(addr, "Sam").await;
    let (_second, roster) = join(addr, "Sam").await;

    assert_eq!(names(&roster), vec!["Sam", "Sam"]);
    assert_ne!(roster[0].connection_id, roster[1].connection_id);
    assert_eq!(first.next_roster().await, roster);
}

#[tokio::test]
async fn re_registration_replaces_entry() {
    let addr = start_server(test_config()).await;

    let (mut alice, _) = join(addr, "Alice").await;
    let (mut bob, _) = join(addr, "Bob").await;
    alice.next_roster().await;

    alice.register("Alicia").await;
    let roster = alice.next_roster().await;
    assert_eq!(names(&roster), vec!["Bob", "Alicia"]);
    assert_eq!(bob.next_roster().await, roster);
}

#[tokio::test]
async fn message_reaches_every_open_connection() {
    let addr = start_server(test_config()).await;

    let (mut a, _) = join(addr, "A").await;
    let (mut b, _) = join(addr, "B").await;
    let (mut c, roster) = join(addr, "C").await;
    a.next_roster().await;
    a.next_roster().await;
    b.next_roster().await;

    // Connected but never registered: still a broadcast recipient.
    let mut lurker = TestClient::connect(addr).await;

    a.say(7, "hello all", "A", id_of(&roster, "B")).await;

    let expected = a.next_message().await;
    assert_eq!(b.next_message().await, expected);
    assert_eq!(c.next_message().await, expected);
    assert_eq!(lurker.next_message().await, expected);
}

// Design gap: an unregistered connection can send messages and they are relayed.
#[tokio::test]
async fn unregistered_sender_is_relayed_by_default() {
    let addr = start_server(test_config()).await;

    let (mut alice, roster) = join(addr, "Alice").await;
    let mut lurker = TestClient::connect(addr).await;

    lurker.say(3, "who am i", "nobody", id_of(&roster, "Alice")).await;
    assert_eq!(alice.next_message().await.text, "who am i");
}

#[tokio::test]
async fn strict_policy_drops_unregistered_sender() {
    let config = Config {
        policy: RelayPolicy {
            require_registration: true,
            ..RelayPolicy::default()
        },
        ..test_config()
    };
    let addr = start_server(config).await;

    let (mut alice, roster) = join(addr, "Alice").await;
    let mut lurker = TestClient::connect(addr).await;

    lurker.say(3, "who am i", "nobody", id_of(&roster, "Alice")).await;
    alice.expect_silence().await;
    lurker.expect_silence().await;
}

#[tokio::test]
async fn concurrent_registrations_are_all_counted_once() {
    const N: usize = 12;
    let addr = start_server(test_config()).await;

    let mut clients = Vec::with_capacity(N);
    for _ in 0..N {
        clients.push(TestClient::connect(addr).await);
    }

    let tasks: Vec<_> = clients
        .into_iter()
        .enumerate()
        .map(|(i, mut client)| {
            tokio::spawn(async move {
                client.register(&format!("user-{i}")).await;
                loop {
                    let roster = client.next_roster().await;
                    if roster.len() == N {
                        return roster;
                    }
                }
            })
        })
        .collect();

    let expected_names: HashSet<String> = (0..N).map(|i| format!("user-{i}")).collect();
    for task in tasks {
        let roster = task.await.unwrap();
        let ids: HashSet<ConnectionId> = roster.iter().map(|e| e.connection_id).collect();
        let names: HashSet<String> = roster.iter().map(|e| e.display_name.clone()).collect();
        assert_eq!(ids.len(), N);
        assert_eq!(names, expected_names);
    }
}

#[tokio::test]
async fn malformed_events_do_not_hurt_anyone() {
    let addr = start_server(test_config()).await;

    let (mut alice, _) = join(addr, "Alice").await;
    let mut mallory = TestClient::connect(addr).await;

    mallory.send_raw("definitely not json").await;
    mallory.send_json(json!({"event": "register", "data": {}})).await;
    mallory.send_json(json!({"event": "register", "data": {"name": "   "}})).await;
    mallory.send_json(json!({"event": "message", "data": {"text": "no id"}})).await;
    mallory.send_json(json!({"event": "explode"})).await;
    mallory.ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();

    alice.expect_silence().await;

    // Mallory's connection is still usable afterwards.
    mallory.register("Mallory").await;
    let roster = mallory.next_roster().await;
    assert_eq!(names(&roster), vec!["Alice", "Mallory"]);
    assert_eq!(alice.next_roster().await, roster);
}

#[tokio::test]
async fn blank_message_text_is_dropped() {
    let addr = start_server(test_config()).await;

    let (mut alice, roster) = join(addr, "Alice").await;
    alice.say(1, "   ", "Alice", id_of(&roster, "Alice")).await;
    alice.expect_silence().await;
}

#[tokio::test]
async fn targeted_delivery_skips_bystanders() {
    let config = Config {
        policy: RelayPolicy {
            delivery: DeliveryPolicy::Targeted,
            ..RelayPolicy::default()
        },
        ..test_config()
    };
    let addr = start_server(config).await;

    let (mut a, _) = join(addr, "A").await;
    let (mut b, _) = join(addr, "B").await;
    let (mut c, roster) = join(addr, "C").await;
    a.next_roster().await;
    a.next_roster().await;
    b.next_roster().await;

    a.say(9, "just you", "A", id_of(&roster, "B")).await;

    assert_eq!(b.next_message().await.text, "just you");
    assert_eq!(a.next_message().await.text, "just you");
    c.expect_silence().await;
}

#[tokio::test]
async fn connections_beyond_limit_are_refused() {
    let config = Config {
        max_clients: 1,
        ..test_config()
    };
    let addr = start_server(config).await;

    let first = TestClient::connect(addr).await;
    assert!(connect_async(format!("ws://{addr}/ws")).await.is_err());

    // The slot frees up once the first connection is gone.
    first.close().await;
    let mut retries = 0;
    loop {
        if connect_async(format!("ws://{addr}/ws")).await.is_ok() {
            break;
        }
        retries += 1;
        assert!(retries < 20, "slot was never released");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn silent_peer_is_dropped_by_heartbeat() {
    let config = Config {
        heartbeat: Some(Heartbeat {
            interval: Duration::from_millis(200),
            timeout: Duration::from_millis(300),
        }),
        ..test_config()
    };
    let addr = start_server(config).await;

    let (mut alice, _) = join(addr, "Alice").await;
    // Bob registers, then never reads again, so never answers a ping.
    let (_bob, _) = join(addr, "Bob").await;
    assert_eq!(names(&alice.next_roster().await), vec!["Alice", "Bob"]);

    assert_eq!(names(&alice.next_roster().await), vec!["Alice"]);
}

#[tokio::test]
async fn health_endpoint_allows_trusted_origin() {
    let addr = start_server(test_config()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"GET /health HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:5173\r\nConnection: close\r\n\r\n",
        )
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    let lower = response.to_ascii_lowercase();

    assert!(lower.starts_with("http/1.1 200"), "{response}");
    assert!(lower.contains("access-control-allow-origin: http://localhost:5173"), "{response}");
    assert!(response.ends_with("ok"), "{response}");
}
