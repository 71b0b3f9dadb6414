//! End-to-end chat scenarios against a real server on an ephemeral port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};

use parley::AppState;
use parley::client::ChatSession;
use parley::config::{IdentityPolicy, ServerConfig};
use parley::session::ConnectionId;
use parley::ws::{ClientMessage, MessageDraft, OnlineUsersResponse, ServerMessage};

const STEP: Duration = Duration::from_secs(5);

async fn start_server(policy: IdentityPolicy) -> (SocketAddr, AppState) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(ServerConfig::default(), policy);
    tokio::spawn(parley::serve(
        listener,
        state.clone(),
        std::future::pending::<()>(),
    ));
    (addr, state)
}

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    id: ConnectionId,
}

impl TestClient {
    /// Connect and consume the greeting.
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = timeout(
            STEP,
            tokio_tungstenite::connect_async(format!("ws://{addr}/ws")),
        )
        .await
        .expect("connect timed out")
        .expect("connect failed");
        let mut client = Self {
            ws,
            id: ConnectionId(0),
        };
        match client.recv().await {
            ServerMessage::Connected { id } => client.id = id,
            other => panic!("Expected greeting first, got {:?}", other),
        }
        client
    }

    async fn send(&mut self, msg: &ClientMessage) {
        let json = serde_json::to_string(msg).unwrap();
        self.send_raw(&json).await;
    }

    async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(tungstenite::Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        loop {
            let frame = timeout(STEP, self.ws.next())
                .await
                .expect("recv timed out")
                .expect("socket closed")
                .expect("socket error");
            if let tungstenite::Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Assert nothing arrives within a short window.
    async fn expect_silence(&mut self) {
        if let Ok(Some(Ok(tungstenite::Message::Text(text)))) =
            timeout(Duration::from_millis(200), self.ws.next()).await
        {
            panic!("Expected no event, got {}", text);
        }
    }

    async fn login(&mut self, username: &str) {
        self.send(&ClientMessage::SetUsername {
            username: username.into(),
        })
        .await;
        assert_eq!(self.recv().await, ServerMessage::LoggedIn);
    }

    async fn say(&mut self, text: &str) {
        self.send(&ClientMessage::SendMessage(MessageDraft {
            text: text.into(),
            ..Default::default()
        }))
        .await;
    }

    async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

async fn online_usernames(addr: SocketAddr) -> Vec<String> {
    let resp: OnlineUsersResponse = reqwest::get(format!("http://{addr}/online-users"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    resp.online_users.into_iter().map(|u| u.username).collect()
}

#[tokio::test]
async fn alice_and_bob_chat_and_part() {
    let (addr, _state) = start_server(IdentityPolicy::default()).await;

    let mut x = TestClient::connect(addr).await;
    x.login("alice").await;

    let mut y = TestClient::connect(addr).await;
    y.login("bob").await;
    assert_eq!(x.recv().await, ServerMessage::NewConnection);

    assert_eq!(online_usernames(addr).await, vec!["alice", "bob"]);

    // X keeps its own transcript; the server does not echo.
    let mut x_view = ChatSession::new();
    x_view.apply(ServerMessage::Connected { id: x.id });
    x_view.login("alice").unwrap();
    x_view.apply(ServerMessage::LoggedIn);
    let frame = x_view.compose("hi", 1_700_000_000_000).unwrap();
    assert_eq!(x_view.messages().last().unwrap().text, "hi");
    x.send(&frame).await;

    match y.recv().await {
        ServerMessage::Message(msg) => {
            assert_eq!(msg.text, "hi");
            assert_eq!(msg.sender, "alice");
            assert_eq!(msg.id, x.id.to_string());
            assert_eq!(msg.timestamp, 1_700_000_000_000);
        }
        other => panic!("Expected Message, got {:?}", other),
    }
    x.expect_silence().await;

    y.close().await;
    assert_eq!(x.recv().await, ServerMessage::NewConnection);
    assert_eq!(online_usernames(addr).await, vec!["alice"]);
}

#[tokio::test]
async fn message_before_login_is_not_delivered() {
    let (addr, state) = start_server(IdentityPolicy::default()).await;

    let mut anon = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    bob.login("bob").await;

    anon.say("sneaky").await;
    bob.expect_silence().await;
    assert_eq!(state.metrics.snapshot().messages.unauthenticated, 1);

    // The connection is still usable afterwards.
    anon.login("late").await;
    assert_eq!(bob.recv().await, ServerMessage::NewConnection);
    anon.say("hello now").await;
    match bob.recv().await {
        ServerMessage::Message(msg) => assert_eq!(msg.text, "hello now"),
        other => panic!("Expected Message, got {:?}", other),
    }
}

#[tokio::test]
async fn anonymous_peers_receive_messages_but_not_presence() {
    let (addr, _state) = start_server(IdentityPolicy::default()).await;

    let mut lurker = TestClient::connect(addr).await;
    let mut alice = TestClient::connect(addr).await;
    alice.login("alice").await;
    lurker.expect_silence().await;

    alice.say("anyone?").await;
    match lurker.recv().await {
        ServerMessage::Message(msg) => assert_eq!(msg.text, "anyone?"),
        other => panic!("Expected Message, got {:?}", other),
    }
    assert_eq!(online_usernames(addr).await, vec!["alice"]);
}

#[tokio::test]
async fn concurrent_senders_keep_per_sender_order() {
    const SENDERS: usize = 3;
    const PER_SENDER: usize = 20;

    let (addr, _state) = start_server(IdentityPolicy::default()).await;

    let mut observer = TestClient::connect(addr).await;
    observer.login("observer").await;

    let mut senders = Vec::new();
    for i in 0..SENDERS {
        let mut client = TestClient::connect(addr).await;
        client.login(&format!("sender{i}")).await;
        assert_eq!(observer.recv().await, ServerMessage::NewConnection);
        senders.push(client);
    }

    let tasks: Vec<_> = senders
        .into_iter()
        .enumerate()
        .map(|(i, mut client)| {
            tokio::spawn(async move {
                for n in 0..PER_SENDER {
                    client.say(&format!("{i}:{n}")).await;
                }
                client
            })
        })
        .collect();

    let mut seen: HashMap<String, Vec<usize>> = HashMap::new();
    let mut received = 0;
    while received < SENDERS * PER_SENDER {
        if let ServerMessage::Message(msg) = observer.recv().await {
            let (_, n) = msg.text.split_once(':').unwrap();
            seen.entry(msg.sender).or_default().push(n.parse().unwrap());
            received += 1;
        }
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(seen.len(), SENDERS);
    let expected: Vec<usize> = (0..PER_SENDER).collect();
    for (sender, order) in seen {
        assert_eq!(order, expected, "out of order from {sender}");
    }
}

#[tokio::test]
async fn peer_leaving_mid_broadcast_does_not_block_others() {
    let (addr, _state) = start_server(IdentityPolicy::default()).await;

    let mut alice = TestClient::connect(addr).await;
    alice.login("alice").await;
    let mut bob = TestClient::connect(addr).await;
    bob.login("bob").await;
    let mut carol = TestClient::connect(addr).await;
    carol.login("carol").await;
    // alice saw bob and carol, bob saw carol
    alice.recv().await;
    alice.recv().await;
    bob.recv().await;

    let sender = tokio::spawn(async move {
        for n in 0..30 {
            alice.say(&format!("m{n}")).await;
        }
        alice
    });
    // Drop bob abruptly while messages are flowing.
    drop(bob);

    let mut texts = Vec::new();
    while texts.len() < 30 {
        match carol.recv().await {
            ServerMessage::Message(msg) => texts.push(msg.text),
            ServerMessage::NewConnection => {}
            other => panic!("Unexpected event {:?}", other),
        }
    }
    let expected: Vec<String> = (0..30).map(|n| format!("m{n}")).collect();
    assert_eq!(texts, expected);
    sender.await.unwrap();
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let (addr, state) = start_server(IdentityPolicy::default()).await;

    let mut x = TestClient::connect(addr).await;
    x.send_raw("not json").await;
    x.send_raw(r#"{"type":"typing"}"#).await;
    x.send_raw(r#"{"type":"sendmessage"}"#).await;
    x.login("alice").await;

    assert_eq!(state.metrics.snapshot().errors.malformed_frames, 3);
}

#[tokio::test]
async fn relogin_overwrites_name_in_place() {
    let (addr, _state) = start_server(IdentityPolicy::default()).await;

    let mut x = TestClient::connect(addr).await;
    x.login("alice").await;
    let mut y = TestClient::connect(addr).await;
    y.login("bob").await;
    x.recv().await;

    x.login("alicia").await;
    assert_eq!(y.recv().await, ServerMessage::NewConnection);
    assert_eq!(online_usernames(addr).await, vec!["alicia", "bob"]);
}

#[tokio::test]
async fn unique_usernames_policy_rejects_duplicates() {
    let (addr, _state) = start_server(IdentityPolicy {
        allow_rename: true,
        unique_usernames: true,
    })
    .await;

    let mut x = TestClient::connect(addr).await;
    x.login("sam").await;

    let mut y = TestClient::connect(addr).await;
    y.send(&ClientMessage::SetUsername {
        username: "sam".into(),
    })
    .await;
    match y.recv().await {
        ServerMessage::LoginRejected(r) => assert_eq!(r.reason, "username_taken"),
        other => panic!("Expected LoginRejected, got {:?}", other),
    }
    x.expect_silence().await;
    assert_eq!(online_usernames(addr).await, vec!["sam"]);
}

#[tokio::test]
async fn health_reports_live_connections() {
    let (addr, _state) = start_server(IdentityPolicy::default()).await;

    let mut x = TestClient::connect(addr).await;
    x.login("alice").await;

    let health: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["connections"], 1);
    assert_eq!(health["online_users"], 1);
}

#[tokio::test]
async fn abrupt_disconnect_leaves_server_healthy() {
    let (addr, state) = start_server(IdentityPolicy::default()).await;

    let mut x = TestClient::connect(addr).await;
    x.login("alice").await;
    // Drop the socket without a close handshake.
    drop(x);

    let health = timeout(STEP, async {
        loop {
            let health: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if health["connections"] == 0 {
                return health;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("connection never cleaned up");

    assert_eq!(health["status"], "healthy");
    assert_eq!(health["online_users"], 0);
    assert!(online_usernames(addr).await.is_empty());
    assert_eq!(state.metrics.snapshot().connections.abrupt_closes, 1);
}
