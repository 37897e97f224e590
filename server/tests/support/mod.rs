// Shared primitives for one-time server bootstrapping across integration
// tests, plus a small WebSocket test client speaking the wire protocol.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use game_core::protocol::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use uuid::Uuid;

// Global ws URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

/// Ensure the test server is running and return the shared `ws://` URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_addr = Arc::new(OnceLock::<String>::new());
        let published_addr_thread = Arc::clone(&published_addr);
        // A dedicated OS thread so the server outlives individual
        // #[tokio::test] runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_addr_thread.set(addr.to_string());
                server::run(listener).await.expect("server failed");
            });
        });
        wait_for_readiness(published_addr);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn wait_for_readiness(published_addr: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(format!("ws://{addr}/ws"));

    // Retry for a short period to avoid racing server bind/accept.
    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

/// A connected client that has completed the welcome handshake.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub user_id: Uuid,
    pub username: String,
}

impl TestClient {
    pub async fn connect() -> TestClient {
        let url = ensure_server();
        let (ws, _) = connect_async(url).await.expect("ws connect");
        let mut client = TestClient {
            ws,
            user_id: Uuid::nil(),
            username: String::new(),
        };
        let msg = client.recv().await;
        let ServerMessage::Welcome { user_id, username } = msg else {
            panic!("expected welcome, got {msg:?}");
        };
        client.user_id = user_id;
        client.username = username;
        client
    }

    pub async fn send(&mut self, msg: &ClientMessage) {
        let text = serde_json::to_string(msg).expect("encode");
        self.ws
            .send(tungstenite::Message::Text(text))
            .await
            .expect("ws send");
    }

    /// Next protocol message, transparently answering keepalive frames.
    pub async fn recv(&mut self) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
                .await
                .expect("timed out waiting for server message")
                .expect("connection closed")
                .expect("ws error");
            match frame {
                tungstenite::Message::Text(text) => {
                    return serde_json::from_str(&text).expect("decode server message");
                }
                tungstenite::Message::Ping(payload) => {
                    let _ = self.ws.send(tungstenite::Message::Pong(payload)).await;
                }
                tungstenite::Message::Pong(_) => {}
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    /// Skips unrelated broadcasts (user lists and the like) until `pick`
    /// accepts a message.
    pub async fn recv_until<T>(&mut self, mut pick: impl FnMut(ServerMessage) -> Option<T>) -> T {
        for _ in 0..64 {
            if let Some(found) = pick(self.recv().await) {
                return found;
            }
        }
        panic!("expected message never arrived");
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
