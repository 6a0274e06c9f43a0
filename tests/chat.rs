use std::net::SocketAddr;
use std::time::Duration;

use chatrelay::{ConnId, Registry, Server, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    addr: SocketAddr,
    console: DuplexStream,
    registry: Registry,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (console, operator) = tokio::io::duplex(4096);

        let server = Server::new(ServerConfig::default());
        let registry = server.registry();
        let server = tokio::spawn(server.run(listener, BufReader::new(operator)));

        Self {
            addr,
            console,
            registry,
            server,
        }
    }

    async fn say(&mut self, line: &str) {
        self.console
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn join(&self) -> ChatClient {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        let mut client = ChatClient {
            stream,
            seen: String::new(),
            id: 0,
        };
        let welcome = client.wait_for("you are connection ").await;
        assert!(welcome.starts_with("Welcome to the chat"), "{welcome:?}");
        let line = client.wait_for("\n").await;
        client.id = line.trim().parse().unwrap();
        client
    }
}

struct ChatClient {
    stream: TcpStream,
    seen: String,
    id: u64,
}

impl ChatClient {
    async fn send(&mut self, text: &str) {
        self.stream.write_all(text.as_bytes()).await.unwrap();
    }

    /// Reads until `needle` shows up; returns everything up to and including it.
    async fn wait_for(&mut self, needle: &str) -> String {
        loop {
            if let Some(pos) = self.seen.find(needle) {
                return self.seen.drain(..pos + needle.len()).collect();
            }
            let mut buf = [0u8; 1024];
            let n = timeout(WAIT, self.stream.read(&mut buf))
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, saw {:?}", self.seen))
                .unwrap();
            assert!(n > 0, "connection closed while waiting for {needle:?}, saw {:?}", self.seen);
            self.seen.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    }

    /// Reads until the server closes the connection.
    async fn wait_closed(&mut self) -> String {
        let mut rest = Vec::new();
        let _ = timeout(WAIT, self.stream.read_to_end(&mut rest))
            .await
            .expect("server never closed the connection");
        self.seen.push_str(&String::from_utf8_lossy(&rest));
        std::mem::take(&mut self.seen)
    }
}

#[tokio::test]
async fn three_clients_relay_and_leave() {
    let mut harness = Harness::start().await;
    let mut a = harness.join().await;
    let mut b = harness.join().await;
    let mut c = harness.join().await;
    assert_eq!((a.id, b.id, c.id), (1, 2, 3));

    a.send("hello\n").await;
    for client in [&mut b, &mut c] {
        let got = client.wait_for("hello\n").await;
        assert!(got.ends_with("connection 1: hello\n"), "{got:?}");
    }

    // Everything A sees before the marker must not include its own message.
    harness.say("marker one").await;
    let before_marker = a.wait_for("Server: marker one\n").await;
    assert!(!before_marker.contains("hello"), "{before_marker:?}");
    b.wait_for("Server: marker one\n").await;
    c.wait_for("Server: marker one\n").await;

    drop(c);
    for client in [&mut a, &mut b] {
        client.wait_for("connection 3 has left the chat\n").await;
    }
    assert_eq!(harness.registry.ids(), vec![ConnId::new(1), ConnId::new(2)]);

    b.send("still here\n").await;
    let tail = a.wait_for("connection 2: still here\n").await;
    assert!(!tail.contains("has left"), "departure announced twice: {tail:?}");

    harness.say("marker two").await;
    let tail = a.wait_for("Server: marker two\n").await;
    assert!(!tail.contains("has left"), "departure announced twice: {tail:?}");
    b.wait_for("Server: marker two\n").await;

    harness.server.abort();
}

#[tokio::test]
async fn join_is_announced_to_others_only() {
    let mut harness = Harness::start().await;
    let mut a = harness.join().await;
    let mut b = harness.join().await;

    let seen_by_a = a.wait_for("connection 2 has joined the chat\n").await;
    assert!(!seen_by_a.contains("connection 1 has joined"), "{seen_by_a:?}");

    harness.say("marker").await;
    let seen_by_b = b.wait_for("Server: marker\n").await;
    assert!(!seen_by_b.contains("has joined"), "{seen_by_b:?}");
    let seen_by_a = a.wait_for("Server: marker\n").await;
    assert!(!seen_by_a.contains("has joined"), "joined announced twice: {seen_by_a:?}");

    harness.server.abort();
}

#[tokio::test]
async fn half_closed_client_is_dropped_and_announced() {
    let harness = Harness::start().await;
    let mut a = harness.join().await;
    let mut b = harness.join().await;

    b.stream.shutdown().await.unwrap();

    a.wait_for("connection 2 has left the chat\n").await;
    // the session releases the socket once it has drained
    b.wait_closed().await;
    assert_eq!(harness.registry.ids(), vec![ConnId::new(1)]);

    harness.server.abort();
}

#[tokio::test]
async fn reset_connection_is_announced_once() {
    let mut harness = Harness::start().await;
    let mut a = harness.join().await;
    let mut b = harness.join().await;
    let c = harness.join().await;
    for client in [&mut a, &mut b] {
        client.wait_for("connection 3 has joined the chat\n").await;
    }

    // Zero linger turns the close into a TCP reset.
    #[allow(deprecated)]
    c.stream.set_linger(Some(Duration::ZERO)).unwrap();
    drop(c);

    for client in [&mut a, &mut b] {
        client.wait_for("connection 3 has left the chat\n").await;
    }
    assert!(!harness.registry.contains(ConnId::new(3)));
    assert_eq!(harness.registry.ids(), vec![ConnId::new(1), ConnId::new(2)]);

    harness.say("marker").await;
    for client in [&mut a, &mut b] {
        let tail = client.wait_for("Server: marker\n").await;
        assert!(!tail.contains("has left"), "departure announced twice: {tail:?}");
    }

    harness.server.abort();
}

#[tokio::test]
async fn exit_token_shuts_everything_down() {
    let mut harness = Harness::start().await;
    let mut a = harness.join().await;
    let mut b = harness.join().await;
    a.wait_for("connection 2 has joined the chat\n").await;

    harness.say("closing soon").await;
    harness.say(".exit").await;

    timeout(WAIT, &mut harness.server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    a.wait_closed().await;
    b.wait_closed().await;
    assert!(harness.registry.is_empty());
    assert!(TcpStream::connect(harness.addr).await.is_err());
}

#[tokio::test]
async fn closed_console_keeps_the_server_running() {
    let Harness {
        addr,
        console,
        registry,
        server,
    } = Harness::start().await;
    drop(console);

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = ChatClient {
        stream,
        seen: String::new(),
        id: 0,
    };
    client.wait_for("you are connection 1\n").await;
    assert_eq!(registry.len(), 1);
    assert!(!server.is_finished());

    server.abort();
}
