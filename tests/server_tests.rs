#![cfg(unix)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use topg::config::ServerConfig;
use topg::server::{serve, AppState};
use topg::TopgEngine;

mod helpers;
use helpers::{json, setup_engine, TWO_GPUS, WAIT};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TICK: Duration = Duration::from_millis(100);

struct TestServer {
    addr: SocketAddr,
    engine: TopgEngine,
    shutdown: CancellationToken,
    _tmp: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_server() -> TestServer {
    let (engine, tmp) = setup_engine(TWO_GPUS);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        ping_interval: Duration::from_secs(3600),
        ..ServerConfig::default()
    };
    let state = Arc::new(AppState {
        engine: engine.clone(),
        server,
    });

    engine.dispatcher(TICK).spawn(shutdown.clone());
    tokio::spawn(serve(listener, state, shutdown.clone()));

    TestServer {
        addr,
        engine,
        shutdown,
        _tmp: tmp,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.expect("handshake");
    ws
}

/// Next text frame, skipping control frames.
async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

/// Reads until a status object with `status` arrives, skipping broadcast arrays.
async fn expect_status(ws: &mut Client, status: &str) {
    loop {
        let text = next_text(ws).await;
        if text.starts_with('[') {
            continue;
        }
        assert_eq!(json(&text)["status"], status, "got {}", text);
        return;
    }
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

#[cfg(test)]
mod server_tests {
    use super::*;

    #[tokio::test]
    async fn test_end_to_end_flow() {
        let server = start_server().await;
        let mut ws = connect(server.addr).await;

        // 1. Greeting
        let greeting = json(&next_text(&mut ws).await);
        assert_eq!(greeting["status"], "connected");
        assert_eq!(greeting["help"], "/gpu, /live, /stop");

        // 2. On-demand snapshot
        send(&mut ws, "/gpu").await;
        let snapshot = json(&next_text(&mut ws).await);
        let items = snapshot.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "NVIDIA GeForce RTX 3080");
        assert_eq!(items[0]["temperature.gpu"], 40);

        // 3. Live updates
        send(&mut ws, "/live").await;
        expect_status(&mut ws, "live").await;
        let broadcast = json(&next_text(&mut ws).await);
        assert_eq!(broadcast.as_array().unwrap().len(), 2);

        // 4. Stop
        send(&mut ws, "/stop").await;
        expect_status(&mut ws, "stopped").await;

        // 5. Silence afterwards
        let quiet = tokio::time::timeout(TICK * 4, ws.next()).await;
        assert!(quiet.is_err(), "no frames expected after /stop, got {:?}", quiet);
    }

    #[tokio::test]
    async fn test_unknown_command_over_socket() {
        let server = start_server().await;
        let mut ws = connect(server.addr).await;
        next_text(&mut ws).await;

        send(&mut ws, "hello").await;
        let reply = json(&next_text(&mut ws).await);
        assert_eq!(reply["error"], "Unknown command: hello");

        // Still usable afterwards.
        send(&mut ws, "/gpu").await;
        assert!(next_text(&mut ws).await.starts_with('['));
    }

    #[tokio::test]
    async fn test_binary_frame_is_read_as_command() {
        let server = start_server().await;
        let mut ws = connect(server.addr).await;
        next_text(&mut ws).await;

        ws.send(Message::binary(b"/live".to_vec())).await.unwrap();
        expect_status(&mut ws, "live").await;
        assert_eq!(server.engine.live.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_connection() {
        let server = start_server().await;
        let mut ws = connect(server.addr).await;
        next_text(&mut ws).await;
        assert_eq!(server.engine.stats.connections(), 1);

        let big = "x".repeat(17 * 1024);
        // The server may already be gone by the time the write completes.
        let _ = ws.send(Message::Text(big.as_str().into())).await;

        loop {
            let msg = tokio::time::timeout(WAIT, ws.next())
                .await
                .expect("connection should close");
            match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(other)) => panic!("unexpected frame {:?}", other),
            }
        }

        let deadline = tokio::time::Instant::now() + WAIT;
        while server.engine.stats.connections() != 0 {
            assert!(tokio::time::Instant::now() < deadline, "session not torn down");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_any_path_upgrades() {
        let server = start_server().await;
        let (mut ws, _) = connect_async(format!("ws://{}/whatever", server.addr))
            .await
            .expect("handshake on arbitrary path");
        assert_eq!(json(&next_text(&mut ws).await)["status"], "connected");
    }

    #[tokio::test]
    async fn test_disconnect_removes_subscriber() {
        let server = start_server().await;
        let mut ws = connect(server.addr).await;
        next_text(&mut ws).await;

        send(&mut ws, "/live").await;
        expect_status(&mut ws, "live").await;
        assert_eq!(server.engine.live.len(), 1);

        ws.close(None).await.unwrap();
        drop(ws);

        let deadline = tokio::time::Instant::now() + WAIT;
        while server.engine.live.len() != 0 || server.engine.stats.connections() != 0 {
            assert!(tokio::time::Instant::now() < deadline, "subscriber not removed");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let server = start_server().await;
        let mut a = connect(server.addr).await;
        let mut b = connect(server.addr).await;
        let mut idle = connect(server.addr).await;
        for ws in [&mut a, &mut b, &mut idle] {
            next_text(ws).await;
        }

        send(&mut a, "/live").await;
        send(&mut b, "/live").await;
        expect_status(&mut a, "live").await;
        expect_status(&mut b, "live").await;

        assert!(next_text(&mut a).await.starts_with('['));
        assert!(next_text(&mut b).await.starts_with('['));
        let quiet = tokio::time::timeout(TICK * 3, idle.next()).await;
        assert!(quiet.is_err(), "unsubscribed client must not receive broadcasts");
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let server = start_server().await;
        let mut ws = connect(server.addr).await;
        next_text(&mut ws).await;
        send(&mut ws, "/live").await;
        expect_status(&mut ws, "live").await;

        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream
            .write_all(b"GET /api/stats HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        tokio::time::timeout(WAIT, stream.read_to_string(&mut raw))
            .await
            .expect("stats response")
            .unwrap();

        assert!(raw.starts_with("HTTP/1.1 200"), "{}", raw);
        let body = &raw[raw.find('{').unwrap()..=raw.rfind('}').unwrap()];
        let stats = json(body);
        assert_eq!(stats["topic"], "gpu_live");
        assert_eq!(stats["connections"], 1);
        assert_eq!(stats["live_subscribers"], 1);
        assert!(stats["server_time"].is_string());
    }
}
