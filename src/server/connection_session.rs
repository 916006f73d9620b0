//! Connection Session Layer: per-client state machine.
//!
//! `Connected` --live--> `Subscribed` --stop--> `Connected`.
//! Both transitions are idempotent and always acknowledged. Snapshot
//! requests are answered in any state and only to this client.
//!
//! The session owns the registry membership and is the only thing that
//! removes it: dropping the session deregisters the connection (RAII), so
//! teardown cannot leak a subscription and `state` never disagrees with
//! the registry.

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use crate::live::ConnectionId;
use crate::server::protocol::{Command, Reply};
use crate::TopgEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Subscribed,
}

pub struct ConnectionSession {
    id: ConnectionId,
    state: SessionState,
    engine: TopgEngine,
    outbound: mpsc::Sender<Message>,
}

impl ConnectionSession {
    /// Registers the connection and sends the greeting.
    pub async fn open(engine: TopgEngine, outbound: mpsc::Sender<Message>) -> Self {
        let session = Self {
            id: ConnectionId::new(),
            state: SessionState::Connected,
            engine,
            outbound,
        };

        let open = session.engine.stats.connection_opened();
        tracing::info!("Client {} connected, total connections: {}", session.id, open);

        session.reply(Reply::connected()).await;
        session
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn handle_text(&mut self, text: &str) {
        let command = Command::parse(text);
        tracing::debug!("Client {} -> {:?}", self.id, command);

        match command {
            Command::Snapshot => {
                // Sampling awaits the child process; other connections keep running.
                let json = self.engine.sampler.capture_json().await;
                self.engine.stats.record_snapshot();
                self.send(Message::Text(json.into())).await;
            }
            Command::Live => {
                self.subscribe();
                self.reply(Reply::live()).await;
            }
            Command::Stop => {
                self.unsubscribe();
                self.reply(Reply::stopped()).await;
            }
            Command::Unknown(text) => {
                self.reply(Reply::unknown(&text)).await;
            }
        }
    }

    // --- TRANSITIONS ---

    fn subscribe(&mut self) {
        if self.state == SessionState::Subscribed {
            return;
        }
        self.engine.live.subscribe(self.id, self.outbound.clone());
        self.state = SessionState::Subscribed;
        tracing::info!(
            "Client {} subscribed to live updates, total live subscribers: {}",
            self.id,
            self.engine.live.len()
        );
    }

    fn unsubscribe(&mut self) {
        if self.state == SessionState::Connected {
            return;
        }
        self.engine.live.unsubscribe(&self.id);
        self.state = SessionState::Connected;
        tracing::info!(
            "Client {} unsubscribed from live updates, remaining live subscribers: {}",
            self.id,
            self.engine.live.len()
        );
    }

    // --- OUTBOUND ---

    async fn reply(&self, reply: Reply) {
        self.send(Message::Text(reply.to_json().into())).await;
    }

    async fn send(&self, msg: Message) {
        if self.outbound.send(msg).await.is_err() {
            tracing::debug!("Client {} gone, dropping reply", self.id);
        }
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        if self.state == SessionState::Subscribed {
            self.engine.live.unsubscribe(&self.id);
            self.state = SessionState::Connected;
        }
        let open = self.engine.stats.connection_closed();
        tracing::info!(
            "Client {} disconnected, total connections: {}, live subscribers: {}",
            self.id,
            open,
            self.engine.live.len()
        );
    }
}
