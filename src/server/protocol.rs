//! Text protocol spoken over the WebSocket.
//!
//! Inbound: `/gpu` (one snapshot), `/live` (subscribe), `/stop` (unsubscribe).
//! Outbound: status objects, error objects and snapshot arrays.

use serde::Serialize;

pub const HELP: &str = "/gpu, /live, /stop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Snapshot,
    Live,
    Stop,
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "/gpu" | "gpu" | "/snapshot" | "snapshot" => Command::Snapshot,
            "/live" | "live" | "/subscribe" | "subscribe" => Command::Live,
            "/stop" | "stop" | "/unsubscribe" | "unsubscribe" => Command::Stop,
            _ => Command::Unknown(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Connected { status: &'static str, help: &'static str },
    Status { status: &'static str, message: &'static str },
    Error { error: String },
}

impl Reply {
    pub fn connected() -> Self {
        Reply::Connected { status: "connected", help: HELP }
    }

    pub fn live() -> Self {
        Reply::Status { status: "live", message: "Live updates enabled" }
    }

    pub fn stopped() -> Self {
        Reply::Status { status: "stopped", message: "Live updates stopped" }
    }

    pub fn unknown(text: &str) -> Self {
        Reply::Error { error: format!("Unknown command: {}", text) }
    }

    pub fn to_json(&self) -> String {
        // Only string fields: serialisation cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
