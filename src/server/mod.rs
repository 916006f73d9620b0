pub mod protocol;
pub mod connection_session;
pub mod network;

pub use connection_session::{ConnectionSession, SessionState};
pub use network::{create_router, serve, AppState};
