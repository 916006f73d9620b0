pub mod types;
pub mod registry;
pub mod dispatcher;

pub use dispatcher::BroadcastDispatcher;
pub use registry::SubscriptionRegistry;
pub use types::*;
