// Module declarations
mod builder;
mod connection;
mod core;
mod identity;
mod metrics;
mod state;

// Public API exports
pub use self::core::RealtimeClient;
pub use builder::{RealtimeClientBuilder, RealtimeClientOptions};
pub use connection::ConnectionState;
pub use identity::EndpointIdentity;
pub use metrics::ConnectionMetrics;

pub(crate) use self::core::ClientInner;
pub(crate) use connection::ConnectionWriter;
pub(crate) use state::ClientState;
