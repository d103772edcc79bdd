// WebSocket module - transport seam and the default tungstenite transport
mod factory;
mod transport;

pub use factory::WebSocketFactory;
pub use transport::{Transport, TransportConnection, TransportEvent, TransportSink};
