//! # Resilient Realtime
//!
//! A resilient realtime connection client over WebSocket: connection state
//! machine, heartbeat monitoring, reconnection with exponential backoff, a
//! bounded outbound queue, and an in-process event dispatcher.
//!
//! Messages travel as JSON envelopes:
//!
//! ```json
//! { "event": "chat.message", "data": { "text": "hi" }, "timestamp": "2024-05-01T12:30:00Z" }
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use resilient_realtime::{RealtimeClient, RealtimeClientOptions, SendOptions, listener};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new(
//!         "wss://chat.example.com/ws",
//!         "session-token",
//!         RealtimeClientOptions::default(),
//!     )?;
//!
//!     client.on("error", listener(|err| eprintln!("realtime error: {err}")));
//!     client.connect().await?;
//!     client
//!         .send("chat.message", serde_json::json!({"text": "hi"}), SendOptions::retry())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod outbound;
pub mod types;
pub mod websocket;

pub use client::{
    ConnectionMetrics, ConnectionState, EndpointIdentity, RealtimeClient, RealtimeClientBuilder,
    RealtimeClientOptions,
};
pub use messaging::{ConnectionHealth, ErrorPayload, EventDispatcher, Listener, listener};
pub use outbound::{OutboundEnvelope, SendOptions};
pub use types::{RealtimeError, RealtimeMessage, Result};
pub use websocket::{Transport, TransportConnection, TransportEvent, TransportSink, WebSocketFactory};
