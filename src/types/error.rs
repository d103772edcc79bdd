use thiserror::Error;

/// Errors that can occur when using the realtime client.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport-level failure reported by the underlying connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// A connect attempt was abandoned before it completed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Missing or unusable credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid client options
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The transport did not open within the connection timeout
    #[error("Connection timed out after {0} ms")]
    ConnectionTimeout(u64),

    /// `connect()` called while a connection attempt is already underway
    #[error("Already connecting")]
    AlreadyConnecting,

    /// `connect()` called while connected
    #[error("Already connected")]
    AlreadyConnected,

    /// Reconnection gave up
    #[error("Maximum reconnect attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,

    /// The outbound queue is at capacity
    #[error("Outbound queue is full ({0} messages)")]
    QueueFull(usize),

    /// Writing a message to the transport failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// A listener panicked while handling an event
    #[error("Listener for '{event}' failed: {message}")]
    Listener { event: String, message: String },
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
