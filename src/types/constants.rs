/// Reserved event names (magic strings layer)
pub mod reserved_events {
    pub const CONNECTED: &str = "connected";
    pub const CONNECTION_HEALTH: &str = "connection.health";
    pub const ERROR: &str = "error";
    pub const HEARTBEAT: &str = "heartbeat";
}

/// Query parameter carrying the auth token on the connection URI
pub const AUTH_TOKEN_PARAM: &str = "token";

/// Default connection timeout (milliseconds)
pub const DEFAULT_CONNECTION_TIMEOUT: u64 = 5000;

/// Default heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 30000;

/// Default reconnect backoff (milliseconds)
pub const RECONNECT_BASE_DELAY: u64 = 1000;
pub const RECONNECT_MAX_DELAY: u64 = 30000;
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Max outbound queue size
pub const MAX_QUEUE_SIZE: usize = 100;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_NO_STATUS: u16 = 1005;
pub const WS_CLOSE_ABNORMAL: u16 = 1006;
