use super::{EndpointIdentity, RealtimeClient};
use crate::infrastructure::ReconnectTimer;
use crate::types::{
    DEFAULT_CONNECTION_TIMEOUT, HEARTBEAT_INTERVAL, MAX_QUEUE_SIZE, RECONNECT_BASE_DELAY,
    RECONNECT_MAX_ATTEMPTS, RECONNECT_MAX_DELAY, RealtimeError, Result,
};
use crate::websocket::{Transport, WebSocketFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Tuning options for a [`RealtimeClient`]. Every field is optional when
/// deserialized; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RealtimeClientOptions {
    pub reconnect_max_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub connection_timeout_ms: u64,
    pub message_queue_max_size: usize,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            reconnect_max_attempts: RECONNECT_MAX_ATTEMPTS,
            reconnect_base_delay_ms: RECONNECT_BASE_DELAY,
            reconnect_max_delay_ms: RECONNECT_MAX_DELAY,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT,
            message_queue_max_size: MAX_QUEUE_SIZE,
        }
    }
}

impl RealtimeClientOptions {
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(RealtimeError::Config(
                "heartbeatIntervalMs must be greater than zero".to_string(),
            ));
        }
        if self.connection_timeout_ms == 0 {
            return Err(RealtimeError::Config(
                "connectionTimeoutMs must be greater than zero".to_string(),
            ));
        }
        if self.reconnect_base_delay_ms > self.reconnect_max_delay_ms {
            return Err(RealtimeError::Config(format!(
                "reconnectBaseDelayMs ({}) exceeds reconnectMaxDelayMs ({})",
                self.reconnect_base_delay_ms, self.reconnect_max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn reconnect_timer(&self) -> ReconnectTimer {
        ReconnectTimer::new(self.reconnect_base_delay_ms, self.reconnect_max_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

/// Builder for RealtimeClient that handles validation and transport injection
pub struct RealtimeClientBuilder {
    identity: EndpointIdentity,
    options: RealtimeClientOptions,
    transport: Option<Arc<dyn Transport>>,
}

impl RealtimeClientBuilder {
    /// Create a new builder
    pub fn new(endpoint: impl AsRef<str>, token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            identity: EndpointIdentity::new(endpoint.as_ref(), token)?,
            options: RealtimeClientOptions::default(),
            transport: None,
        })
    }

    pub fn options(mut self, options: RealtimeClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom transport instead of the default WebSocket one
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Build the client. No connection is opened and no task is spawned.
    pub fn build(self) -> Result<RealtimeClient> {
        self.options.validate()?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(WebSocketFactory));
        Ok(RealtimeClient::from_parts(
            self.identity,
            self.options,
            transport,
        ))
    }
}
