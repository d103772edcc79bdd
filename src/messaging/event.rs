use crate::types::{RealtimeError, constants::reserved_events};
use serde::{Deserialize, Serialize};

/// Lifecycle events the client dispatches itself
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemEvent {
    Connected,
    ConnectionHealth,
    Error,
}

impl SystemEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => reserved_events::CONNECTED,
            Self::ConnectionHealth => reserved_events::CONNECTION_HEALTH,
            Self::Error => reserved_events::ERROR,
        }
    }

    /// Parse a reserved name; application-defined names return `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            reserved_events::CONNECTED => Some(Self::Connected),
            reserved_events::CONNECTION_HEALTH => Some(Self::ConnectionHealth),
            reserved_events::ERROR => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `connection.health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub connected: bool,
    /// Unix epoch milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ConnectionHealth {
    pub fn up(timestamp: i64) -> Self {
        Self {
            connected: true,
            timestamp: Some(timestamp),
        }
    }

    pub fn down(timestamp: Option<i64>) -> Self {
        Self {
            connected: false,
            timestamp,
        }
    }
}

/// Payload of `error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<&RealtimeError> for ErrorPayload {
    fn from(err: &RealtimeError) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert_eq!(SystemEvent::parse("connected"), Some(SystemEvent::Connected));
        assert_eq!(
            SystemEvent::parse("connection.health"),
            Some(SystemEvent::ConnectionHealth)
        );
        assert_eq!(SystemEvent::parse("error"), Some(SystemEvent::Error));
        assert_eq!(SystemEvent::parse("chat.message"), None);
    }

    #[test]
    fn test_health_payload_shape() {
        let down = serde_json::to_value(ConnectionHealth::down(None)).unwrap();
        assert_eq!(down, serde_json::json!({"connected": false}));

        let up = serde_json::to_value(ConnectionHealth::up(1_700_000_000_000)).unwrap();
        assert_eq!(
            up,
            serde_json::json!({"connected": true, "timestamp": 1_700_000_000_000_i64})
        );
    }

    #[test]
    fn test_error_payload_shape() {
        let payload = ErrorPayload::from(&RealtimeError::MaxReconnectAttemptsExceeded(5));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Maximum reconnect attempts (5) exceeded"})
        );

        let json = serde_json::to_value(ErrorPayload::new("closed").with_code(1006)).unwrap();
        assert_eq!(json["code"], 1006);
    }
}
