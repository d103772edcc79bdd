use crate::types::RealtimeMessage;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Delivery options for a single `send()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Queue the message for later delivery instead of failing when it cannot be
    /// written right now.
    pub retry: bool,
    /// Upper bound on a single transport write of this message.
    pub timeout: Option<Duration>,
}

impl SendOptions {
    /// Options with `retry` enabled
    pub fn retry() -> Self {
        Self {
            retry: true,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One pending send, owned by the outbound queue until transmitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEnvelope {
    pub(crate) seq: u64,
    pub event: String,
    pub data: Value,
    pub options: SendOptions,
    pub enqueued_at: DateTime<Utc>,
}

impl OutboundEnvelope {
    pub fn new(event: impl Into<String>, data: Value, options: SendOptions) -> Self {
        Self {
            seq: 0,
            event: event.into(),
            data,
            options,
            enqueued_at: Utc::now(),
        }
    }

    /// Serialize to a wire frame; the wire timestamp is the time of `send()`
    pub fn to_frame(&self) -> serde_json::Result<String> {
        let message =
            RealtimeMessage::new(self.event.clone(), self.data.clone()).with_timestamp(self.enqueued_at);
        serde_json::to_string(&message)
    }
}
