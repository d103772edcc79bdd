use crate::client::{ClientInner, ConnectionState, RealtimeClient};
use crate::outbound::SendOptions;
use crate::types::{
    HEARTBEAT_INTERVAL, RealtimeError, WS_CLOSE_ABNORMAL, constants::reserved_events,
};
use chrono::Utc;
use std::sync::Weak;
use std::time::Duration;
use tokio::time;

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(HEARTBEAT_INTERVAL);

/// Periodic liveness probe for one connected session.
///
/// The monitor never reconnects by itself: a failed probe is handed to the
/// client's connection-lost path.
pub(crate) struct HeartbeatManager {
    interval: Duration,
    client: Weak<ClientInner>,
    epoch: u64,
}

impl HeartbeatManager {
    pub fn new(client: Weak<ClientInner>, epoch: u64) -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            client,
            epoch,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs until the session ends; spawn it on the client's task manager
    pub async fn run(self) {
        // First probe one full interval after connecting
        let start = time::Instant::now() + self.interval;
        let mut interval_timer = time::interval_at(start, self.interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval_timer.tick().await;

            let Some(client) = RealtimeClient::upgrade(&self.client) else {
                // Client dropped, exit heartbeat task
                break;
            };
            if !client.is_current(self.epoch, ConnectionState::Connected) {
                break;
            }

            let sent_at = Utc::now();
            let probe = serde_json::json!({ "timestamp": sent_at.timestamp_millis() });

            // The bound covers waiting behind a stalled write as well as our own
            let result = time::timeout(
                self.interval,
                client.send(reserved_events::HEARTBEAT, probe, SendOptions::default()),
            )
            .await
            .unwrap_or_else(|_| {
                Err(RealtimeError::Transport(format!(
                    "heartbeat timed out after {} ms",
                    self.interval.as_millis()
                )))
            });

            match result {
                Ok(()) => {
                    client.record_heartbeat(self.epoch, sent_at);
                    tracing::debug!("Sent heartbeat");
                }
                Err(e) => {
                    tracing::error!("[Heartbeat] Failed to send: {}", e);
                    client.handle_connection_lost(
                        self.epoch,
                        WS_CLOSE_ABNORMAL,
                        &format!("heartbeat failed: {}", e),
                    );
                    break;
                }
            }
        }
    }
}
