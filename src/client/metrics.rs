use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Read-only snapshot of connection counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_attempts: u32,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Time spent connected during the current lifecycle
    pub uptime: Duration,
    pub queue_length: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    messages_sent: u64,
    messages_received: u64,
    last_heartbeat: Option<DateTime<Utc>>,
    connected_since: Option<Instant>,
    accumulated_uptime: Duration,
}

impl MetricsTracker {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_sent(&mut self) {
        self.messages_sent += 1;
    }

    pub fn record_received(&mut self) {
        self.messages_received += 1;
    }

    pub fn record_heartbeat(&mut self, at: DateTime<Utc>) {
        self.last_heartbeat = Some(at);
    }

    pub fn mark_connected(&mut self, now: Instant) {
        if self.connected_since.is_none() {
            self.connected_since = Some(now);
        }
    }

    pub fn mark_disconnected(&mut self, now: Instant) {
        if let Some(since) = self.connected_since.take() {
            self.accumulated_uptime += now.saturating_duration_since(since);
        }
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        let current = self
            .connected_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        self.accumulated_uptime + current
    }

    pub fn snapshot(&self, reconnect_attempts: u32, queue_length: usize) -> ConnectionMetrics {
        ConnectionMetrics {
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            reconnect_attempts,
            last_heartbeat: self.last_heartbeat,
            uptime: self.uptime(Instant::now()),
            queue_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn uptime_accumulates_across_connected_periods() {
        let mut tracker = MetricsTracker::default();

        tracker.mark_connected(Instant::now());
        tokio::time::advance(Duration::from_secs(3)).await;
        tracker.mark_disconnected(Instant::now());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(tracker.uptime(Instant::now()), Duration::from_secs(3));

        tracker.mark_connected(Instant::now());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(tracker.uptime(Instant::now()), Duration::from_secs(5));
    }

    #[test]
    fn reset_clears_counters() {
        let mut tracker = MetricsTracker::default();
        tracker.record_sent();
        tracker.record_received();
        tracker.record_heartbeat(Utc::now());

        tracker.reset();
        let snapshot = tracker.snapshot(0, 0);
        assert_eq!(snapshot.messages_sent, 0);
        assert_eq!(snapshot.messages_received, 0);
        assert_eq!(snapshot.last_heartbeat, None);
        assert_eq!(snapshot.uptime, Duration::ZERO);
    }
}
