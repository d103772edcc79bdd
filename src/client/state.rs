use super::connection::{ConnectionState, ConnectionWriter};
use super::metrics::MetricsTracker;
use crate::infrastructure::TaskManager;
use crate::outbound::OutboundQueue;
use tokio::sync::watch;
use tokio::time::Instant;

/// Consolidated mutable state for RealtimeClient
/// Using a single struct keeps every transition atomic under one lock
pub(crate) struct ClientState {
    /// Current lifecycle state
    pub status: ConnectionState,

    /// Bumped whenever background tasks are cancelled; tasks from an older
    /// epoch must not touch state
    pub epoch: u64,

    /// Bumped by every disconnect(); a send that started before one must not
    /// requeue into the next session
    pub session: u64,

    /// Reconnect attempts scheduled since the last successful open
    pub reconnect_attempts: u32,

    /// Messages waiting for a connection
    pub queue: OutboundQueue,

    pub metrics: MetricsTracker,

    /// Reader, heartbeat and reconnect tasks
    pub task_manager: TaskManager,

    /// Writer for the open transport, if any
    pub writer: Option<ConnectionWriter>,

    /// Sender for state change notifications
    pub state_change_tx: watch::Sender<ConnectionState>,
}

impl ClientState {
    pub fn new(queue: OutboundQueue, state_change_tx: watch::Sender<ConnectionState>) -> Self {
        Self {
            status: ConnectionState::Disconnected,
            epoch: 0,
            session: 0,
            reconnect_attempts: 0,
            queue,
            metrics: MetricsTracker::default(),
            task_manager: TaskManager::new(),
            writer: None,
            state_change_tx,
        }
    }

    /// Set the lifecycle state and notify watchers
    pub fn set_status(&mut self, status: ConnectionState) {
        if self.status == status {
            return;
        }
        tracing::debug!("Connection state {} -> {}", self.status, status);
        self.status = status;
        self.state_change_tx.send_replace(status);
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Abort every background task and return the new epoch
    pub fn cancel_tasks(&mut self) -> u64 {
        self.task_manager.abort_all();
        self.epoch += 1;
        self.epoch
    }

    /// Shut the transport writer down, optionally closing the transport first.
    /// Writes still in flight on it fail.
    pub fn release_transport(&mut self, close_code: Option<u16>) {
        if let Some(writer) = self.writer.take() {
            writer.shutdown(close_code);
        }
        self.metrics.mark_disconnected(Instant::now());
    }
}
