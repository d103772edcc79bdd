use super::{
    ClientState, ConnectionMetrics, ConnectionState, ConnectionWriter, EndpointIdentity,
    RealtimeClientBuilder, RealtimeClientOptions,
};
use crate::infrastructure::HeartbeatManager;
use crate::messaging::{ConnectionHealth, ErrorPayload, EventDispatcher, Listener, SystemEvent};
use crate::outbound::{OutboundEnvelope, OutboundQueue, SendOptions};
use crate::types::{
    RealtimeError, RealtimeMessage, Result, WS_CLOSE_ABNORMAL, WS_CLOSE_NORMAL,
    constants::reserved_events,
};
use crate::websocket::{Transport, TransportConnection, TransportEvent};
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use url::Url;

pub(crate) struct ClientInner {
    identity: EndpointIdentity,
    options: RealtimeClientOptions,
    transport: Arc<dyn Transport>,
    dispatcher: EventDispatcher,

    // Consolidated mutable state; never held across an await or while listeners run
    state: Mutex<ClientState>,

    // Serializes transport writes so a flush keeps its place ahead of later sends
    write_gate: tokio::sync::Mutex<()>,

    state_rx: watch::Receiver<ConnectionState>,
}

/// The main entry point: a resilient connection to a realtime server.
///
/// `RealtimeClient` opens and owns the transport, probes it with heartbeats,
/// reconnects with exponential backoff after abnormal closures, buffers sends
/// made while offline, and dispatches inbound events to registered listeners.
///
/// Cloning is cheap; all clones drive the same connection. Dropping the last
/// clone aborts every background task.
///
/// # Example
///
/// ```no_run
/// use resilient_realtime::{RealtimeClient, RealtimeClientOptions, SendOptions, listener};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(
///     "wss://chat.example.com/ws",
///     "session-token",
///     RealtimeClientOptions::default(),
/// )?;
///
/// client.on("chat.message", listener(|data| println!("message: {data}")));
/// client.connect().await?;
/// client
///     .send("chat.message", serde_json::json!({"text": "hi"}), SendOptions::retry())
///     .await?;
/// client.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

enum ConnectionLoss {
    Retrying { attempt: u32, delay: Duration },
    Exhausted { attempts: u32 },
}

impl RealtimeClient {
    /// Creates a new client over the default WebSocket transport.
    ///
    /// This does not open a connection; call [`connect()`](Self::connect).
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::UrlParse`] if `endpoint` is not a valid URL
    /// - [`RealtimeError::Auth`] if `token` is empty
    /// - [`RealtimeError::Config`] if `options` are inconsistent
    pub fn new(
        endpoint: impl AsRef<str>,
        token: impl Into<String>,
        options: RealtimeClientOptions,
    ) -> Result<Self> {
        RealtimeClientBuilder::new(endpoint, token)?
            .options(options)
            .build()
    }

    /// Starts a builder, for injecting a custom [`Transport`].
    pub fn builder(
        endpoint: impl AsRef<str>,
        token: impl Into<String>,
    ) -> Result<RealtimeClientBuilder> {
        RealtimeClientBuilder::new(endpoint, token)
    }

    pub(crate) fn from_parts(
        identity: EndpointIdentity,
        options: RealtimeClientOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let queue = OutboundQueue::new(options.message_queue_max_size);

        Self {
            inner: Arc::new(ClientInner {
                identity,
                options,
                transport,
                dispatcher: EventDispatcher::new(),
                state: Mutex::new(ClientState::new(queue, state_tx)),
                write_gate: tokio::sync::Mutex::new(()),
                state_rx,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<ClientInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<ClientInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Establishes the connection.
    ///
    /// Opens the transport with the auth token embedded in the URI, bounded by
    /// the connection timeout. Once open, the heartbeat starts, queued messages
    /// are flushed ahead of any new send, and then `connected` and
    /// `connection.health` are dispatched before this returns.
    ///
    /// Allowed from [`ConnectionState::Disconnected`] and from the terminal
    /// [`ConnectionState::Error`]; each call starts a new lifecycle and resets
    /// the metrics.
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::AlreadyConnected`] / [`RealtimeError::AlreadyConnecting`]
    ///   if a connection exists or is being established
    /// - [`RealtimeError::ConnectionTimeout`] if the transport does not open in time
    /// - the transport's own error if opening fails
    /// - [`RealtimeError::Connection`] if [`disconnect()`](Self::disconnect) ran
    ///   while the attempt was in flight
    ///
    /// A failed connect leaves the client in `Error` and is not retried.
    pub async fn connect(&self) -> Result<()> {
        let epoch = {
            let mut state = self.inner.state.lock();
            match state.status {
                ConnectionState::Disconnected | ConnectionState::Error => {}
                ConnectionState::Connected => return Err(RealtimeError::AlreadyConnected),
                ConnectionState::Connecting
                | ConnectionState::Reconnecting
                | ConnectionState::Disconnecting => {
                    return Err(RealtimeError::AlreadyConnecting);
                }
            }
            let epoch = state.cancel_tasks();
            state.reconnect_attempts = 0;
            state.metrics.reset();
            state.set_status(ConnectionState::Connecting);
            epoch
        };

        tracing::info!("Connecting to {}", self.inner.identity.base_address());

        match self.open_transport().await {
            Ok(connection) => self.on_open(epoch, connection).await,
            Err(e) if self.fail_connect(epoch, &e) => Err(e),
            Err(e) => {
                tracing::debug!("Connect was cancelled before failing: {}", e);
                Err(cancelled())
            }
        }
    }

    /// Tears the connection down immediately.
    ///
    /// Cancels every timer, closes the transport with a normal closure, discards
    /// queued messages, and dispatches `connection.health` with
    /// `connected: false`. Calling it while already disconnected does nothing.
    /// Safe to call from inside a listener.
    pub fn disconnect(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.status == ConnectionState::Disconnected {
                return;
            }

            tracing::info!("Disconnecting from {}", self.inner.identity.base_address());
            state.set_status(ConnectionState::Disconnecting);
            state.cancel_tasks();
            state.session += 1;
            state.release_transport(Some(WS_CLOSE_NORMAL));
            let dropped = state.queue.clear();
            if dropped > 0 {
                tracing::debug!("Discarded {} queued message(s)", dropped);
            }
            state.set_status(ConnectionState::Disconnected);
        }

        self.inner
            .dispatcher
            .dispatch_system(SystemEvent::ConnectionHealth, ConnectionHealth::down(None));
    }

    /// Sends `data` as event `event`.
    ///
    /// While connected the message is written right away. Otherwise, with
    /// [`SendOptions::retry`] set it is queued and `Ok` means "accepted for
    /// delivery"; queued messages are written in order on the next connection.
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::NotConnected`] if not connected and `retry` is off
    /// - [`RealtimeError::QueueFull`] if the message had to be queued and the
    ///   queue is at capacity
    /// - [`RealtimeError::SendFailed`] if the write failed and `retry` is off
    /// - [`RealtimeError::Serialization`] if `data` cannot be turned into JSON
    pub async fn send<T: Serialize>(
        &self,
        event: impl Into<String>,
        data: T,
        options: SendOptions,
    ) -> Result<()> {
        let envelope = OutboundEnvelope::new(event, serde_json::to_value(data)?, options);

        let _gate = self.inner.write_gate.lock().await;
        let (writer, session) = {
            let mut state = self.inner.state.lock();
            match (state.status, state.writer.clone()) {
                (ConnectionState::Connected, Some(writer)) => (writer, state.session),
                _ if options.retry => {
                    state.queue.push(envelope)?;
                    tracing::debug!("Queued message, {} pending", state.queue.len());
                    return Ok(());
                }
                _ => return Err(RealtimeError::NotConnected),
            }
        };

        let frame = envelope.to_frame()?;
        match writer.write(frame, options.timeout).await {
            Ok(()) => {
                self.inner.state.lock().metrics.record_sent();
                Ok(())
            }
            Err(e) if options.retry => {
                let mut state = self.inner.state.lock();
                if state.session != session {
                    // disconnect() discarded the queue this would have joined
                    return Err(RealtimeError::SendFailed(e.to_string()));
                }
                tracing::warn!("Send of '{}' failed, queued for retry: {}", envelope.event, e);
                state.queue.push(envelope)
            }
            Err(e) => Err(RealtimeError::SendFailed(e.to_string())),
        }
    }

    /// Registers `listener` for `event`; returns `false` if it was already registered.
    ///
    /// Besides application events, the client dispatches `connected`,
    /// `connection.health` and `error` itself.
    pub fn on(&self, event: impl Into<String>, listener: Listener) -> bool {
        self.inner.dispatcher.on(event, listener)
    }

    /// Deregisters `listener`; returns `false` if it was not registered.
    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        self.inner.dispatcher.off(event, listener)
    }

    /// Snapshot of the connection counters
    pub fn metrics(&self) -> ConnectionMetrics {
        let state = self.inner.state.lock();
        state
            .metrics
            .snapshot(state.reconnect_attempts, state.queue.len())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch channel that observes every state transition
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    pub fn endpoint(&self) -> &Url {
        self.inner.identity.base_address()
    }

    pub fn options(&self) -> &RealtimeClientOptions {
        &self.inner.options
    }

    /// Whether `epoch` is still live and the client is in `status`
    pub(crate) fn is_current(&self, epoch: u64, status: ConnectionState) -> bool {
        let state = self.inner.state.lock();
        state.is_current(epoch) && state.status == status
    }

    async fn open_transport(&self) -> Result<TransportConnection> {
        let url = self.inner.identity.connection_url();
        let limit = self.inner.options.connection_timeout();
        match time::timeout(limit, self.inner.transport.open(&url)).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::ConnectionTimeout(
                self.inner.options.connection_timeout_ms,
            )),
        }
    }

    async fn on_open(&self, epoch: u64, connection: TransportConnection) -> Result<()> {
        let TransportConnection { sink, events } = connection;
        let writer = ConnectionWriter::spawn(sink);

        // Held from before entering Connected until the backlog is written, so
        // no live send can overtake it
        let gate = self.inner.write_gate.lock().await;

        {
            let mut state = self.inner.state.lock();
            if !state.is_current(epoch)
                || !matches!(
                    state.status,
                    ConnectionState::Connecting | ConnectionState::Reconnecting
                )
            {
                writer.shutdown(Some(WS_CLOSE_NORMAL));
                return Err(cancelled());
            }

            state.writer = Some(writer);
            state.reconnect_attempts = 0;
            state.metrics.mark_connected(Instant::now());
            state.set_status(ConnectionState::Connected);

            let weak = self.downgrade();
            state
                .task_manager
                .spawn(read_loop(weak.clone(), epoch, events));
            let heartbeat = HeartbeatManager::new(weak, epoch)
                .with_interval(self.inner.options.heartbeat_interval());
            state.task_manager.spawn(heartbeat.run());
        }

        tracing::info!("Connected to {}", self.inner.identity.base_address());
        self.flush_queue(gate).await;
        if !self.is_current(epoch, ConnectionState::Connected) {
            return Err(cancelled());
        }

        self.inner
            .dispatcher
            .dispatch(reserved_events::CONNECTED, &serde_json::Value::Null);
        self.inner.dispatcher.dispatch_system(
            SystemEvent::ConnectionHealth,
            ConnectionHealth::up(Utc::now().timestamp_millis()),
        );
        Ok(())
    }

    /// Returns `false` if the attempt was already cancelled
    fn fail_connect(&self, epoch: u64, err: &RealtimeError) -> bool {
        {
            let mut state = self.inner.state.lock();
            if !state.is_current(epoch) || state.status != ConnectionState::Connecting {
                return false;
            }
            state.cancel_tasks();
            state.set_status(ConnectionState::Error);
        }

        tracing::error!("Connection failed: {}", err);
        self.inner
            .dispatcher
            .dispatch_system(SystemEvent::Error, ErrorPayload::from(err));
        true
    }

    /// Writes queued envelopes in FIFO order until the queue is empty or a write
    /// fails. A failed head stays at the front for the next flush. The caller
    /// hands over the write gate.
    async fn flush_queue(&self, _gate: tokio::sync::MutexGuard<'_, ()>) {
        let mut flushed = 0;

        loop {
            let (writer, seq, frame, timeout) = {
                let mut state = self.inner.state.lock();
                if state.status != ConnectionState::Connected {
                    break;
                }
                let Some(writer) = state.writer.clone() else {
                    break;
                };
                let Some(head) = state.queue.front() else {
                    break;
                };
                let (seq, timeout) = (head.seq, head.options.timeout);
                match head.to_frame() {
                    Ok(frame) => (writer, seq, frame, timeout),
                    Err(e) => {
                        // Retrying cannot make it serializable
                        let err = RealtimeError::Serialization(e);
                        state.queue.remove_front(seq);
                        drop(state);
                        tracing::error!("Dropping queued message: {}", err);
                        self.inner
                            .dispatcher
                            .dispatch_system(SystemEvent::Error, ErrorPayload::from(&err));
                        continue;
                    }
                }
            };

            match writer.write(frame, timeout).await {
                Ok(()) => {
                    let mut state = self.inner.state.lock();
                    state.queue.remove_front(seq);
                    state.metrics.record_sent();
                    flushed += 1;
                }
                Err(e) => {
                    let pending = self.inner.state.lock().queue.len();
                    tracing::warn!("Flush stopped with {} message(s) queued: {}", pending, e);
                    break;
                }
            }
        }

        if flushed > 0 {
            tracing::debug!("Flushed {} queued message(s)", flushed);
        }
    }

    fn handle_frame(&self, epoch: u64, text: &str) {
        let message = match serde_json::from_str::<RealtimeMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                if !self.inner.state.lock().is_current(epoch) {
                    return;
                }
                tracing::warn!("Failed to parse message: {} - Raw: {}", e, text);
                self.inner.dispatcher.dispatch_system(
                    SystemEvent::Error,
                    ErrorPayload::new(format!("Invalid frame: {}", e)),
                );
                return;
            }
        };

        {
            let mut state = self.inner.state.lock();
            if !state.is_current(epoch) {
                return;
            }
            state.metrics.record_received();
            if message.event == reserved_events::HEARTBEAT {
                state.metrics.record_heartbeat(Utc::now());
            }
        }

        tracing::debug!("Received event '{}'", message.event);
        self.inner.dispatcher.dispatch(&message.event, &message.data);
    }

    fn report_transport_error(&self, epoch: u64, message: String) {
        if !self.inner.state.lock().is_current(epoch) {
            return;
        }
        let err = RealtimeError::Transport(message);
        tracing::error!("WebSocket read error: {}", err);
        self.inner
            .dispatcher
            .dispatch_system(SystemEvent::Error, ErrorPayload::from(&err));
    }

    pub(crate) fn record_heartbeat(&self, epoch: u64, at: DateTime<Utc>) {
        {
            let mut state = self.inner.state.lock();
            if !state.is_current(epoch) {
                return;
            }
            state.metrics.record_heartbeat(at);
        }
        self.inner.dispatcher.dispatch_system(
            SystemEvent::ConnectionHealth,
            ConnectionHealth::up(at.timestamp_millis()),
        );
    }

    /// Server closed the connection normally: no reconnect.
    fn handle_remote_close(&self, epoch: u64) {
        {
            let mut state = self.inner.state.lock();
            if !state.is_current(epoch) || state.status != ConnectionState::Connected {
                return;
            }
            state.cancel_tasks();
            state.release_transport(None);
            state.set_status(ConnectionState::Disconnected);
        }

        tracing::info!("Server closed the connection");
        self.inner.dispatcher.dispatch_system(
            SystemEvent::ConnectionHealth,
            ConnectionHealth::down(Some(Utc::now().timestamp_millis())),
        );
    }

    /// Abnormal closure path, shared by the reader, the heartbeat, and failed
    /// reconnect attempts.
    pub(crate) fn handle_connection_lost(&self, epoch: u64, code: u16, reason: &str) {
        let max_attempts = self.inner.options.reconnect_max_attempts;

        let (was_connected, loss) = {
            let mut state = self.inner.state.lock();
            if !state.is_current(epoch)
                || !matches!(
                    state.status,
                    ConnectionState::Connected | ConnectionState::Reconnecting
                )
            {
                return;
            }
            let was_connected = state.status == ConnectionState::Connected;
            let epoch = state.cancel_tasks();
            state.release_transport(None);

            let loss = if state.reconnect_attempts >= max_attempts {
                state.set_status(ConnectionState::Error);
                ConnectionLoss::Exhausted {
                    attempts: state.reconnect_attempts,
                }
            } else {
                let attempt = state.reconnect_attempts;
                state.reconnect_attempts += 1;
                let delay = self.inner.options.reconnect_timer().delay_for_attempt(attempt);
                state.set_status(ConnectionState::Reconnecting);
                state
                    .task_manager
                    .spawn(reconnect_after(self.downgrade(), epoch, delay));
                ConnectionLoss::Retrying {
                    attempt: attempt + 1,
                    delay,
                }
            };
            (was_connected, loss)
        };

        if was_connected {
            self.inner.dispatcher.dispatch_system(
                SystemEvent::ConnectionHealth,
                ConnectionHealth::down(Some(Utc::now().timestamp_millis())),
            );
        }

        match loss {
            ConnectionLoss::Retrying { attempt, delay } => {
                tracing::warn!(
                    "Connection lost (code={}, reason='{}'), reconnect attempt {}/{} in {:?}",
                    code,
                    reason,
                    attempt,
                    max_attempts,
                    delay
                );
            }
            ConnectionLoss::Exhausted { attempts } => {
                let err = RealtimeError::MaxReconnectAttemptsExceeded(attempts);
                tracing::error!("Connection lost (code={}): {}", code, err);
                self.inner.dispatcher.dispatch_system(
                    SystemEvent::Error,
                    ErrorPayload::from(&err).with_code(code),
                );
            }
        }
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("identity", &self.inner.identity)
            .field("state", &self.state())
            .finish()
    }
}

fn cancelled() -> RealtimeError {
    RealtimeError::Connection("connection attempt was cancelled".to_string())
}

async fn read_loop(
    client: Weak<ClientInner>,
    epoch: u64,
    mut events: BoxStream<'static, TransportEvent>,
) {
    tracing::debug!("Starting read task");
    while let Some(event) = events.next().await {
        let Some(client) = RealtimeClient::upgrade(&client) else {
            // Client dropped, exit read task
            return;
        };

        match event {
            TransportEvent::Message(text) => client.handle_frame(epoch, &text),
            TransportEvent::Error(message) => client.report_transport_error(epoch, message),
            TransportEvent::Closed { code, reason } => {
                if code == WS_CLOSE_NORMAL {
                    client.handle_remote_close(epoch);
                } else {
                    client.handle_connection_lost(epoch, code, &reason);
                }
                return;
            }
        }
    }

    // Stream ended without a close frame
    if let Some(client) = RealtimeClient::upgrade(&client) {
        client.handle_connection_lost(epoch, WS_CLOSE_ABNORMAL, "connection dropped");
    }
}

async fn reconnect_after(client: Weak<ClientInner>, epoch: u64, delay: Duration) {
    time::sleep(delay).await;

    let Some(client) = RealtimeClient::upgrade(&client) else {
        return;
    };
    if !client.is_current(epoch, ConnectionState::Reconnecting) {
        return;
    }

    tracing::info!("Attempting to reconnect...");
    match client.open_transport().await {
        Ok(connection) => match client.on_open(epoch, connection).await {
            Ok(()) => tracing::info!("Reconnected successfully"),
            Err(e) => tracing::debug!("Reconnect discarded: {}", e),
        },
        Err(e) => {
            tracing::error!("Reconnection attempt failed: {}", e);
            client.handle_connection_lost(epoch, WS_CLOSE_ABNORMAL, &e.to_string());
        }
    }
}
