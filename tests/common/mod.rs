#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use resilient_realtime::{
    RealtimeClient, RealtimeClientOptions, RealtimeError, Result, Transport, TransportConnection,
    TransportEvent, TransportSink, listener,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const ENDPOINT: &str = "wss://chat.example.com/ws";
pub const TOKEN: &str = "test-token";

/// How the next `open()` call behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenBehavior {
    Accept,
    Refuse,
    Hang,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<OpenBehavior>,
    opened_urls: Vec<String>,
    sent: Vec<String>,
    closed_with: Vec<u16>,
    fail_sends: bool,
    stall_sends: bool,
    server: Option<mpsc::UnboundedSender<TransportEvent>>,
}

/// In-memory transport; every clone observes the same recorded traffic
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue behaviours for the next `open()` calls; unscripted opens accept
    pub fn script(&self, behaviors: &[OpenBehavior]) {
        self.state.lock().script.extend(behaviors.iter().copied());
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Writes hang forever while set, like a peer that stopped reading
    pub fn set_stall_sends(&self, stall: bool) {
        self.state.lock().stall_sends = stall;
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opened_urls.len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.state.lock().opened_urls.clone()
    }

    pub fn sent_frames(&self) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|frame| serde_json::from_str(frame).expect("client sent invalid JSON"))
            .collect()
    }

    /// Event names of every frame written, in order
    pub fn sent_events(&self) -> Vec<String> {
        self.sent_frames()
            .iter()
            .map(|frame| frame["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn closed_with(&self) -> Vec<u16> {
        self.state.lock().closed_with.clone()
    }

    /// Deliver a raw frame from the "server"
    pub fn push_frame(&self, frame: &str) {
        self.push_event(TransportEvent::Message(frame.to_string()));
    }

    pub fn server_event(&self, event: &str, data: serde_json::Value) {
        let frame = serde_json::json!({
            "event": event,
            "data": data,
            "timestamp": "2024-05-01T12:30:00Z",
        });
        self.push_frame(&frame.to_string());
    }

    /// Close the current connection from the server side
    pub fn server_close(&self, code: u16) {
        self.push_event(TransportEvent::Closed {
            code,
            reason: "test".to_string(),
        });
        self.state.lock().server = None;
    }

    /// End the event stream without a close frame
    pub fn drop_connection(&self) {
        self.state.lock().server = None;
    }

    fn push_event(&self, event: TransportEvent) {
        if let Some(server) = self.state.lock().server.as_ref() {
            let _ = server.send(event);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, url: &str) -> Result<TransportConnection> {
        let behavior = {
            let mut state = self.state.lock();
            state.opened_urls.push(url.to_string());
            state.script.pop_front().unwrap_or(OpenBehavior::Accept)
        };

        match behavior {
            OpenBehavior::Refuse => Err(RealtimeError::Transport("connection refused".to_string())),
            OpenBehavior::Hang => futures::future::pending().await,
            OpenBehavior::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.state.lock().server = Some(tx);
                let events = futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|event| (event, rx))
                })
                .boxed();
                Ok(TransportConnection {
                    sink: Box::new(MockSink {
                        state: Arc::clone(&self.state),
                    }),
                    events,
                })
            }
        }
    }
}

struct MockSink {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        let stalled = self.state.lock().stall_sends;
        if stalled {
            futures::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if state.fail_sends {
            return Err(RealtimeError::Transport("broken pipe".to_string()));
        }
        state.sent.push(text);
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        self.state.lock().closed_with.push(code);
        Ok(())
    }
}

pub fn client_with(transport: &MockTransport, options: RealtimeClientOptions) -> RealtimeClient {
    RealtimeClient::builder(ENDPOINT, TOKEN)
        .expect("valid endpoint")
        .options(options)
        .transport(transport.clone())
        .build()
        .expect("valid options")
}

pub fn client(transport: &MockTransport) -> RealtimeClient {
    client_with(transport, RealtimeClientOptions::default())
}

/// Records the payload of every dispatch of `event`
pub fn record(client: &RealtimeClient, event: &str) -> Arc<Mutex<Vec<serde_json::Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client.on(event, listener(move |payload| sink.lock().push(payload.clone())));
    seen
}

/// Let spawned tasks run; with paused time this also advances the clock slightly
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
