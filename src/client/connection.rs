use crate::types::{RealtimeError, Result};
use crate::websocket::TransportSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;

/// Lifecycle state of a [`RealtimeClient`](super::RealtimeClient)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Reconnecting,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct WriteCommand {
    frame: String,
    timeout: Option<Duration>,
    ack: oneshot::Sender<Result<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Closing(u16),
    Abandoned,
}

// Upper bound on sending the close frame during shutdown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle to the writer task, the sole owner of the transport sink.
///
/// Writes are applied in the order they are submitted. Shutting the writer
/// down cancels the write in progress and fails every write still waiting,
/// so no caller outlives the connection it wrote to. Dropping every handle
/// also ends the task.
#[derive(Clone)]
pub(crate) struct ConnectionWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
    state: Arc<watch::Sender<WriterState>>,
}

impl ConnectionWriter {
    pub fn spawn(sink: Box<dyn TransportSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, stop) = watch::channel(WriterState::Open);

        tokio::spawn(run_writer(sink, rx, stop));

        Self {
            tx,
            state: Arc::new(state),
        }
    }

    /// Write one text frame and wait for the transport to accept it
    pub async fn write(&self, frame: String, timeout: Option<Duration>) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriteCommand {
                frame,
                timeout,
                ack,
            })
            .map_err(|_| writer_closed())?;
        done.await.map_err(|_| writer_closed())?
    }

    /// Stop the writer, sending a close frame with `code` on the way out if given.
    /// Only the first call has an effect.
    pub fn shutdown(&self, close_code: Option<u16>) {
        let next = match close_code {
            Some(code) => WriterState::Closing(code),
            None => WriterState::Abandoned,
        };
        self.state.send_if_modified(|state| {
            if *state != WriterState::Open {
                return false;
            }
            *state = next;
            true
        });
    }
}

async fn run_writer(
    mut sink: Box<dyn TransportSink>,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
    mut stop: watch::Receiver<WriterState>,
) {
    loop {
        // A closed state channel means every handle is gone
        let command = tokio::select! {
            biased;
            _ = stop.wait_for(|state| *state != WriterState::Open) => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        let WriteCommand {
            frame,
            timeout,
            ack,
        } = command;
        let write = async {
            match timeout {
                Some(limit) => time::timeout(limit, sink.send_text(frame))
                    .await
                    .unwrap_or_else(|_| {
                        Err(RealtimeError::Transport(format!(
                            "write timed out after {} ms",
                            limit.as_millis()
                        )))
                    }),
                None => sink.send_text(frame).await,
            }
        };

        tokio::select! {
            biased;
            // Dropping `ack` fails the waiting write
            _ = stop.wait_for(|state| *state != WriterState::Open) => break,
            result = write => {
                // The sender may have given up waiting
                let _ = ack.send(result);
            }
        }
    }

    // Fail writes that never reached the sink
    drop(rx);

    let final_state = *stop.borrow();
    if let WriterState::Closing(code) = final_state {
        match time::timeout(CLOSE_TIMEOUT, sink.close(code)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Error while closing transport: {}", e),
            Err(_) => tracing::debug!("Timed out sending close frame"),
        }
    }
    tracing::debug!("Writer task finished");
}

fn writer_closed() -> RealtimeError {
    RealtimeError::Transport("connection writer closed".to_string())
}
