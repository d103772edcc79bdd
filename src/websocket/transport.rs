use crate::types::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Something the transport reported on the read side of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame
    Message(String),
    /// The peer closed the connection
    Closed { code: u16, reason: String },
    /// A read error; the stream is expected to end shortly after
    Error(String),
}

/// Write half of an open connection.
#[async_trait]
pub trait TransportSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the connection with the given close code
    async fn close(&mut self, code: u16) -> Result<()>;
}

/// An open connection: a sink for writes and a stream of read-side events.
pub struct TransportConnection {
    pub sink: Box<dyn TransportSink>,
    pub events: BoxStream<'static, TransportEvent>,
}

/// Opens connections to a URI. The client owns whatever this returns.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<TransportConnection>;
}
