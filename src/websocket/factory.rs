use super::transport::{Transport, TransportConnection, TransportEvent, TransportSink};
use crate::types::{Result, WS_CLOSE_NO_STATUS};
use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Default transport backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

#[async_trait]
impl Transport for WebSocketFactory {
    async fn open(&self, url: &str) -> Result<TransportConnection> {
        tracing::debug!("Creating WebSocket connection");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write_half, read_half) = ws_stream.split();

        let events = read_half
            .filter_map(|msg_result| async move {
                match msg_result {
                    Ok(Message::Text(text)) => Some(TransportEvent::Message(text.as_str().to_owned())),
                    Ok(Message::Close(frame)) => Some(match frame {
                        Some(close_frame) => TransportEvent::Closed {
                            code: u16::from(close_frame.code),
                            reason: close_frame.reason.as_str().to_owned(),
                        },
                        None => TransportEvent::Closed {
                            code: WS_CLOSE_NO_STATUS,
                            reason: String::new(),
                        },
                    }),
                    Ok(Message::Binary(data)) => {
                        tracing::warn!(
                            "Received unexpected binary message ({} bytes)",
                            data.len()
                        );
                        None
                    }
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
                    Err(e) => Some(TransportEvent::Error(e.to_string())),
                }
            })
            .boxed();

        Ok(TransportConnection {
            sink: Box::new(WebSocketSink { write: write_half }),
            events,
        })
    }
}

struct WebSocketSink {
    write: WsWriter,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.write.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.write.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}
