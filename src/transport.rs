//! The duplex frame channel a connection drives.
//!
//! Everything above this module speaks UTF-8 JSON text frames; everything about
//! sockets, TLS and WebSocket framing stays below it. The connection takes any
//! pair of halves, so tests swap the WebSocket for an in-memory channel pair.

use std::pin::Pin;
#[cfg(test)]
use std::task::{Context, Poll};

use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Transport channel closed")]
    ChannelClosed,
}

/// A connected duplex channel carrying one JSON value per frame.
pub struct Transport {
    pub(crate) outgoing: Pin<Box<dyn Sink<String, Error = TransportError> + Send>>,
    pub(crate) incoming: Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>,
}

impl Transport {
    /// Wraps caller-supplied halves.
    pub fn from_parts<Si, St>(outgoing: Si, incoming: St) -> Self
    where
        Si: Sink<String, Error = TransportError> + Send + 'static,
        St: Stream<Item = Result<String, TransportError>> + Send + 'static,
    {
        Self {
            outgoing: Box::pin(outgoing),
            incoming: Box::pin(incoming),
        }
    }

    /// Opens a WebSocket to `url` (a `ws://host/devtools/page/<id>` endpoint as
    /// reported by discovery).
    pub async fn websocket(url: &str) -> Result<Self, TransportError> {
        let (ws_stream, _) = connect_async(url).await?;
        debug!("WebSocket transport established to {}", url);
        let (ws_sink, ws_stream) = ws_stream.split();

        let outgoing = ws_sink
            .with(|text: String| {
                future::ready(Ok::<_, tokio_tungstenite::tungstenite::Error>(
                    Message::Text(text.into()),
                ))
            })
            .sink_map_err(TransportError::WebSocket);

        let incoming = ws_stream.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                // Ping/pong is answered by the library; close and binary
                // frames carry no protocol payload.
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::WebSocket(e))),
            })
        });

        Ok(Self::from_parts(outgoing, incoming))
    }

    /// In-memory transport plus the peer-side handle driving it.
    #[cfg(test)]
    pub(crate) fn pair() -> (Self, FakePeer) {
        let (outgoing_tx, outgoing_rx) = tokio::sync::mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = tokio::sync::mpsc::unbounded_channel();
        let transport = Self::from_parts(
            ChannelSink(outgoing_tx),
            tokio_stream::wrappers::UnboundedReceiverStream::new(incoming_rx),
        );
        let peer = FakePeer {
            sent: outgoing_rx,
            push: incoming_tx,
        };
        (transport, peer)
    }
}

#[cfg(test)]
pub(crate) struct ChannelSink(tokio::sync::mpsc::UnboundedSender<String>);

#[cfg(test)]
impl Sink<String> for ChannelSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.0.send(item).map_err(|_| TransportError::ChannelClosed)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// The far side of [`Transport::pair`]: observes what the connection wrote and
/// injects inbound frames. Dropping `push` reads as a remote close.
#[cfg(test)]
pub(crate) struct FakePeer {
    pub(crate) sent: tokio::sync::mpsc::UnboundedReceiver<String>,
    pub(crate) push: tokio::sync::mpsc::UnboundedSender<Result<String, TransportError>>,
}

#[cfg(test)]
impl FakePeer {
    /// Next frame the connection wrote, decoded as JSON.
    pub(crate) async fn recv_json(&mut self) -> serde_json::Value {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), self.sent.recv())
            .await
            .expect("timed out waiting for an outgoing frame")
            .expect("connection writer is gone");
        serde_json::from_str(&frame).expect("outgoing frame is not valid JSON")
    }

    pub(crate) fn push_text(&self, frame: impl Into<String>) {
        let _ = self.push.send(Ok(frame.into()));
    }

    pub(crate) fn push_json(&self, frame: serde_json::Value) {
        self.push_text(frame.to_string());
    }

    /// Answers the command `id` with a success response.
    pub(crate) fn respond(&self, id: u64, result: serde_json::Value) {
        self.push_json(serde_json::json!({"id": id, "result": result}));
    }
}
