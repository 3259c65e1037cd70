use crate::types::Result;
use async_trait::async_trait;
use futures::stream::StreamExt;
use futures::{Sink, Stream};
use std::pin::Pin;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Write half of an open transport
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Read half of an open transport
pub type FrameStream = Pin<Box<dyn Stream<Item = std::result::Result<Message, WsError>> + Send>>;

/// Opens transports to the event endpoint.
///
/// The connection manager only ever talks to the network through this seam,
/// which lets tests substitute an in-memory server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Dial `url` and return the split transport
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream)>;
}

/// WebSocket factory for creating WebSocket connections
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

#[async_trait]
impl Connector for WebSocketFactory {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream)> {
        tracing::debug!("Creating WebSocket connection to: {}", url);
        let (ws_stream, response) = connect_async(url).await?;
        tracing::debug!("WebSocket handshake completed: {}", response.status());

        let (write_half, read_half) = ws_stream.split();
        Ok((Box::pin(write_half), Box::pin(read_half)))
    }
}
