//! In-memory transport for exercising the client without a network.

use super::{Connector, FrameSink, FrameStream};
use crate::types::{RealtimeError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Outcome of one scripted dial
#[derive(Debug, Clone)]
pub(crate) enum Dial {
    Accept,
    Refuse(&'static str),
    /// Opens, but every write fails
    Broken,
}

/// Server side of one accepted mock transport
pub(crate) struct MockServer {
    to_client: UnboundedSender<std::result::Result<Message, WsError>>,
    from_client: UnboundedReceiver<Message>,
}

impl MockServer {
    pub(crate) fn send_text(&self, text: &str) {
        let _ = self
            .to_client
            .unbounded_send(Ok(Message::Text(text.to_string().into())));
    }

    pub(crate) fn close(&self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let _ = self.to_client.unbounded_send(Ok(Message::Close(Some(frame))));
    }

    /// Simulates the network dropping: read error without a close frame
    pub(crate) fn fail(&self) {
        let error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let _ = self.to_client.unbounded_send(Err(WsError::Io(error)));
    }

    /// Every frame the client has written so far
    pub(crate) fn received(&mut self) -> Vec<Message> {
        let mut frames = Vec::new();
        while let Some(Some(frame)) = self.from_client.next().now_or_never() {
            frames.push(frame);
        }
        frames
    }

    pub(crate) fn received_text(&mut self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|frame| match frame {
                Message::Text(text) => Some(text.as_str().to_string()),
                _ => None,
            })
            .collect()
    }
}

/// Connector that follows a script of accepted/refused dials
pub(crate) struct MockConnector {
    script: Mutex<VecDeque<Dial>>,
    dial_delay: Duration,
    dials: AtomicUsize,
    servers: Mutex<VecDeque<MockServer>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            dial_delay: Duration::ZERO,
            dials: AtomicUsize::new(0),
            servers: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue dial outcomes; once the script runs out every dial is accepted
    pub(crate) fn with_script(self, dials: impl IntoIterator<Item = Dial>) -> Self {
        self.script.lock().extend(dials);
        self
    }

    pub(crate) fn with_dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = delay;
        self
    }

    pub(crate) fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Oldest accepted transport not yet taken by the test
    pub(crate) fn take_server(&self) -> Option<MockServer> {
        self.servers.lock().pop_front()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<(FrameSink, FrameStream)> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if !self.dial_delay.is_zero() {
            tokio::time::sleep(self.dial_delay).await;
        }

        let dial = self.script.lock().pop_front().unwrap_or(Dial::Accept);
        match dial {
            Dial::Refuse(reason) => Err(RealtimeError::Connection(reason.to_string())),
            Dial::Accept => {
                let (client_tx, from_client) = unbounded::<Message>();
                let (to_client, client_rx) = unbounded();
                self.servers.lock().push_back(MockServer {
                    to_client,
                    from_client,
                });

                let sink: FrameSink =
                    Box::pin(client_tx.sink_map_err(|_| WsError::ConnectionClosed));
                let stream: FrameStream = Box::pin(client_rx);
                Ok((sink, stream))
            }
            Dial::Broken => {
                let (_, from_client) = unbounded::<Message>();
                let (to_client, client_rx) = unbounded();
                self.servers.lock().push_back(MockServer {
                    to_client,
                    from_client,
                });

                let sink: FrameSink = Box::pin(futures::sink::unfold((), |(), _frame: Message| {
                    async { Err::<(), WsError>(WsError::ConnectionClosed) }
                }));
                let stream: FrameStream = Box::pin(client_rx);
                Ok((sink, stream))
            }
        }
    }
}
