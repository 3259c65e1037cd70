use super::core::ClientShared;
use crate::messaging::ControlFrame;
use crate::types::{
    MANUAL_DISCONNECT_REASON, RealtimeError, WS_CLOSE_ABNORMAL, WS_CLOSE_NO_STATUS,
};
use crate::websocket::{FrameSink, FrameStream};
use futures::{SinkExt, StreamExt};
use std::sync::Weak;
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// How the read/write pump ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Termination {
    /// Closed from this side, or the client went away
    Local,
    /// Peer closed, a read or write failed, or the stream ended.
    /// `unsent` holds the frame whose write failed, if any.
    Closed {
        code: u16,
        reason: String,
        unsent: Option<String>,
    },
}

/// Text of an outbound frame worth carrying over to the next connection.
/// Keep-alive pings and close frames belong to the dead transport.
pub(super) fn requeueable(frame: Message) -> Option<String> {
    match frame {
        Message::Text(text) if text.as_str() != ControlFrame::Ping.to_json() => {
            Some(text.as_str().to_string())
        }
        _ => None,
    }
}

/// Close frame sent on a manual disconnect
pub(super) fn manual_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: MANUAL_DISCONNECT_REASON.to_string().into(),
    }))
}

/// Dials the endpoint and runs the pump until the transport closes.
///
/// The task owns both transport halves. Everything else reaches the socket
/// through the unbounded writer handed to [`ClientShared::on_open`].
pub(super) async fn run(shared: Weak<ClientShared>, epoch: u64) {
    let Some((connector, url, timeout)) = shared.upgrade().map(|s| {
        (
            s.connector.clone(),
            s.config.url.clone(),
            s.config.connect_timeout(),
        )
    }) else {
        return;
    };

    tracing::info!("Connecting to {}", url);
    let dialed = match time::timeout(timeout, connector.connect(&url)).await {
        Ok(result) => result,
        Err(_) => Err(RealtimeError::Timeout),
    };
    drop(connector);

    let (mut sink, mut stream) = match dialed {
        Ok(halves) => halves,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", url, e);
            if let Some(shared) = shared.upgrade() {
                shared.on_dial_failed(epoch, &e);
            }
            return;
        }
    };

    let (writer, mut outbound) = mpsc::unbounded_channel();
    let opened = shared
        .upgrade()
        .is_some_and(|shared| shared.on_open(epoch, writer));
    if !opened {
        tracing::debug!("Discarding transport opened for a superseded connect");
        let _ = sink.send(manual_close()).await;
        let _ = sink.close().await;
        return;
    }
    tracing::info!("Connected to {}", url);

    let termination = pump(&shared, epoch, &mut sink, &mut stream, &mut outbound).await;
    tracing::debug!("Connection task finished: {:?}", termination);

    if let Some(shared) = shared.upgrade() {
        shared.on_closed(epoch, termination, &mut outbound);
    }
}

async fn pump(
    shared: &Weak<ClientShared>,
    epoch: u64,
    sink: &mut FrameSink,
    stream: &mut FrameStream,
    outbound: &mut mpsc::UnboundedReceiver<Message>,
) -> Termination {
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(close @ Message::Close(_)) => {
                    if let Err(e) = sink.send(close).await {
                        tracing::debug!("Failed to send close frame: {}", e);
                    }
                    let _ = sink.close().await;
                    return Termination::Local;
                }
                Some(frame) => {
                    if let Err(e) = sink.send(frame.clone()).await {
                        tracing::error!("WebSocket write error: {}", e);
                        return Termination::Closed {
                            code: WS_CLOSE_ABNORMAL,
                            reason: e.to_string(),
                            unsent: requeueable(frame),
                        };
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return Termination::Local;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Some(client) = shared.upgrade() else {
                        return Termination::Local;
                    };
                    let reply = client.handle_text(epoch, text.as_str());
                    drop(client);

                    if let Some(reply) = reply {
                        tracing::debug!("Replying to ping");
                        if let Err(e) = sink.send(Message::Text(reply.into())).await {
                            tracing::error!("WebSocket write error: {}", e);
                            return Termination::Closed {
                                code: WS_CLOSE_ABNORMAL,
                                reason: e.to_string(),
                                unsent: None,
                            };
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_string()),
                        None => (WS_CLOSE_NO_STATUS, String::new()),
                    };
                    tracing::info!("Server closed connection: code={}, reason='{}'", code, reason);
                    return Termination::Closed { code, reason, unsent: None };
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::warn!("Ignoring unexpected binary message ({} bytes)", data.len());
                }
                Some(Ok(Message::Ping(data))) => {
                    tracing::debug!("Received ping ({} bytes)", data.len());
                }
                Some(Ok(Message::Pong(data))) => {
                    tracing::debug!("Received pong ({} bytes)", data.len());
                }
                Some(Ok(Message::Frame(_))) => {
                    tracing::debug!("Received raw frame (internal)");
                }
                Some(Err(e)) => {
                    tracing::error!("WebSocket read error: {}", e);
                    return Termination::Closed {
                        code: WS_CLOSE_ABNORMAL,
                        reason: e.to_string(),
                        unsent: None,
                    };
                }
                None => {
                    tracing::warn!("Connection dropped without a close frame");
                    return Termination::Closed {
                        code: WS_CLOSE_ABNORMAL,
                        reason: String::new(),
                        unsent: None,
                    };
                }
            },
        }
    }
}
