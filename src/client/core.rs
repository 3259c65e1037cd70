use super::connection::{self, Termination};
use super::state::{ClientState, ConnectionStats};
use super::RealtimeClientBuilder;
use crate::config::RealtimeConfig;
use crate::infrastructure::{Backoff, KeepAlive};
use crate::messaging::{ControlFrame, EventCallback, EventDispatcher, EventKind, Routed};
use crate::status::{Connection, ConnectionStatus, StatusBroadcaster, StatusCallback};
use crate::types::{RealtimeEvent, Result, WS_CLOSE_NORMAL};
use crate::websocket::Connector;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

/// Kind name callers sometimes reach for when they want status changes
const STATUS_PSEUDO_KIND: &str = "status";

/// State shared between the client handles and the background tasks.
///
/// Lock order is `state` then the broadcaster. Status notifications are
/// recorded under the lock and delivered with `status.flush()` after it is
/// released, so user callbacks never run with `state` held.
pub(crate) struct ClientShared {
    pub(crate) config: RealtimeConfig,
    pub(crate) connector: Arc<dyn Connector>,
    backoff: Backoff,
    state: Mutex<ClientState>,
    dispatcher: EventDispatcher,
    status: StatusBroadcaster,
}

impl ClientShared {
    pub(crate) fn new(config: RealtimeConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            backoff: config.backoff(),
            state: Mutex::new(ClientState::new(config.max_queue_size)),
            config,
            connector,
            dispatcher: EventDispatcher::new(),
            status: StatusBroadcaster::new(),
        }
    }

    fn connect_locked(self: &Arc<Self>, state: &mut ClientState) {
        if state.destroyed {
            tracing::warn!("connect() called on a destroyed client, ignoring");
            return;
        }
        let current = self.status.status();
        if matches!(
            current,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            tracing::debug!("Already {}, ignoring connect()", current);
            return;
        }

        state.reconnect_timer.cancel();
        state.keepalive.cancel();
        state.epoch += 1;
        let epoch = state.epoch;

        self.status.record(ConnectionStatus::Connecting, None);
        state
            .connection
            .spawn(connection::run(Arc::downgrade(self), epoch));
    }

    fn disconnect_locked(&self, state: &mut ClientState) {
        state.reconnect_timer.cancel();
        state.keepalive.cancel();
        state.epoch += 1;

        match state.writer.take() {
            Some(writer) => {
                // The task sends the close frame and exits on its own
                if writer.send(connection::manual_close()).is_err() {
                    tracing::debug!("Connection task already gone");
                }
                state.connection.release();
            }
            None => state.connection.cancel(),
        }

        if !state.queue.is_empty() {
            tracing::debug!("Discarding {} queued frame(s)", state.queue.len());
            state.queue.clear();
        }
        state.reconnect_attempt = 0;
        self.status.set_reconnect_attempt(0);

        if self.status.status() != ConnectionStatus::Disconnected {
            self.status.record(ConnectionStatus::Disconnected, None);
        }
    }

    fn schedule_reconnect_locked(self: &Arc<Self>, state: &mut ClientState) {
        state.reconnect_timer.cancel();

        let max = self.config.max_reconnect_attempts;
        if state.reconnect_attempt >= max {
            tracing::error!("Max reconnection attempts ({}) reached", max);
            self.status.record(
                ConnectionStatus::Error,
                Some("Max reconnection attempts reached".to_string()),
            );
            return;
        }

        let delay = self.backoff.next_delay(state.reconnect_attempt);
        tracing::info!(
            "Reconnecting in {:?} (attempt {}/{})",
            delay,
            state.reconnect_attempt + 1,
            max
        );
        self.status.record(ConnectionStatus::Reconnecting, None);

        let epoch = state.epoch;
        let weak = Arc::downgrade(self);
        state.reconnect_timer.spawn(async move {
            time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_reconnect(epoch);
            }
        });
    }

    fn fire_reconnect(self: &Arc<Self>, epoch: u64) {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch) || self.status.status() != ConnectionStatus::Reconnecting {
                tracing::debug!("Stale reconnect timer fired, ignoring");
                return;
            }
            state.reconnect_timer.release();
            state.reconnect_attempt += 1;
            self.status.set_reconnect_attempt(state.reconnect_attempt);
            tracing::info!("Reconnect attempt {}", state.reconnect_attempt);
            self.connect_locked(&mut state);
        }
        self.status.flush();
    }

    fn start_keepalive_locked(self: &Arc<Self>, state: &mut ClientState, epoch: u64) {
        let interval = self.config.keepalive_interval();
        if interval.is_zero() {
            state.keepalive.cancel();
            return;
        }
        let weak = Arc::downgrade(self);
        state.keepalive.spawn(KeepAlive::new(interval).run(move || {
            weak.upgrade()
                .is_some_and(|shared| shared.send_ping(epoch))
        }));
    }

    fn send_ping(&self, epoch: u64) -> bool {
        let state = self.state.lock();
        if !state.is_current(epoch) {
            return false;
        }
        match &state.writer {
            Some(writer) => {
                tracing::debug!("Sending keep-alive ping");
                writer
                    .send(Message::Text(ControlFrame::Ping.to_json().into()))
                    .is_ok()
            }
            None => false,
        }
    }

    pub(super) fn on_dial_failed(self: &Arc<Self>, epoch: u64, error: &crate::types::RealtimeError) {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                return;
            }
            state.connection.release();
            self.status.record(
                ConnectionStatus::Error,
                Some(format!("Connection failed: {}", error)),
            );
            self.schedule_reconnect_locked(&mut state);
        }
        self.status.flush();
    }

    /// Promotes a freshly dialed transport to the live connection.
    /// Returns false when the connect it was dialed for has been superseded.
    pub(super) fn on_open(
        self: &Arc<Self>,
        epoch: u64,
        writer: mpsc::UnboundedSender<Message>,
    ) -> bool {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                return false;
            }

            state.reconnect_attempt = 0;
            self.status.set_reconnect_attempt(0);
            self.status.record(ConnectionStatus::Connected, None);

            let flushed = state
                .queue
                .drain_with(|frame| writer.send(Message::Text(frame.to_string().into())).is_ok());
            if flushed > 0 {
                tracing::info!("Flushed {} queued frame(s)", flushed);
            }

            state.writer = Some(writer);
            self.start_keepalive_locked(&mut state, epoch);
        }
        self.status.flush();
        true
    }

    /// Tears down the live connection. Frames that never reached the socket
    /// go back to the head of the queue in their original order.
    pub(super) fn on_closed(
        self: &Arc<Self>,
        epoch: u64,
        termination: Termination,
        outbound: &mut mpsc::UnboundedReceiver<Message>,
    ) {
        {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                return;
            }
            // No send() reaches the channel once the writer is gone
            state.writer = None;
            state.keepalive.cancel();
            state.connection.release();

            let (code, reason, failed) = match termination {
                Termination::Local => (None, String::new(), None),
                Termination::Closed {
                    code,
                    reason,
                    unsent,
                } => (Some(code), reason, unsent),
            };

            outbound.close();
            let mut unsent: Vec<String> = failed.into_iter().collect();
            while let Ok(frame) = outbound.try_recv() {
                unsent.extend(connection::requeueable(frame));
            }
            if !unsent.is_empty() {
                tracing::warn!("Re-queueing {} unsent frame(s)", unsent.len());
                state.queue.requeue_front(unsent);
            }

            match code {
                None => {
                    self.status.record(ConnectionStatus::Disconnected, None);
                }
                Some(WS_CLOSE_NORMAL) => {
                    tracing::info!("Connection closed normally, not reconnecting");
                    self.status.record(ConnectionStatus::Disconnected, None);
                }
                Some(code) => {
                    let detail = if reason.is_empty() {
                        format!("Connection closed: code {}", code)
                    } else {
                        format!("Connection closed: {} (code {})", reason, code)
                    };
                    tracing::warn!("{}", detail);
                    self.status
                        .record(ConnectionStatus::Disconnected, Some(detail));
                    self.schedule_reconnect_locked(&mut state);
                }
            }
        }
        self.status.flush();
    }

    /// Routes one inbound text frame; returns the pong to send, if any
    pub(super) fn handle_text(&self, epoch: u64, text: &str) -> Option<String> {
        if !self.is_live(epoch) {
            tracing::debug!("Dropping frame received on a superseded connection");
            return None;
        }
        tracing::debug!("Received text message: {}", text);

        match self.dispatcher.route(text) {
            Routed::Control(ControlFrame::Ping) => {
                self.is_live(epoch).then(|| ControlFrame::Pong.to_json())
            }
            Routed::Control(ControlFrame::Pong) => {
                self.state.lock().last_pong = Some(Utc::now());
                None
            }
            Routed::Event(kind) => {
                self.state.lock().last_event = Some((kind, Utc::now()));
                None
            }
            Routed::Dropped => None,
        }
    }

    fn is_live(&self, epoch: u64) -> bool {
        let state = self.state.lock();
        state.is_current(epoch) && self.status.status().is_connected()
    }
}

/// Realtime event client.
///
/// Maintains one WebSocket connection to the event endpoint, reconnects with
/// exponential backoff after unexpected closes, answers keep-alive pings and
/// fans application events out to subscribers. All operations return
/// immediately; connectivity is observed through [`on_status`](Self::on_status)
/// or [`watch_status`](Self::watch_status).
///
/// Cloning is cheap and every clone drives the same connection. The
/// lifecycle methods spawn tasks and must be called from within a tokio
/// runtime.
///
/// # Example
///
/// ```no_run
/// use agenthub_realtime::{EventKind, RealtimeClient, RealtimeConfig, RealtimeEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(RealtimeConfig::new("wss://api.agenthub.com/ws"))?;
///
/// client.on(EventKind::NewMessage, |event: &RealtimeEvent| {
///     println!("new message in {:?}", event.chat_id());
/// });
/// client.on_status(|status, error| println!("{} {:?}", status.label(), error));
///
/// client.connect();
/// // ...
/// client.disconnect();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) shared: Arc<ClientShared>,
}

impl RealtimeClient {
    /// Creates a client using the default WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::UrlParse`](crate::RealtimeError::UrlParse) or
    /// [`RealtimeError::Config`](crate::RealtimeError::Config) if the config
    /// does not validate.
    pub fn new(config: RealtimeConfig) -> Result<Self> {
        RealtimeClientBuilder::new(config).build()
    }

    pub fn builder(config: RealtimeConfig) -> RealtimeClientBuilder {
        RealtimeClientBuilder::new(config)
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// Starts connecting in the background.
    ///
    /// No-op while connecting or connected, and on a destroyed client.
    /// Otherwise cancels any pending reconnect timer and dials.
    pub fn connect(&self) {
        {
            let mut state = self.shared.state.lock();
            self.shared.connect_locked(&mut state);
        }
        self.shared.status.flush();
    }

    /// Closes the connection with code 1000 and stops all reconnection.
    ///
    /// Also resets the attempt counter and discards queued frames.
    pub fn disconnect(&self) {
        tracing::info!("Disconnecting from WebSocket server");
        {
            let mut state = self.shared.state.lock();
            self.shared.disconnect_locked(&mut state);
        }
        self.shared.status.flush();
    }

    /// Manual disconnect followed by a fresh connect
    pub fn reconnect(&self) {
        {
            let mut state = self.shared.state.lock();
            self.shared.disconnect_locked(&mut state);
            self.shared.connect_locked(&mut state);
        }
        self.shared.status.flush();
    }

    /// Disconnects and drops every subscriber. Later `connect()` calls are
    /// ignored.
    pub fn destroy(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return;
            }
            self.shared.disconnect_locked(&mut state);
            state.destroyed = true;
        }
        self.shared.status.flush();
        self.shared.dispatcher.clear();
        self.shared.status.clear();
        tracing::info!("Realtime client destroyed");
    }

    /// True only while connected with a live transport
    pub fn is_connected(&self) -> bool {
        let state = self.shared.state.lock();
        self.shared.status.status().is_connected() && state.has_open_writer()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.status()
    }

    /// Snapshot of the connection state
    pub fn connection(&self) -> Connection {
        self.shared.status.snapshot()
    }

    pub fn stats(&self) -> ConnectionStats {
        let state = self.shared.state.lock();
        let snapshot = self.shared.status.snapshot();
        let (last_event, last_event_at) = match &state.last_event {
            Some((kind, at)) => (Some(kind.clone()), Some(*at)),
            None => (None, None),
        };

        ConnectionStats {
            status: snapshot.status,
            is_connected: snapshot.status.is_connected() && state.has_open_writer(),
            reconnect_attempt: snapshot.reconnect_attempt,
            last_connected: snapshot.last_connected,
            last_disconnected: snapshot.last_disconnected,
            last_event,
            last_event_at,
            last_pong: state.last_pong,
            last_error: snapshot.last_error,
            queued_frames: state.queue.len(),
        }
    }

    /// Receiver that always holds the latest [`Connection`] snapshot
    pub fn watch_status(&self) -> watch::Receiver<Connection> {
        self.shared.status.watch()
    }

    /// Subscribes to one event kind. Keep the returned handle to unsubscribe.
    ///
    /// Only application events are delivered here. Status changes have their
    /// own channel: use [`on_status`](Self::on_status), not `on("status", ..)`.
    pub fn on<F>(&self, kind: impl Into<EventKind>, callback: F) -> EventCallback
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        self.on_callback(kind, Arc::clone(&callback));
        callback
    }

    /// Registers an existing callback handle; registering it twice makes it
    /// run twice
    pub fn on_callback(&self, kind: impl Into<EventKind>, callback: EventCallback) {
        let kind = kind.into();
        if kind.as_str() == STATUS_PSEUDO_KIND {
            tracing::warn!(
                "on(\"status\") only receives server events of that kind; use on_status() for connection status"
            );
        }
        self.shared.dispatcher.on(kind, callback);
    }

    /// Removes the first registration of `callback` for `kind`
    pub fn off(&self, kind: impl Into<EventKind>, callback: &EventCallback) -> bool {
        self.shared.dispatcher.off(&kind.into(), callback)
    }

    /// Subscribes to every application event
    pub fn on_any<F>(&self, callback: F) -> EventCallback
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(callback);
        self.shared.dispatcher.on_any(Arc::clone(&callback));
        callback
    }

    pub fn off_any(&self, callback: &EventCallback) -> bool {
        self.shared.dispatcher.off_any(callback)
    }

    /// Subscribes to status transitions
    pub fn on_status<F>(&self, callback: F) -> StatusCallback
    where
        F: Fn(ConnectionStatus, Option<&str>) + Send + Sync + 'static,
    {
        let callback: StatusCallback = Arc::new(callback);
        self.on_status_callback(Arc::clone(&callback));
        callback
    }

    pub fn on_status_callback(&self, callback: StatusCallback) {
        self.shared.status.subscribe(callback);
    }

    pub fn off_status(&self, callback: &StatusCallback) -> bool {
        self.shared.status.unsubscribe(callback)
    }

    /// Sends a text frame now, or queues it until the next successful open
    pub fn send(&self, text: impl Into<String>) {
        let text = text.into();
        let mut state = self.shared.state.lock();
        if state.destroyed {
            tracing::warn!("send() called on a destroyed client, dropping frame");
            return;
        }

        let connected = self.shared.status.status().is_connected();
        let text = match state.writer.as_ref().filter(|_| connected) {
            Some(writer) => match writer.send(Message::Text(text.into())) {
                Ok(()) => return,
                Err(mpsc::error::SendError(frame)) => match frame.into_text() {
                    Ok(text) => text.as_str().to_string(),
                    Err(_) => return,
                },
            },
            None => text,
        };

        tracing::debug!("Not connected, queueing frame");
        state.queue.push(text);
    }

    /// Serializes `payload` to JSON and sends it like [`send`](Self::send)
    pub fn send_json<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        self.send(text);
        Ok(())
    }

    /// Number of frames waiting for the next open
    pub fn queued_len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }
}
