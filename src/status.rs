//! Connection lifecycle state and its change notifications.

use crate::messaging::invoke_isolated;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle state of the realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Connecting or waiting for a reconnect
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    /// Short description for connectivity indicators
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Connecting => "Connecting...",
            Self::Reconnecting => "Reconnecting...",
            Self::Disconnected => "Disconnected",
            Self::Error => "Connection error",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only snapshot of the connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub status: ConnectionStatus,
    /// Consecutive reconnect attempts since the last successful open
    pub reconnect_attempt: u32,
    pub last_connected: Option<DateTime<Utc>>,
    pub last_disconnected: Option<DateTime<Utc>>,
    /// Error context of the latest transition, if any
    pub last_error: Option<String>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            reconnect_attempt: 0,
            last_connected: None,
            last_disconnected: None,
            last_error: None,
        }
    }
}

/// Callback invoked on every status transition
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus, Option<&str>) + Send + Sync + 'static>;

struct Notification {
    status: ConnectionStatus,
    error: Option<String>,
}

struct BroadcastState {
    snapshot: Connection,
    subscribers: Vec<StatusCallback>,
    pending: VecDeque<Notification>,
    draining: bool,
}

/// Tracks the [`Connection`] snapshot and notifies status subscribers.
///
/// Transitions are recorded in order and delivered by whichever caller is
/// first to flush; notifications raised by a subscriber while it runs are
/// queued behind the current one instead of being delivered re-entrantly.
pub struct StatusBroadcaster {
    state: Mutex<BroadcastState>,
    watch_tx: watch::Sender<Connection>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(Connection::default());
        Self {
            state: Mutex::new(BroadcastState {
                snapshot: Connection::default(),
                subscribers: Vec::new(),
                pending: VecDeque::new(),
                draining: false,
            }),
            watch_tx,
        }
    }

    pub fn snapshot(&self) -> Connection {
        self.state.lock().snapshot.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().snapshot.status
    }

    pub fn subscribe(&self, callback: StatusCallback) {
        self.state.lock().subscribers.push(callback);
    }

    /// Removes the first registration of `callback`
    pub fn unsubscribe(&self, callback: &StatusCallback) -> bool {
        let mut state = self.state.lock();
        match state
            .subscribers
            .iter()
            .position(|registered| std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(callback)))
        {
            Some(index) => {
                state.subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.state.lock().subscribers.clear();
    }

    /// Receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<Connection> {
        self.watch_tx.subscribe()
    }

    /// Records a transition without delivering it; call [`flush`](Self::flush)
    /// once no other lock is held.
    pub(crate) fn record(&self, status: ConnectionStatus, error: Option<String>) {
        let mut state = self.state.lock();
        let now = Utc::now();
        let snapshot = &mut state.snapshot;

        snapshot.status = status;
        snapshot.last_error = error.clone();
        match status {
            ConnectionStatus::Connected => {
                snapshot.last_connected = Some(snapshot.last_connected.map_or(now, |t| t.max(now)));
            }
            ConnectionStatus::Disconnected => {
                snapshot.last_disconnected =
                    Some(snapshot.last_disconnected.map_or(now, |t| t.max(now)));
            }
            _ => {}
        }

        self.watch_tx.send_replace(snapshot.clone());
        state.pending.push_back(Notification { status, error });
    }

    pub(crate) fn set_reconnect_attempt(&self, attempt: u32) {
        let mut state = self.state.lock();
        state.snapshot.reconnect_attempt = attempt;
        self.watch_tx.send_replace(state.snapshot.clone());
    }

    /// Delivers every recorded transition in order
    pub(crate) fn flush(&self) {
        {
            let mut state = self.state.lock();
            if state.draining {
                return;
            }
            state.draining = true;
        }

        loop {
            let (notification, subscribers) = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(notification) => (notification, state.subscribers.clone()),
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };

            match &notification.error {
                Some(error) => tracing::info!(
                    "Connection status changed to: {} ({})",
                    notification.status,
                    error
                ),
                None => tracing::info!("Connection status changed to: {}", notification.status),
            }

            for callback in subscribers {
                invoke_isolated("status", || {
                    callback(notification.status, notification.error.as_deref())
                });
            }
        }
    }

    /// Records and delivers a transition
    #[cfg(test)]
    pub(crate) fn transition(&self, status: ConnectionStatus, error: Option<String>) {
        self.record(status, error);
        self.flush();
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
