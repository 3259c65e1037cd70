use crate::infrastructure::{OutboundQueue, TaskSlot};
use crate::messaging::EventKind;
use crate::status::ConnectionStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Consolidated mutable state for RealtimeClient
/// Using a single struct keeps every transition under one lock
pub struct ClientState {
    /// Bumped by every connect and manual disconnect; background tasks
    /// carry the epoch they were started for and stand down on mismatch
    pub epoch: u64,

    /// Consecutive reconnect attempts since the last successful open
    pub reconnect_attempt: u32,

    /// Outbound channel into the live connection task
    pub writer: Option<mpsc::UnboundedSender<Message>>,

    pub reconnect_timer: TaskSlot,
    pub keepalive: TaskSlot,
    pub connection: TaskSlot,

    /// Frames sent while disconnected
    pub queue: OutboundQueue,

    /// Set by destroy; the client ignores connect/send afterwards
    pub destroyed: bool,

    pub last_event: Option<(EventKind, DateTime<Utc>)>,
    pub last_pong: Option<DateTime<Utc>>,
}

impl ClientState {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            epoch: 0,
            reconnect_attempt: 0,
            writer: None,
            reconnect_timer: TaskSlot::new(),
            keepalive: TaskSlot::new(),
            connection: TaskSlot::new(),
            queue: OutboundQueue::new(max_queue_size),
            destroyed: false,
            last_event: None,
            last_pong: None,
        }
    }

    /// Whether a task started for `epoch` may still act
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && !self.destroyed
    }

    pub fn has_open_writer(&self) -> bool {
        self.writer.as_ref().is_some_and(|writer| !writer.is_closed())
    }
}

/// Point-in-time connection statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub status: ConnectionStatus,
    pub is_connected: bool,
    pub reconnect_attempt: u32,
    pub last_connected: Option<DateTime<Utc>>,
    pub last_disconnected: Option<DateTime<Utc>>,
    /// Kind of the most recently delivered application event
    pub last_event: Option<EventKind>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_pong: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub queued_frames: usize,
}
