/// Control frame discriminants (keep-alive layer)
pub mod control_frames {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
}

/// Application event discriminants (magic strings layer)
pub mod event_kinds {
    pub const NEW_MESSAGE: &str = "new_message";
    pub const CHAT_UPDATED: &str = "chat_updated";
    pub const CHAT_DELETED: &str = "chat_deleted";
}

/// Field carrying the discriminant in every frame
pub const TYPE_FIELD: &str = "type";

/// Default websocket path appended to the API base URL
pub const DEFAULT_WEBSOCKET_PATH: &str = "/ws";

/// Default maximum number of consecutive reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default base reconnect delay (milliseconds)
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// Default reconnect delay cap (milliseconds)
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30000;

/// Default jitter window added to every reconnect delay (milliseconds)
pub const DEFAULT_RECONNECT_JITTER_MS: u64 = 1000;

/// Default keep-alive interval (milliseconds)
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 30000;

/// Default timeout for dialing the endpoint (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10000;

/// Max outbound queue size
pub const MAX_OUTBOUND_QUEUE_SIZE: usize = 1000;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_NO_STATUS: u16 = 1005;
pub const WS_CLOSE_ABNORMAL: u16 = 1006;

/// Close reason sent on a manual disconnect
pub const MANUAL_DISCONNECT_REASON: &str = "Manual disconnect";
