//! # AgentHub Realtime
//!
//! Client for the AgentHub realtime event feed: a single JSON-over-WebSocket
//! connection with automatic reconnection, keep-alive, an outbound queue and
//! typed event dispatch.
//!
//! ## Example
//!
//! ```no_run
//! use agenthub_realtime::{EventKind, RealtimeClient, RealtimeConfig, RealtimeEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new(RealtimeConfig::from_env()?)?;
//!
//!     client.on(EventKind::NewMessage, |event: &RealtimeEvent| {
//!         if let RealtimeEvent::NewMessage(message) = event {
//!             println!("{}: {}", message.chat_name, message.preview);
//!         }
//!     });
//!
//!     client.connect();
//!     tokio::signal::ctrl_c().await?;
//!     client.destroy();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod infrastructure;
pub mod messaging;
pub mod notification;
pub mod status;
pub mod types;
pub mod websocket;

pub use client::{ConnectionStats, RealtimeClient, RealtimeClientBuilder};
pub use config::{Environment, RealtimeConfig};
pub use messaging::{ControlFrame, EventCallback, EventKind};
pub use notification::{NotifyReason, ViewContext, should_notify};
pub use status::{Connection, ConnectionStatus, StatusCallback};
pub use types::{
    ChatDeletedEvent, ChatUpdatedEvent, MessageType, NewMessageEvent, RealtimeError,
    RealtimeEvent, Result, SenderType,
};
pub use websocket::{Connector, WebSocketFactory};
