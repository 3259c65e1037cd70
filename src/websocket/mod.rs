// WebSocket module - Transport seam and the default tungstenite dialer
mod factory;
#[cfg(test)]
pub(crate) mod mock;

pub use factory::{Connector, FrameSink, FrameStream, WebSocketFactory};
