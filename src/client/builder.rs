use super::RealtimeClient;
use super::core::ClientShared;
use crate::config::RealtimeConfig;
use crate::types::Result;
use crate::websocket::{Connector, WebSocketFactory};
use std::sync::Arc;

/// Builder for RealtimeClient that validates the config and wires the transport
pub struct RealtimeClientBuilder {
    config: RealtimeConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl RealtimeClientBuilder {
    /// Create a new builder
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            connector: None,
        }
    }

    /// Replace the default tungstenite dialer
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build the client. No connection is opened until `connect()`.
    pub fn build(self) -> Result<RealtimeClient> {
        self.config.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketFactory));
        tracing::debug!("Building realtime client for {}", self.config.url);

        Ok(RealtimeClient {
            shared: Arc::new(ClientShared::new(self.config, connector)),
        })
    }
}
