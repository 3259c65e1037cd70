use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur when using the realtime event client.
///
/// Connectivity problems never surface through the public `connect`/`send`
/// surface; they are reported as status transitions. This type covers the
/// transport seam, configuration and serialization.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Inbound frame is not a JSON object with a string `type` field
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dialing the endpoint took longer than the configured timeout
    #[error("Timeout error")]
    Timeout,
}

/// Convenience type alias for `Result<T, RealtimeError>`.
pub type Result<T> = std::result::Result<T, RealtimeError>;
