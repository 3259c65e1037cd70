//! Client configuration and deployment profiles.

use crate::infrastructure::Backoff;
use crate::types::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_KEEPALIVE_INTERVAL_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_MAX_RECONNECT_DELAY_MS, DEFAULT_RECONNECT_DELAY_MS, DEFAULT_RECONNECT_JITTER_MS,
    DEFAULT_WEBSOCKET_PATH, MAX_OUTBOUND_QUEUE_SIZE, RealtimeError, Result,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Deployment profile selecting the API base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Localhost,
    Development,
    Production,
}

impl Environment {
    /// Parses an `APP_MODE` value; anything unrecognised means localhost
    pub fn from_mode(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            _ => Self::Localhost,
        }
    }

    pub fn api_base_url(&self) -> &'static str {
        match self {
            Self::Localhost => "http://localhost:8000",
            Self::Development => "https://api.dev.agenthub.com",
            Self::Production => "https://api.agenthub.com",
        }
    }
}

/// Settings for a [`RealtimeClient`](crate::RealtimeClient).
///
/// Every field except `url` has a default, so a config can be deserialized
/// from a document that only names the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// `ws://` or `wss://` endpoint
    pub url: String,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    #[serde(default = "default_reconnect_jitter_ms")]
    pub reconnect_jitter_ms: u64,
    /// Zero disables the keep-alive ping
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

fn default_max_reconnect_delay_ms() -> u64 {
    DEFAULT_MAX_RECONNECT_DELAY_MS
}

fn default_reconnect_jitter_ms() -> u64 {
    DEFAULT_RECONNECT_JITTER_MS
}

fn default_keepalive_interval_ms() -> u64 {
    DEFAULT_KEEPALIVE_INTERVAL_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_max_queue_size() -> usize {
    MAX_OUTBOUND_QUEUE_SIZE
}

impl RealtimeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            reconnect_jitter_ms: DEFAULT_RECONNECT_JITTER_MS,
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_queue_size: MAX_OUTBOUND_QUEUE_SIZE,
        }
    }

    /// Config pointing at the websocket endpoint of an environment profile
    pub fn for_environment(env: Environment) -> Result<Self> {
        let url = websocket_url(env.api_base_url(), DEFAULT_WEBSOCKET_PATH)?;
        Ok(Self::new(url))
    }

    /// Builds a config from the process environment.
    ///
    /// `REALTIME_URL` wins when set; otherwise the endpoint is derived from
    /// `API_BASE_URL`, falling back to the profile named by `APP_MODE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty("REALTIME_URL") {
            let config = Self::new(url.trim());
            config.validate()?;
            return Ok(config);
        }

        let env = non_empty("APP_MODE")
            .map(|mode| Environment::from_mode(&mode))
            .unwrap_or_default();
        let base = non_empty("API_BASE_URL").unwrap_or_else(|| env.api_base_url().to_string());
        tracing::debug!("Deriving realtime endpoint from {} ({:?})", base, env);

        Ok(Self::new(websocket_url(&base, DEFAULT_WEBSOCKET_PATH)?))
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = duration_ms(delay);
        self
    }

    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay_ms = duration_ms(delay);
        self
    }

    pub fn with_reconnect_jitter(mut self, jitter: Duration) -> Self {
        self.reconnect_jitter_ms = duration_ms(jitter);
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.reconnect_delay_ms),
            Duration::from_millis(self.max_reconnect_delay_ms),
            Duration::from_millis(self.reconnect_jitter_ms),
        )
    }

    /// Checks that the endpoint is a websocket URL and the timings make sense
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::Config(format!(
                "endpoint must use ws or wss, got '{}'",
                url.scheme()
            )));
        }
        if self.max_reconnect_delay_ms < self.reconnect_delay_ms {
            return Err(RealtimeError::Config(
                "max_reconnect_delay_ms is smaller than reconnect_delay_ms".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(RealtimeError::Config(
                "connect_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Maps an HTTP API base URL to its websocket endpoint
pub fn websocket_url(api_base: &str, path: &str) -> Result<String> {
    let mut url = Url::parse(api_base)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::Config(format!(
                "unsupported API scheme '{}'",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::Config(format!("cannot switch {} to {}", api_base, scheme)))?;

    let joined = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    Ok(url.to_string())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
