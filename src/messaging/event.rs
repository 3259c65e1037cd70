use crate::types::constants::{control_frames, event_kinds};
use serde::{Deserialize, Serialize};

/// Type-safe event kinds used as subscription keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A message arrived in one of the agent's chats
    NewMessage,

    /// Chat metadata changed (assignment, name, status...)
    ChatUpdated,

    /// Chat was removed
    ChatDeleted,

    /// Any other discriminant sent by the server
    Custom(String),
}

impl EventKind {
    /// Parse a discriminant into an EventKind
    pub fn parse(s: &str) -> Self {
        match s {
            event_kinds::NEW_MESSAGE => Self::NewMessage,
            event_kinds::CHAT_UPDATED => Self::ChatUpdated,
            event_kinds::CHAT_DELETED => Self::ChatDeleted,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Convert kind to its wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::NewMessage => event_kinds::NEW_MESSAGE,
            Self::ChatUpdated => event_kinds::CHAT_UPDATED,
            Self::ChatDeleted => event_kinds::CHAT_DELETED,
            Self::Custom(s) => s,
        }
    }

    /// Whether this kind is one of the closed set of known events
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Protocol keep-alive frames, never delivered to application subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFrame {
    Ping,
    Pong,
}

impl ControlFrame {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            control_frames::PING => Some(Self::Ping),
            control_frames::PONG => Some(Self::Pong),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => control_frames::PING,
            Self::Pong => control_frames::PONG,
        }
    }

    /// Serialized wire form, e.g. `{"type":"ping"}`
    pub fn to_json(&self) -> String {
        serde_json::json!({ "type": self.as_str() }).to_string()
    }
}
