use crate::messaging::{ControlFrame, EventKind};
use crate::types::constants::TYPE_FIELD;
use crate::types::{RealtimeError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderType {
    Contact,
    User,
    Agent,
    #[serde(other)]
    Unknown,
}

/// Content type of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Document,
    Audio,
    Video,
    #[serde(other)]
    Unknown,
}

/// Payload of a `new_message` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub chat_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub sender_type: SenderType,
    /// ISO-8601 timestamp as sent by the server
    pub timestamp: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub chat_name: String,
    #[serde(default)]
    pub chat_external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
}

impl NewMessageEvent {
    /// Parses `timestamp`, accepting RFC 3339 or a naive timestamp taken as UTC.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Payload of a `chat_updated` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUpdatedEvent {
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining fields the server attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `chat_deleted` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDeletedEvent {
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// An application event received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    NewMessage(NewMessageEvent),
    ChatUpdated(ChatUpdatedEvent),
    ChatDeleted(ChatDeletedEvent),
    /// Unknown kind, or a known kind whose payload did not match its shape
    Unknown { kind: String, payload: Value },
}

impl RealtimeEvent {
    /// Decodes an event body (without the `type` field) for the given kind.
    ///
    /// Never fails: payloads that do not fit the known shape are kept as
    /// [`RealtimeEvent::Unknown`] under the same kind string.
    pub fn decode(kind: &str, body: Map<String, Value>) -> Self {
        let value = Value::Object(body);
        let decoded = match EventKind::parse(kind) {
            EventKind::NewMessage => {
                serde_json::from_value(value.clone()).map(RealtimeEvent::NewMessage)
            }
            EventKind::ChatUpdated => {
                serde_json::from_value(value.clone()).map(RealtimeEvent::ChatUpdated)
            }
            EventKind::ChatDeleted => {
                serde_json::from_value(value.clone()).map(RealtimeEvent::ChatDeleted)
            }
            EventKind::Custom(_) => {
                return RealtimeEvent::Unknown {
                    kind: kind.to_string(),
                    payload: value,
                };
            }
        };

        decoded.unwrap_or_else(|e| {
            tracing::debug!("Payload for '{}' did not match its shape: {}", kind, e);
            RealtimeEvent::Unknown {
                kind: kind.to_string(),
                payload: value,
            }
        })
    }

    /// The subscription key this event is dispatched under
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::ChatUpdated(_) => EventKind::ChatUpdated,
            Self::ChatDeleted(_) => EventKind::ChatDeleted,
            Self::Unknown { kind, .. } => EventKind::parse(kind),
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::NewMessage(e) => Some(&e.chat_id),
            Self::ChatUpdated(e) => Some(&e.chat_id),
            Self::ChatDeleted(e) => Some(&e.chat_id),
            Self::Unknown { payload, .. } => payload.get("chat_id").and_then(Value::as_str),
        }
    }
}

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Control(ControlFrame),
    Event(RealtimeEvent),
}

impl InboundFrame {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Serialization`] for invalid JSON and
    /// [`RealtimeError::MalformedFrame`] when the payload is not an object
    /// with a string `type` field.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut body) = value else {
            return Err(RealtimeError::MalformedFrame(
                "payload is not a JSON object".to_string(),
            ));
        };

        let kind = match body.remove(TYPE_FIELD) {
            Some(Value::String(kind)) => kind,
            Some(_) => {
                return Err(RealtimeError::MalformedFrame(
                    "`type` field is not a string".to_string(),
                ));
            }
            None => {
                return Err(RealtimeError::MalformedFrame(
                    "missing `type` field".to_string(),
                ));
            }
        };

        if let Some(control) = ControlFrame::parse(&kind) {
            return Ok(Self::Control(control));
        }

        Ok(Self::Event(RealtimeEvent::decode(&kind, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_message_json() -> Value {
        json!({
            "type": "new_message",
            "chat_id": "c-1",
            "channel_id": "ch-9",
            "message_id": "m-42",
            "sender_type": "CONTACT",
            "timestamp": "2024-05-01T10:15:00Z",
            "message_type": "text",
            "preview": "hola",
            "external_id": "wa-1",
            "chat_name": "Ana",
            "chat_external_id": "5215550000"
        })
    }

    #[test]
    fn test_parse_new_message() {
        let frame = InboundFrame::parse(&new_message_json().to_string()).unwrap();
        let InboundFrame::Event(RealtimeEvent::NewMessage(event)) = frame else {
            panic!("expected new_message");
        };
        assert_eq!(event.chat_id, "c-1");
        assert_eq!(event.sender_type, SenderType::Contact);
        assert_eq!(event.message_type, MessageType::Text);
        assert_eq!(event.assigned_to, None);
        assert_eq!(
            event.timestamp_utc().unwrap().to_rfc3339(),
            "2024-05-01T10:15:00+00:00"
        );
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let mut raw = new_message_json();
        raw["timestamp"] = json!("2024-05-01T10:15:00.123456");
        let InboundFrame::Event(RealtimeEvent::NewMessage(event)) =
            InboundFrame::parse(&raw.to_string()).unwrap()
        else {
            panic!("expected new_message");
        };
        assert!(event.timestamp_utc().is_some());
    }

    #[test]
    fn test_parse_control_frames() {
        assert_eq!(
            InboundFrame::parse(r#"{"type":"ping"}"#).unwrap(),
            InboundFrame::Control(ControlFrame::Ping)
        );
        assert_eq!(
            InboundFrame::parse(r#"{"type":"pong","ts":1}"#).unwrap(),
            InboundFrame::Control(ControlFrame::Pong)
        );
    }

    #[test]
    fn test_known_kind_with_bad_shape_falls_back_to_unknown() {
        let frame = InboundFrame::parse(r#"{"type":"new_message","chat_id":"c-1"}"#).unwrap();
        let InboundFrame::Event(event) = frame else {
            panic!("expected event");
        };
        assert_eq!(event.kind(), EventKind::NewMessage);
        assert_eq!(event.chat_id(), Some("c-1"));
        assert!(matches!(event, RealtimeEvent::Unknown { .. }));
    }

    #[test]
    fn test_unknown_kind_keeps_payload() {
        let frame = InboundFrame::parse(r#"{"type":"typing","chat_id":"c-7"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Event(RealtimeEvent::Unknown {
                kind: "typing".to_string(),
                payload: json!({"chat_id": "c-7"}),
            })
        );
    }

    #[test]
    fn test_chat_updated_keeps_extra_fields() {
        let frame =
            InboundFrame::parse(r#"{"type":"chat_updated","chat_id":"c-3","unread":4}"#).unwrap();
        let InboundFrame::Event(RealtimeEvent::ChatUpdated(event)) = frame else {
            panic!("expected chat_updated");
        };
        assert_eq!(event.chat_id, "c-3");
        assert_eq!(event.extra.get("unread"), Some(&json!(4)));
        assert!(!event.extra.contains_key("type"));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            InboundFrame::parse("not json"),
            Err(RealtimeError::Serialization(_))
        ));
        assert!(matches!(
            InboundFrame::parse("[1,2]"),
            Err(RealtimeError::MalformedFrame(_))
        ));
        assert!(matches!(
            InboundFrame::parse(r#"{"chat_id":"c-1"}"#),
            Err(RealtimeError::MalformedFrame(_))
        ));
        assert!(matches!(
            InboundFrame::parse(r#"{"type":7}"#),
            Err(RealtimeError::MalformedFrame(_))
        ));
    }
}
