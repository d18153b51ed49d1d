use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::MessageId;

/// Envelopes a connected client may send.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Message {
        message: String,
    },
    Typing {
        #[serde(default)]
        is_typing: bool,
    },
    Read {
        message_id: MessageId,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("envelope is not a JSON object")]
    NotAnObject,
    #[error("unknown envelope type {0}")]
    UnknownType(String),
    #[error("`{kind}` envelope is incomplete: {source}")]
    Incomplete {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl EnvelopeError {
    /// Metric label for the rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            EnvelopeError::Malformed(_) | EnvelopeError::NotAnObject => "malformed",
            EnvelopeError::UnknownType(_) => "unknown_type",
            EnvelopeError::Incomplete { .. } => "incomplete",
        }
    }
}

impl Envelope {
    /// Parses a client frame. A missing `type` means `message`.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let mut value: Value = serde_json::from_str(text).map_err(EnvelopeError::Malformed)?;
        let object = value.as_object_mut().ok_or(EnvelopeError::NotAnObject)?;

        let kind = match object.get("type") {
            None => "message".to_string(),
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => return Err(EnvelopeError::UnknownType(other.to_string())),
        };
        if !matches!(kind.as_str(), "message" | "typing" | "read") {
            return Err(EnvelopeError::UnknownType(kind));
        }
        object.insert("type".to_string(), Value::String(kind.clone()));

        serde_json::from_value(value).map_err(|source| EnvelopeError::Incomplete { kind, source })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Message { .. } => "message",
            Envelope::Typing { .. } => "typing",
            Envelope::Read { .. } => "read",
        }
    }
}

/// Events fanned out to the sessions of a room, plus `Error`, which is only
/// ever sent to the session whose action failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message {
        message: String,
        sender: String,
        timestamp: DateTime<Utc>,
        message_id: MessageId,
    },
    Typing {
        username: String,
        is_typing: bool,
    },
    Status {
        username: String,
        is_online: bool,
    },
    Read {
        message_id: MessageId,
        reader: String,
    },
    Error {
        message: String,
    },
}

impl ChatEvent {
    /// Typing and presence events that describe `username` itself are not
    /// shown back to that user, on any of their sessions.
    pub fn is_echo_for(&self, username: &str) -> bool {
        match self {
            ChatEvent::Typing { username: from, .. } | ChatEvent::Status { username: from, .. } => {
                from == username
            }
            ChatEvent::Message { .. } | ChatEvent::Read { .. } | ChatEvent::Error { .. } => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Message { .. } => "message",
            ChatEvent::Typing { .. } => "typing",
            ChatEvent::Status { .. } => "status",
            ChatEvent::Read { .. } => "read",
            ChatEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_each_envelope_kind() {
        assert_eq!(
            Envelope::parse(r#"{"type":"message","message":"hi"}"#).unwrap(),
            Envelope::Message { message: "hi".into() }
        );
        assert_eq!(
            Envelope::parse(r#"{"type":"typing","is_typing":true}"#).unwrap(),
            Envelope::Typing { is_typing: true }
        );
        assert_eq!(
            Envelope::parse(r#"{"type":"read","message_id":42}"#).unwrap(),
            Envelope::Read { message_id: 42 }
        );
    }

    #[test]
    fn missing_type_defaults_to_message() {
        assert_eq!(
            Envelope::parse(r#"{"message":"hello"}"#).unwrap(),
            Envelope::Message { message: "hello".into() }
        );
    }

    #[test]
    fn typing_flag_defaults_to_false() {
        assert_eq!(
            Envelope::parse(r#"{"type":"typing"}"#).unwrap(),
            Envelope::Typing { is_typing: false }
        );
    }

    #[test]
    fn rejections_carry_a_reason() {
        let cases = [
            ("{not json", "malformed"),
            ("[1,2]", "malformed"),
            (r#"{"type":"wave"}"#, "unknown_type"),
            (r#"{"type":7}"#, "unknown_type"),
            (r#"{"type":"read"}"#, "incomplete"),
            (r#"{"type":"read","message_id":"x"}"#, "incomplete"),
            (r#"{"type":"message"}"#, "incomplete"),
        ];
        for (text, reason) in cases {
            let err = Envelope::parse(text).unwrap_err();
            assert_eq!(err.reason(), reason, "{text}");
        }
    }

    #[test]
    fn outbound_shapes() {
        let event = ChatEvent::Status { username: "alice".into(), is_online: true };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "status", "username": "alice", "is_online": true})
        );

        let event = ChatEvent::Read { message_id: 3, reader: "bob".into() };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "read", "message_id": 3, "reader": "bob"})
        );

        let timestamp = "2025-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let event = ChatEvent::Message {
            message: "hi".into(),
            sender: "alice".into(),
            timestamp,
            message_id: 9,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["sender"], "alice");
        assert_eq!(value["message_id"], 9);
        assert_eq!(value["timestamp"], "2025-03-01T10:00:00Z");
    }

    #[test]
    fn own_typing_and_status_are_echoes() {
        let typing = ChatEvent::Typing { username: "alice".into(), is_typing: true };
        assert!(typing.is_echo_for("alice"));
        assert!(!typing.is_echo_for("bob"));

        let read = ChatEvent::Read { message_id: 1, reader: "alice".into() };
        assert!(!read.is_echo_for("alice"));
    }
}
