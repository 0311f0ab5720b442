//! Inbound message envelope and the typed requests parsed out of it.

use kestrel_chats::{ChatId, ChatType};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// One decoded client event. The sender's identity comes from the transport.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub event: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl InboundMessage {
    pub fn new(event: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Decode a text frame
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(text).map_err(|e| PayloadError::Envelope(e.to_string()))
    }
}

/// Failures while turning an untyped payload into a request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed message envelope: {0}")]
    Envelope(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown chat type `{0}`")]
    UnknownChatType(String),
}

/// Typed view over an inbound payload
pub trait FromPayload: Sized {
    fn from_payload(data: &Map<String, Value>) -> Result<Self, PayloadError>;
}

fn string_field(data: &Map<String, Value>, field: &'static str) -> Result<String, PayloadError> {
    match data.get(field) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(field)),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(PayloadError::WrongType {
            field,
            expected: "string",
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrCreateChatRequest {
    pub chat_type: ChatType,
    pub username: String,
}

impl FromPayload for GetOrCreateChatRequest {
    fn from_payload(data: &Map<String, Value>) -> Result<Self, PayloadError> {
        let raw_type = string_field(data, "chat_type")?;
        let chat_type = raw_type
            .parse()
            .map_err(|_| PayloadError::UnknownChatType(raw_type))?;

        Ok(Self {
            chat_type,
            username: string_field(data, "username")?,
        })
    }
}

/// Payload shared by `create_group` and `create_channel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoomRequest {
    pub title: String,
    pub username: String,
    pub description: String,
}

impl FromPayload for CreateRoomRequest {
    fn from_payload(data: &Map<String, Value>) -> Result<Self, PayloadError> {
        Ok(Self {
            title: string_field(data, "title")?,
            username: string_field(data, "username")?,
            description: string_field(data, "description")?,
        })
    }
}

/// Payload for member and admin management events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRequest {
    pub chat_id: ChatId,
    pub username: String,
}

impl FromPayload for MembershipRequest {
    fn from_payload(data: &Map<String, Value>) -> Result<Self, PayloadError> {
        Ok(Self {
            chat_id: ChatId::from(string_field(data, "chat_id")?),
            username: string_field(data, "username")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteChatRequest {
    pub chat_id: ChatId,
}

impl FromPayload for DeleteChatRequest {
    fn from_payload(data: &Map<String, Value>) -> Result<Self, PayloadError> {
        Ok(Self {
            chat_id: ChatId::from(string_field(data, "chat_id")?),
        })
    }
}
