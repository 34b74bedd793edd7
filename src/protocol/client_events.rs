use serde::{Deserialize, Serialize};
use super::models::{Item, ResponseConfig, SessionUpdateConfig};

/// Frames the client writes to the control channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        session: Box<SessionUpdateConfig>,
    },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: Box<Item>,
    },
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Box<ResponseConfig>>,
    },
    #[serde(rename = "response.cancel")]
    ResponseCancel {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear {
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
}

impl ClientEvent {
    #[must_use]
    pub fn session_update(config: SessionUpdateConfig) -> Self {
        Self::SessionUpdate {
            event_id: None,
            session: Box::new(config),
        }
    }

    #[must_use]
    pub fn item_create(item: Item) -> Self {
        Self::ConversationItemCreate {
            event_id: None,
            previous_item_id: None,
            item: Box::new(item),
        }
    }

    /// `response.create` using the session defaults.
    #[must_use]
    pub const fn respond() -> Self {
        Self::ResponseCreate {
            event_id: None,
            response: None,
        }
    }

    #[must_use]
    pub fn respond_with(config: ResponseConfig) -> Self {
        Self::ResponseCreate {
            event_id: None,
            response: Some(Box::new(config)),
        }
    }

    /// Wire name of the event, as written in the `type` field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate { .. } => "response.create",
            Self::ResponseCancel { .. } => "response.cancel",
            Self::InputAudioBufferClear { .. } => "input_audio_buffer.clear",
        }
    }
}
