use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ArbitraryJson, ItemStatus, Role};

/// Conversation item. Unknown item types survive a round trip as raw JSON so a
/// newer server never breaks `response.done` handling.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Message {
        id: Option<String>,
        status: Option<ItemStatus>,
        role: Role,
        content: Vec<ContentPart>,
    },
    FunctionCall {
        id: Option<String>,
        status: Option<ItemStatus>,
        name: String,
        call_id: String,
        arguments: String,
    },
    FunctionCallOutput {
        id: Option<String>,
        call_id: String,
        output: String,
    },
    Unknown(ArbitraryJson),
}

impl Item {
    /// A user-role message carrying a single text part.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::Message {
            id: None,
            status: None,
            role: Role::User,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Message { id, .. }
            | Self::FunctionCall { id, .. }
            | Self::FunctionCallOutput { id, .. } => id.as_deref(),
            Self::Unknown(value) => value.get("id").and_then(|v| v.as_str()),
        }
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Message { .. } => "message",
            Self::FunctionCall { .. } => "function_call",
            Self::FunctionCallOutput { .. } => "function_call_output",
            Self::Unknown(_) => "unknown",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ItemRepr {
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<ItemStatus>,
        role: Role,
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    FunctionCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<ItemStatus>,
        name: String,
        call_id: String,
        arguments: String,
    },
    FunctionCallOutput {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        call_id: String,
        output: String,
    },
}

impl From<ItemRepr> for Item {
    fn from(repr: ItemRepr) -> Self {
        match repr {
            ItemRepr::Message { id, status, role, content } => Self::Message { id, status, role, content },
            ItemRepr::FunctionCall { id, status, name, call_id, arguments } => {
                Self::FunctionCall { id, status, name, call_id, arguments }
            }
            ItemRepr::FunctionCallOutput { id, call_id, output } => {
                Self::FunctionCallOutput { id, call_id, output }
            }
        }
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = match self.clone() {
            Self::Unknown(value) => return value.serialize(serializer),
            Self::Message { id, status, role, content } => ItemRepr::Message { id, status, role, content },
            Self::FunctionCall { id, status, name, call_id, arguments } => {
                ItemRepr::FunctionCall { id, status, name, call_id, arguments }
            }
            Self::FunctionCallOutput { id, call_id, output } => {
                ItemRepr::FunctionCallOutput { id, call_id, output }
            }
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match ItemRepr::deserialize(value.clone()) {
            Ok(repr) => Ok(repr.into()),
            Err(err) => {
                tracing::debug!("Failed to parse Item: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}

/// Content part of a message item.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    InputText {
        text: String,
    },
    InputAudio {
        transcript: Option<String>,
    },
    Text {
        text: String,
    },
    Audio {
        transcript: Option<String>,
    },
    Unknown(ArbitraryJson),
}

impl ContentPart {
    /// Text carried by the part: the text itself, or an audio transcript.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InputText { text } | Self::Text { text } => Some(text),
            Self::InputAudio { transcript } | Self::Audio { transcript } => transcript.as_deref(),
            Self::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPartRepr {
    InputText {
        text: String,
    },
    InputAudio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    Text {
        text: String,
    },
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
}

impl Serialize for ContentPart {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = match self.clone() {
            Self::Unknown(value) => return value.serialize(serializer),
            Self::InputText { text } => ContentPartRepr::InputText { text },
            Self::InputAudio { transcript } => ContentPartRepr::InputAudio { transcript },
            Self::Text { text } => ContentPartRepr::Text { text },
            Self::Audio { transcript } => ContentPartRepr::Audio { transcript },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match ContentPartRepr::deserialize(value.clone()) {
            Ok(ContentPartRepr::InputText { text }) => Ok(Self::InputText { text }),
            Ok(ContentPartRepr::InputAudio { transcript }) => Ok(Self::InputAudio { transcript }),
            Ok(ContentPartRepr::Text { text }) => Ok(Self::Text { text }),
            Ok(ContentPartRepr::Audio { transcript }) => Ok(Self::Audio { transcript }),
            Err(err) => {
                tracing::debug!("Failed to parse ContentPart: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}
