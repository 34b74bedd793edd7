use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
pub const DEFAULT_VOICE: &str = "verse";

/// Upper bound the service accepts for `max_response_output_tokens`.
pub const MAX_RESPONSE_TOKENS: u32 = 4096;

/// JSON Schema / tool parameter definitions are intentionally untyped.
pub type JsonSchema = Value;

/// Free-form JSON payloads (unknown events, echoed session fields).
pub type ArbitraryJson = Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    InProgress,
    Completed,
    Incomplete,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    #[default]
    Audio,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MaxTokens {
    Count(u32),
    Infinite(Infinite),
}

impl MaxTokens {
    /// # Errors
    /// Returns an error if a finite cap falls outside `1..=4096`.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        match self {
            Self::Count(n) if *n == 0 || *n > MAX_RESPONSE_TOKENS => {
                Err(crate::error::Error::InvalidClientEvent(format!(
                    "max_response_output_tokens must be within 1..={MAX_RESPONSE_TOKENS}, got {n}"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for MaxTokens {
    fn default() -> Self {
        Self::Count(MAX_RESPONSE_TOKENS)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Infinite {
    #[serde(rename = "inf")]
    Inf,
}
