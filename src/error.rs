use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    RateLimitError,
    AuthenticationError,
    ServerError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerError {
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    pub code: Option<String>,
    pub message: String,
    pub param: Option<String>,
    pub event_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Credential request failed: {0}")]
    Auth(String),

    #[error("Microphone unavailable: {0}")]
    MediaAccess(String),

    #[error("Session negotiation failed: {}", negotiation_detail(*.status, .message))]
    Negotiation { status: Option<u16>, message: String },

    #[error("Control channel error: {0}")]
    Channel(String),

    #[error("Tool call failed: {0}")]
    Tool(String),

    #[error("HTTP protocol error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("OpenAI API error: {0:?}")]
    Api(ServerError),

    #[error("Session is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("The session was closed")]
    Closed,

    #[error("Invalid client event: {0}")]
    InvalidClientEvent(String),
}

impl Error {
    pub(crate) fn negotiation(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Negotiation {
            status,
            message: message.into(),
        }
    }

    /// Short label for the failure class, suitable for a status indicator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::MediaAccess(_) => "media",
            Self::Negotiation { .. } => "negotiation",
            Self::Channel(_) => "channel",
            Self::Tool(_) => "tool",
            Self::Http(_) => "http",
            Self::Serialization(_) => "serialization",
            Self::Url(_) | Self::Header(_) | Self::InvalidClientEvent(_) => "config",
            Self::Api(_) => "api",
            Self::InvalidState { .. } => "state",
            Self::Closed => "closed",
        }
    }
}

fn negotiation_detail(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("{code} {message}"),
        None => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
