use serde::{Deserialize, Deserializer, Serialize, Serializer};
use super::models::{ArbitraryJson, Response, Session};
use crate::error::ServerError;

/// Frames the service writes to the control channel.
///
/// Only the types the session reacts to are typed. Anything else, including a
/// known type whose payload does not match, lands in `Unknown` with the raw JSON.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Error {
        event_id: String,
        error: ServerError,
    },
    SessionCreated {
        event_id: String,
        session: Session,
    },
    SessionUpdated {
        event_id: String,
        session: Session,
    },
    InputAudioBufferSpeechStarted {
        event_id: String,
        item_id: Option<String>,
        audio_start_ms: Option<u32>,
    },
    InputAudioBufferSpeechStopped {
        event_id: String,
        item_id: Option<String>,
        audio_end_ms: Option<u32>,
    },
    InputAudioBufferCommitted {
        event_id: String,
        item_id: Option<String>,
        previous_item_id: Option<String>,
    },
    /// In-progress transcript of the user's speech; replaces the previous partial.
    InputAudioTranscription {
        event_id: String,
        item_id: Option<String>,
        transcript: String,
    },
    InputAudioTranscriptionDelta {
        event_id: String,
        item_id: Option<String>,
        delta: String,
    },
    InputAudioTranscriptionCompleted {
        event_id: String,
        item_id: Option<String>,
        transcript: String,
    },
    InputAudioTranscriptionFailed {
        event_id: String,
        item_id: Option<String>,
        error: Option<ServerError>,
    },
    ResponseCreated {
        event_id: String,
        response: Response,
    },
    ResponseAudioTranscriptDone {
        event_id: String,
        response_id: Option<String>,
        item_id: Option<String>,
        transcript: String,
    },
    ResponseDone {
        event_id: String,
        response: Response,
    },
    Unknown(ArbitraryJson),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
enum ServerEventRepr {
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        event_id: String,
        error: ServerError,
    },
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        event_id: String,
        session: Session,
    },
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        event_id: String,
        session: Session,
    },
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        audio_start_ms: Option<u32>,
    },
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        audio_end_ms: Option<u32>,
    },
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        previous_item_id: Option<String>,
    },
    #[serde(rename = "conversation.item.input_audio_transcription")]
    InputAudioTranscription {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        transcript: String,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputAudioTranscriptionDelta {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        transcript: String,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    InputAudioTranscriptionFailed {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        error: Option<ServerError>,
    },
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        event_id: String,
        response: Response,
    },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone {
        #[serde(default)]
        event_id: String,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        transcript: String,
    },
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        event_id: String,
        response: Response,
    },
}

impl From<ServerEventRepr> for ServerEvent {
    fn from(repr: ServerEventRepr) -> Self {
        match repr {
            ServerEventRepr::Error { event_id, error } => Self::Error { event_id, error },
            ServerEventRepr::SessionCreated { event_id, session } => Self::SessionCreated { event_id, session },
            ServerEventRepr::SessionUpdated { event_id, session } => Self::SessionUpdated { event_id, session },
            ServerEventRepr::InputAudioBufferSpeechStarted { event_id, item_id, audio_start_ms } => {
                Self::InputAudioBufferSpeechStarted { event_id, item_id, audio_start_ms }
            }
            ServerEventRepr::InputAudioBufferSpeechStopped { event_id, item_id, audio_end_ms } => {
                Self::InputAudioBufferSpeechStopped { event_id, item_id, audio_end_ms }
            }
            ServerEventRepr::InputAudioBufferCommitted { event_id, item_id, previous_item_id } => {
                Self::InputAudioBufferCommitted { event_id, item_id, previous_item_id }
            }
            ServerEventRepr::InputAudioTranscription { event_id, item_id, transcript } => {
                Self::InputAudioTranscription { event_id, item_id, transcript }
            }
            ServerEventRepr::InputAudioTranscriptionDelta { event_id, item_id, delta } => {
                Self::InputAudioTranscriptionDelta { event_id, item_id, delta }
            }
            ServerEventRepr::InputAudioTranscriptionCompleted { event_id, item_id, transcript } => {
                Self::InputAudioTranscriptionCompleted { event_id, item_id, transcript }
            }
            ServerEventRepr::InputAudioTranscriptionFailed { event_id, item_id, error } => {
                Self::InputAudioTranscriptionFailed { event_id, item_id, error }
            }
            ServerEventRepr::ResponseCreated { event_id, response } => Self::ResponseCreated { event_id, response },
            ServerEventRepr::ResponseAudioTranscriptDone { event_id, response_id, item_id, transcript } => {
                Self::ResponseAudioTranscriptDone { event_id, response_id, item_id, transcript }
            }
            ServerEventRepr::ResponseDone { event_id, response } => Self::ResponseDone { event_id, response },
        }
    }
}

impl Serialize for ServerEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = match self.clone() {
            Self::Unknown(value) => return value.serialize(serializer),
            Self::Error { event_id, error } => ServerEventRepr::Error { event_id, error },
            Self::SessionCreated { event_id, session } => ServerEventRepr::SessionCreated { event_id, session },
            Self::SessionUpdated { event_id, session } => ServerEventRepr::SessionUpdated { event_id, session },
            Self::InputAudioBufferSpeechStarted { event_id, item_id, audio_start_ms } => {
                ServerEventRepr::InputAudioBufferSpeechStarted { event_id, item_id, audio_start_ms }
            }
            Self::InputAudioBufferSpeechStopped { event_id, item_id, audio_end_ms } => {
                ServerEventRepr::InputAudioBufferSpeechStopped { event_id, item_id, audio_end_ms }
            }
            Self::InputAudioBufferCommitted { event_id, item_id, previous_item_id } => {
                ServerEventRepr::InputAudioBufferCommitted { event_id, item_id, previous_item_id }
            }
            Self::InputAudioTranscription { event_id, item_id, transcript } => {
                ServerEventRepr::InputAudioTranscription { event_id, item_id, transcript }
            }
            Self::InputAudioTranscriptionDelta { event_id, item_id, delta } => {
                ServerEventRepr::InputAudioTranscriptionDelta { event_id, item_id, delta }
            }
            Self::InputAudioTranscriptionCompleted { event_id, item_id, transcript } => {
                ServerEventRepr::InputAudioTranscriptionCompleted { event_id, item_id, transcript }
            }
            Self::InputAudioTranscriptionFailed { event_id, item_id, error } => {
                ServerEventRepr::InputAudioTranscriptionFailed { event_id, item_id, error }
            }
            Self::ResponseCreated { event_id, response } => ServerEventRepr::ResponseCreated { event_id, response },
            Self::ResponseAudioTranscriptDone { event_id, response_id, item_id, transcript } => {
                ServerEventRepr::ResponseAudioTranscriptDone { event_id, response_id, item_id, transcript }
            }
            Self::ResponseDone { event_id, response } => ServerEventRepr::ResponseDone { event_id, response },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServerEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match ServerEventRepr::deserialize(value.clone()) {
            Ok(repr) => Ok(repr.into()),
            Err(err) => {
                tracing::debug!("Failed to parse ServerEvent: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}

impl ServerEvent {
    /// Wire name of the event; `None` for unknown frames without a string `type`.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        Some(match self {
            Self::Error { .. } => "error",
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::InputAudioBufferSpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::InputAudioBufferSpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::InputAudioBufferCommitted { .. } => "input_audio_buffer.committed",
            Self::InputAudioTranscription { .. } => "conversation.item.input_audio_transcription",
            Self::InputAudioTranscriptionDelta { .. } => {
                "conversation.item.input_audio_transcription.delta"
            }
            Self::InputAudioTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::InputAudioTranscriptionFailed { .. } => {
                "conversation.item.input_audio_transcription.failed"
            }
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseAudioTranscriptDone { .. } => "response.audio_transcript.done",
            Self::ResponseDone { .. } => "response.done",
            Self::Unknown(value) => return value.get("type").and_then(|v| v.as_str()),
        })
    }
}
