use serde::{Deserialize, Serialize};

/// Voice-activity settings forwarded to the service as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
    },
    SemanticVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
    },
}

impl TurnDetection {
    /// Server VAD with the thresholds the demos ship with.
    #[must_use]
    pub const fn server_vad_default() -> Self {
        Self::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(500),
            create_response: Some(true),
        }
    }

    /// # Errors
    /// Returns an error if the VAD threshold is outside `0.0..=1.0`.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if let Self::ServerVad { threshold: Some(t), .. } = self {
            if !(0.0..=1.0).contains(t) {
                return Err(crate::error::Error::InvalidClientEvent(format!(
                    "turn_detection.threshold must be within 0.0..=1.0, got {t}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self::server_vad_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct InputAudioTranscription {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl InputAudioTranscription {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            language: None,
        }
    }
}
