use crate::protocol::client_events::ClientEvent;
use crate::protocol::models::{
    DEFAULT_MODEL, DEFAULT_VOICE, InputAudioTranscription, MaxTokens, Modality, SessionUpdateConfig,
    ToolChoice, TurnDetection,
};
use crate::transport::peer::{MediaDevices, PeerConnector};
use crate::transport::rest::{CredentialClient, REALTIME_BASE_URL, SignalingClient};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

use super::ToolRegistry;
use super::negotiator::Collaborators;
use super::session::RealtimeClient;

pub const DEFAULT_GREETING: &str = "Greet the user in one short sentence and ask how you can help.";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Realtime;

impl Realtime {
    #[must_use]
    pub fn builder() -> RealtimeBuilder {
        RealtimeBuilder::new()
    }
}

/// Immutable per-client configuration, fixed at [`RealtimeBuilder::build`].
#[derive(Debug)]
pub struct SessionSettings {
    relay_url: Option<String>,
    realtime_url: String,
    model: String,
    voice: String,
    greeting: Option<String>,
    session: SessionUpdateConfig,
    tools: Arc<ToolRegistry>,
    timeout: Duration,
}

impl SessionSettings {
    #[must_use]
    pub fn relay_url(&self) -> Option<&str> {
        self.relay_url.as_deref()
    }

    #[must_use]
    pub fn realtime_url(&self) -> &str {
        &self.realtime_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    #[must_use]
    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref()
    }

    /// The `session.update` body sent on every channel open.
    #[must_use]
    pub const fn session_update(&self) -> &SessionUpdateConfig {
        &self.session
    }

    #[must_use]
    pub const fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

pub struct RealtimeBuilder {
    relay_url: Option<String>,
    realtime_url: String,
    model: String,
    voice: String,
    greeting: Option<String>,
    instructions: Option<String>,
    modalities: Vec<Modality>,
    turn_detection: TurnDetection,
    max_response_output_tokens: MaxTokens,
    transcription_model: Option<String>,
    tools: ToolRegistry,
    timeout: Duration,
}

impl RealtimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            relay_url: None,
            realtime_url: REALTIME_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            instructions: None,
            modalities: vec![Modality::Audio, Modality::Text],
            turn_detection: TurnDetection::default(),
            max_response_output_tokens: MaxTokens::default(),
            transcription_model: None,
            tools: ToolRegistry::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Base URL of the token relay; credentials are fetched from `{relay}/session`.
    #[must_use]
    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_url = url.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Instructions for the one-time opening response.
    #[must_use]
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    #[must_use]
    pub fn no_greeting(mut self) -> Self {
        self.greeting = None;
        self
    }

    /// Session-wide system instructions.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn output_text(mut self) -> Self {
        self.modalities = vec![Modality::Text];
        self
    }

    #[must_use]
    pub fn modalities(mut self, modalities: Vec<Modality>) -> Self {
        self.modalities = modalities;
        self
    }

    #[must_use]
    pub fn turn_detection(mut self, turn_detection: TurnDetection) -> Self {
        self.turn_detection = turn_detection;
        self
    }

    #[must_use]
    pub const fn max_response_output_tokens(mut self, max: MaxTokens) -> Self {
        self.max_response_output_tokens = max;
        self
    }

    /// Ask the service to transcribe user audio with `model` (e.g. `whisper-1`).
    #[must_use]
    pub fn transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a client that fetches credentials from the relay and negotiates
    /// with the realtime endpoint over HTTP.
    ///
    /// # Errors
    /// Returns `Error::InvalidClientEvent` if no relay URL is set or the session
    /// configuration is invalid, or an error if a URL does not parse.
    #[allow(clippy::result_large_err)]
    pub fn build(self, devices: Arc<dyn MediaDevices>, peers: Arc<dyn PeerConnector>) -> Result<RealtimeClient> {
        let relay = self
            .relay_url
            .clone()
            .ok_or_else(|| Error::InvalidClientEvent("relay_url required".to_string()))?;
        let credentials = CredentialClient::new_with_timeout(&relay, self.timeout)?;
        let signaling = SignalingClient::new_with_timeout(&self.realtime_url, self.timeout)?;
        self.build_with(Collaborators {
            credentials: Arc::new(credentials),
            signaling: Arc::new(signaling),
            devices,
            peers,
        })
    }

    /// Build a client around caller-supplied collaborators.
    ///
    /// # Errors
    /// Returns `Error::InvalidClientEvent` if the session configuration is invalid.
    #[allow(clippy::result_large_err)]
    pub fn build_with(self, collaborators: Collaborators) -> Result<RealtimeClient> {
        let settings = self.settings()?;
        Ok(RealtimeClient::new(settings, collaborators))
    }

    #[allow(clippy::result_large_err)]
    fn settings(self) -> Result<SessionSettings> {
        let tools = self.tools.try_as_tools()?;
        let has_tools = !tools.is_empty();
        let session = SessionUpdateConfig {
            modalities: Some(self.modalities),
            instructions: self.instructions,
            voice: Some(self.voice.clone()),
            turn_detection: Some(self.turn_detection),
            input_audio_transcription: self.transcription_model.map(InputAudioTranscription::new),
            tools: has_tools.then_some(tools),
            tool_choice: has_tools.then_some(ToolChoice::Auto),
            max_response_output_tokens: Some(self.max_response_output_tokens),
        };
        crate::validate_client_event(&ClientEvent::session_update(session.clone()))?;

        Ok(SessionSettings {
            relay_url: self.relay_url,
            realtime_url: self.realtime_url,
            model: self.model,
            voice: self.voice,
            greeting: self.greeting,
            session,
            tools: Arc::new(self.tools),
            timeout: self.timeout,
        })
    }
}

impl Default for RealtimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
