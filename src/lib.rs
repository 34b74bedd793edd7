#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Voice sessions with the `OpenAI` Realtime API over WebRTC.
//!
//! A session fetches a short-lived credential from a relay, negotiates a peer
//! connection carrying microphone audio plus the `oai-events` data channel,
//! and routes the JSON events arriving on that channel.

pub mod protocol;
pub mod transport;
pub mod error;
pub mod sdk;

pub use error::{Error, Result};
pub use sdk::{
    ChannelState, Collaborators, ControlChannel, CredentialProvider, EventStream, OfferExchange, Realtime,
    RealtimeBuilder, RealtimeClient, SessionEvent, SessionHandle, SessionPhase, SessionSettings, ToolCall,
    ToolRegistry, ToolResult, Transcript, Turn, WeatherTool,
};
pub use protocol::client_events::ClientEvent;
pub use protocol::server_events::ServerEvent;
pub use protocol::models::{
    ContentPart, Infinite, InputAudioTranscription, Item, ItemStatus, MaxTokens, Modality, Response,
    ResponseConfig, ResponseStatus, Role, Session, SessionUpdateConfig, Tool, ToolChoice, TurnDetection,
};
pub use transport::peer::{
    AudioSource, DataChannel, MediaDevices, PeerConnection, PeerConnector, PeerEvent, SdpKind,
    SessionDescription,
};
pub use transport::rest::{Credential, CredentialClient, MintRequest, SessionMinter, SignalingClient};

use crate::protocol::models;

pub(crate) const TRACE_LOG_MAX_BYTES: usize = 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

pub(crate) fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}

#[allow(clippy::result_large_err)]
pub(crate) fn validate_client_event(event: &ClientEvent) -> Result<()> {
    match event {
        ClientEvent::SessionUpdate { session, .. } => {
            validate_session_update(session.as_ref())?;
        }
        ClientEvent::ResponseCreate { response: Some(config), .. } => {
            validate_response_config(config.as_ref())?;
        }
        _ => {}
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn validate_session_update(config: &models::SessionUpdateConfig) -> Result<()> {
    if let Some(max) = &config.max_response_output_tokens {
        max.validate()?;
    }
    if let Some(turn_detection) = &config.turn_detection {
        turn_detection.validate()?;
    }
    if let Some(tools) = &config.tools {
        validate_tools(tools)?;
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn validate_response_config(config: &models::ResponseConfig) -> Result<()> {
    if let Some(max) = &config.max_output_tokens {
        max.validate()?;
    }
    Ok(())
}

#[allow(clippy::result_large_err)]
fn validate_tools(tools: &[models::Tool]) -> Result<()> {
    for tool in tools {
        if tool.name().trim().is_empty() {
            return Err(Error::InvalidClientEvent("function tool name must not be empty".to_string()));
        }
    }
    Ok(())
}
