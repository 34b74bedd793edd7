//! Routes control-channel frames to turn and transcript updates and tool calls.

use super::channel::{ChannelState, ControlChannel};
use super::events::{EventSink, SessionEvent, Turn, emit};
use super::tools::{ToolCall, ToolInvoker};
use crate::protocol::client_events::ClientEvent;
use crate::protocol::models::{ContentPart, Item, Response, ResponseConfig, SessionUpdateConfig};
use crate::protocol::server_events::ServerEvent;
use crate::transport::peer::PeerEvent;
use crate::Error;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub item_id: Option<String>,
    pub text: String,
    pub is_final: bool,
}

/// Ordered conversation log as a renderer would show it.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent unfinished user entry for `item_id`. A missing id on
    /// either side matches anything.
    fn partial_index(&self, item_id: Option<&str>) -> Option<usize> {
        self.entries.iter().rposition(|entry| {
            entry.speaker == Speaker::User
                && !entry.is_final
                && match (entry.item_id.as_deref(), item_id) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
        })
    }

    fn push(&mut self, entry: TranscriptEntry) -> &TranscriptEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    fn upsert_user(&mut self, item_id: Option<String>, update: impl FnOnce(&mut String), is_final: bool) -> &TranscriptEntry {
        match self.partial_index(item_id.as_deref()) {
            Some(index) => {
                let entry = &mut self.entries[index];
                update(&mut entry.text);
                entry.is_final = is_final;
                if entry.item_id.is_none() {
                    entry.item_id = item_id;
                }
                &self.entries[index]
            }
            None => {
                let mut text = String::new();
                update(&mut text);
                self.push(TranscriptEntry {
                    speaker: Speaker::User,
                    item_id,
                    text,
                    is_final,
                })
            }
        }
    }

    fn set_partial(&mut self, item_id: Option<String>, text: String) -> &TranscriptEntry {
        self.upsert_user(item_id, |current| *current = text, false)
    }

    fn extend_partial(&mut self, item_id: Option<String>, delta: &str) -> &TranscriptEntry {
        self.upsert_user(item_id, |current| current.push_str(delta), false)
    }

    fn finalize(&mut self, item_id: Option<String>, text: String) -> &TranscriptEntry {
        self.upsert_user(item_id, |current| *current = text, true)
    }

    fn drop_partial(&mut self, item_id: Option<&str>) -> bool {
        self.partial_index(item_id).map(|index| self.entries.remove(index)).is_some()
    }

    fn push_assistant(&mut self, item_id: Option<String>, text: String) -> &TranscriptEntry {
        self.push(TranscriptEntry {
            speaker: Speaker::Assistant,
            item_id,
            text,
            is_final: true,
        })
    }
}

/// Text of a message: its text parts, or its audio transcripts if it has none.
fn message_text(content: &[ContentPart]) -> String {
    let texts: Vec<&str> = content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } | ContentPart::InputText { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    if texts.is_empty() {
        content.iter().filter_map(ContentPart::text).collect()
    } else {
        texts.concat()
    }
}

fn decode_arguments(arguments: &str) -> serde_json::Result<Value> {
    if arguments.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(arguments)
}

/// Consumes peer events for one session.
pub struct EventDispatcher {
    channel: ControlChannel,
    session: SessionUpdateConfig,
    greeting: Option<String>,
    greeted: bool,
    turn: Turn,
    transcript: Transcript,
    invoker: Arc<dyn ToolInvoker>,
    events: EventSink,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("channel", &self.channel)
            .field("greeted", &self.greeted)
            .field("turn", &self.turn)
            .field("transcript", &self.transcript.len())
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    #[must_use]
    pub(crate) fn new(
        channel: ControlChannel,
        session: SessionUpdateConfig,
        greeting: Option<String>,
        invoker: Arc<dyn ToolInvoker>,
        events: EventSink,
    ) -> Self {
        Self {
            channel,
            session,
            greeting,
            greeted: false,
            turn: Turn::Idle,
            transcript: Transcript::default(),
            invoker,
            events,
        }
    }

    #[must_use]
    pub const fn turn(&self) -> Turn {
        self.turn
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub const fn greeted(&self) -> bool {
        self.greeted
    }

    /// Allow the next channel open to greet again.
    pub fn reset_greeting(&mut self) {
        self.greeted = false;
    }

    /// Pump peer events until the stream ends, the control channel is lost,
    /// or the session closes.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PeerEvent>, mut closed: watch::Receiver<bool>) -> Self {
        let closed = async move {
            let _ = closed.wait_for(|c| *c).await;
        };
        tokio::pin!(closed);
        loop {
            tokio::select! {
                biased;
                () = &mut closed => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_peer_event(event);
                        if self.channel.state() == ChannelState::Closed {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        tracing::debug!(turn = ?self.turn, entries = self.transcript.len(), "Event dispatcher stopped");
        self
    }

    pub fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::ChannelOpen => self.on_channel_open(),
            PeerEvent::ChannelMessage(text) => self.handle_message(&text),
            PeerEvent::ChannelClosed => self.on_channel_closed(),
            PeerEvent::RemoteAudioTrack { id } => {
                tracing::info!(track = %id, "Remote audio track available");
                emit(&self.events, SessionEvent::RemoteAudio { track_id: id });
            }
        }
    }

    /// Configure the session, then greet once.
    pub fn on_channel_open(&mut self) {
        if !self.channel.mark_open() {
            tracing::debug!("Ignoring open for a released channel");
            return;
        }
        tracing::info!("Control channel open");
        emit(&self.events, SessionEvent::Status("Connected".to_string()));

        if let Err(err) = self.channel.send(&ClientEvent::session_update(self.session.clone())) {
            self.report(&err);
        }
        if self.greeted {
            return;
        }
        if let Some(greeting) = &self.greeting {
            let event = ClientEvent::respond_with(ResponseConfig::with_instructions(greeting.clone()));
            match self.channel.send(&event) {
                Ok(()) => self.greeted = true,
                Err(err) => self.report(&err),
            }
        }
    }

    pub fn on_channel_closed(&mut self) {
        if self.channel.mark_closed() {
            self.report(&Error::Channel("control channel closed unexpectedly".to_string()));
        }
    }

    /// Parse and route one inbound frame. Frames outside the open window and
    /// malformed JSON are dropped.
    pub fn handle_message(&mut self, text: &str) {
        if !self.channel.is_open() {
            tracing::debug!(state = self.channel.state().as_str(), "Dropping frame, channel not open");
            return;
        }
        tracing::trace!("Received event: {}", crate::safe_truncate(text, crate::TRACE_LOG_MAX_BYTES));
        match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => self.handle_event(event),
            Err(err) => tracing::warn!(error = %err, "Dropping malformed frame"),
        }
    }

    pub fn handle_event(&mut self, event: ServerEvent) {
        tracing::debug!(kind = event.kind().unwrap_or("<untyped>"), "Routing event");
        match event {
            ServerEvent::InputAudioBufferSpeechStarted { .. } => self.set_turn(Turn::UserSpeaking),
            ServerEvent::InputAudioBufferSpeechStopped { .. } => self.set_turn(Turn::IdlePending),
            ServerEvent::InputAudioBufferCommitted { .. } => self.set_turn(Turn::Processing),
            ServerEvent::InputAudioTranscription { item_id, transcript, .. } => {
                let entry = self.transcript.set_partial(item_id, transcript);
                emit(&self.events, user_transcript(entry));
            }
            ServerEvent::InputAudioTranscriptionDelta { item_id, delta, .. } => {
                let entry = self.transcript.extend_partial(item_id, &delta);
                emit(&self.events, user_transcript(entry));
            }
            ServerEvent::InputAudioTranscriptionCompleted { item_id, transcript, .. } => {
                let entry = self.transcript.finalize(item_id, transcript);
                emit(&self.events, user_transcript(entry));
            }
            ServerEvent::InputAudioTranscriptionFailed { item_id, error, .. } => {
                let dropped = self.transcript.drop_partial(item_id.as_deref());
                tracing::warn!(
                    item_id = item_id.as_deref().unwrap_or_default(),
                    dropped,
                    error = error.as_ref().map_or("", |e| e.message.as_str()),
                    "Input transcription failed"
                );
            }
            ServerEvent::ResponseCreated { .. } => self.set_turn(Turn::AssistantResponding),
            ServerEvent::ResponseAudioTranscriptDone { item_id, transcript, .. } => {
                self.transcript.push_assistant(item_id.clone(), transcript.clone());
                emit(&self.events, SessionEvent::AssistantTranscript { item_id, text: transcript });
            }
            ServerEvent::ResponseDone { response, .. } => {
                self.on_response_done(response);
                self.set_turn(Turn::Idle);
            }
            ServerEvent::Error { error, .. } => self.report(&Error::Api(error)),
            ServerEvent::SessionCreated { session, .. } | ServerEvent::SessionUpdated { session, .. } => {
                tracing::debug!(session_id = %session.id, "Session acknowledged");
            }
            ServerEvent::Unknown(_) => {}
        }
    }

    fn on_response_done(&mut self, response: Response) {
        for item in response.output {
            match item {
                Item::Message { id, content, .. } => {
                    let text = message_text(&content);
                    self.transcript.push_assistant(id.clone(), text.clone());
                    emit(&self.events, SessionEvent::AssistantText { item_id: id, text });
                }
                Item::FunctionCall { name, call_id, arguments, .. } => match decode_arguments(&arguments) {
                    Ok(arguments) => {
                        tracing::info!(tool = %name, %call_id, "Model requested tool call");
                        emit(
                            &self.events,
                            SessionEvent::ToolCall {
                                name: name.clone(),
                                call_id: call_id.clone(),
                            },
                        );
                        self.invoker.invoke(ToolCall { name, call_id, arguments }, self.channel.clone());
                    }
                    Err(err) => self.report(&Error::Tool(format!("{name}: malformed arguments: {err}"))),
                },
                other => tracing::debug!(item = %other, "Ignoring response output item"),
            }
        }
    }

    fn set_turn(&mut self, turn: Turn) {
        if self.turn != turn {
            tracing::debug!(from = ?self.turn, to = ?turn, "Turn changed");
            self.turn = turn;
            emit(&self.events, SessionEvent::TurnChanged(turn));
        }
    }

    fn report(&self, err: &Error) {
        tracing::warn!(kind = err.kind(), error = %err, "Session error");
        emit(&self.events, SessionEvent::error(err));
    }
}

fn user_transcript(entry: &TranscriptEntry) -> SessionEvent {
    SessionEvent::UserTranscript {
        item_id: entry.item_id.clone(),
        text: entry.text.clone(),
        is_final: entry.is_final,
    }
}
