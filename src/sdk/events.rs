use super::negotiator::SessionPhase;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Events buffered for a listener before new ones are dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Projection of who holds the floor, derived from the latest relevant events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Turn {
    #[default]
    Idle,
    UserSpeaking,
    /// Speech stopped; waiting for the buffer to be committed.
    IdlePending,
    Processing,
    AssistantResponding,
}

/// Notifications for whatever renders the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PhaseChanged(SessionPhase),
    /// Human-readable status line.
    Status(String),
    TurnChanged(Turn),
    UserTranscript {
        item_id: Option<String>,
        text: String,
        is_final: bool,
    },
    AssistantTranscript {
        item_id: Option<String>,
        text: String,
    },
    AssistantText {
        item_id: Option<String>,
        text: String,
    },
    RemoteAudio {
        track_id: String,
    },
    ToolCall {
        name: String,
        call_id: String,
    },
    Error {
        kind: &'static str,
        message: String,
    },
}

impl SessionEvent {
    pub(crate) fn error(err: &crate::Error) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub(crate) type EventSink = mpsc::Sender<SessionEvent>;

pub(crate) fn event_channel() -> (EventSink, mpsc::Receiver<SessionEvent>) {
    mpsc::channel(EVENT_QUEUE_CAPACITY)
}

pub(crate) fn emit(sink: &EventSink, event: SessionEvent) {
    match sink.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Session event dropped: listener is not keeping up");
        }
        Err(TrySendError::Closed(_)) => tracing::trace!("Session event dropped: no listener"),
    }
}

/// Stream of [`SessionEvent`]s shared by every session a client opens.
pub struct EventStream {
    rx: mpsc::Receiver<SessionEvent>,
}

impl EventStream {
    #[must_use]
    pub const fn new(rx: mpsc::Receiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Await the next event; `None` once the client is dropped.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = SessionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.rx.poll_recv(cx)
    }
}
