use super::builder::SessionSettings;
use super::channel::{ChannelState, ControlChannel};
use super::dispatcher::{EventDispatcher, Transcript};
use super::events::{EventSink, EventStream, SessionEvent, emit, event_channel};
use super::negotiator::{Collaborators, Negotiator, SessionPhase};
use super::tools::{RegistryInvoker, ToolInvoker};
use crate::protocol::client_events::ClientEvent;
use crate::protocol::models::Item;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Entry point: owns the configuration and at most one live session.
///
/// Every session the client opens reports on the same [`EventStream`].
pub struct RealtimeClient {
    settings: Arc<SessionSettings>,
    collaborators: Collaborators,
    events_tx: EventSink,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    current: Mutex<Option<Arc<Negotiator>>>,
    connecting: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("settings", &self.settings)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl RealtimeClient {
    pub(crate) fn new(settings: SessionSettings, collaborators: Collaborators) -> Self {
        let (events_tx, events_rx) = event_channel();
        Self {
            settings: Arc::new(settings),
            collaborators,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            current: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Take the event stream. Returns `None` after the first call.
    pub fn events(&self) -> Option<EventStream> {
        self.events_rx.lock().take().map(EventStream::new)
    }

    /// Phase of the most recent session, `Idle` if none was started.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.current.lock().as_ref().map_or(SessionPhase::Idle, |n| n.phase())
    }

    /// Tear down any previous session, then negotiate a fresh one and start
    /// routing its events.
    ///
    /// # Errors
    /// Returns the negotiation failure (also reported on the event stream), or
    /// `Error::Closed` if [`RealtimeClient::close`] ran before it finished.
    pub async fn connect(&self) -> Result<SessionHandle> {
        let _connecting = self.connecting.lock().await;
        self.close();

        emit(&self.events_tx, SessionEvent::Status("Connecting".to_string()));
        let negotiator = Arc::new(Negotiator::new(
            self.settings.model(),
            self.settings.voice(),
            self.collaborators.clone(),
            self.events_tx.clone(),
        ));
        *self.current.lock() = Some(Arc::clone(&negotiator));

        let connection = match negotiator.negotiate().await {
            Ok(connection) => connection,
            Err(err) => {
                let status = if matches!(err, Error::Closed) { "Disconnected" } else { "Connection failed" };
                emit(&self.events_tx, SessionEvent::Status(status.to_string()));
                return Err(err);
            }
        };

        let invoker: Arc<dyn ToolInvoker> =
            Arc::new(RegistryInvoker::new(Arc::clone(self.settings.tools()), self.events_tx.clone()));
        let dispatcher = EventDispatcher::new(
            connection.channel.clone(),
            self.settings.session_update().clone(),
            self.settings.greeting().map(str::to_string),
            invoker,
            self.events_tx.clone(),
        );
        let closed = negotiator.closed_signal();
        let owner = Arc::clone(&negotiator);
        let task = tokio::spawn(async move {
            let dispatcher = dispatcher.run(connection.events, closed).await;
            owner.close();
            dispatcher
        });

        Ok(SessionHandle {
            negotiator,
            channel: connection.channel,
            credential_expires_at: connection.credential_expires_at,
            task,
            events: self.events_tx.clone(),
        })
    }

    /// Close the current session, if any. Never waits.
    pub fn close(&self) {
        let previous = self.current.lock().take();
        if let Some(negotiator) = previous {
            negotiator.close();
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// A connected session.
pub struct SessionHandle {
    negotiator: Arc<Negotiator>,
    channel: ControlChannel,
    credential_expires_at: Option<u64>,
    task: JoinHandle<EventDispatcher>,
    events: EventSink,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("phase", &self.phase())
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.negotiator.phase()
    }

    #[must_use]
    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// `true` once the control channel has opened and until it closes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    #[must_use]
    pub const fn credential_expires_at(&self) -> Option<u64> {
        self.credential_expires_at
    }

    /// Send a raw client event through the open channel.
    ///
    /// # Errors
    /// Returns `Error::Channel` unless the channel is open, or a validation error.
    #[allow(clippy::result_large_err)]
    pub fn send(&self, event: &ClientEvent) -> Result<()> {
        self.channel.send(event)
    }

    /// Post a typed user message and ask for a response.
    ///
    /// # Errors
    /// Returns `Error::Channel` unless the channel is open.
    #[allow(clippy::result_large_err)]
    pub fn say(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.send(&ClientEvent::item_create(Item::user_text(text.clone())))?;
        self.send(&ClientEvent::respond())?;
        emit(
            &self.events,
            SessionEvent::UserTranscript {
                item_id: None,
                text,
                is_final: true,
            },
        );
        Ok(())
    }

    /// Interrupt the in-progress response.
    ///
    /// # Errors
    /// Returns `Error::Channel` unless the channel is open.
    #[allow(clippy::result_large_err)]
    pub fn cancel_response(&self) -> Result<()> {
        self.send(&ClientEvent::ResponseCancel { event_id: None })
    }

    /// Close the session. Idempotent and non-blocking.
    pub fn close(&self) {
        self.negotiator.close();
    }

    /// Close the session and wait for the dispatcher to drain, returning the
    /// conversation as it stood.
    ///
    /// # Errors
    /// Returns `Error::Channel` if the dispatcher task panicked.
    pub async fn finish(self) -> Result<Transcript> {
        self.negotiator.close();
        let dispatcher = self
            .task
            .await
            .map_err(|e| Error::Channel(format!("event dispatcher failed: {e}")))?;
        Ok(dispatcher.transcript().clone())
    }
}
