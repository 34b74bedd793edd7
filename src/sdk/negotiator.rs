//! Session negotiation: credential, capture, offer, answer.
//!
//! The session is a single [`SessionState`] value guarded by a mutex. Each
//! transition consumes the current value and returns the next one, so the
//! resources a state owns travel with it. [`Negotiator::close`] swaps in
//! `Closed` from any state and releases whatever the old value held; a step
//! that completes afterwards finds the swap and discards its own result.

use super::channel::ControlChannel;
use super::events::{EventSink, SessionEvent, emit};
use super::transport::{CredentialProvider, OfferExchange};
use crate::transport::peer::{
    AudioSource, CONTROL_CHANNEL_LABEL, MediaDevices, PeerConnection, PeerConnector, PeerEvent,
    SessionDescription,
};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AcquiringMedia,
    Offering,
    AwaitingAnswer,
    Connected,
    Closed,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AcquiringMedia => "acquiring_media",
            Self::Offering => "offering",
            Self::AwaitingAnswer => "awaiting_answer",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned microphone capture. Clones share one release.
#[derive(Clone)]
pub struct CaptureGuard {
    source: Arc<dyn AudioSource>,
    released: Arc<AtomicBool>,
}

impl CaptureGuard {
    fn new(source: Arc<dyn AudioSource>) -> Self {
        Self {
            source,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn AudioSource> {
        &self.source
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            tracing::debug!(track = self.source.id(), "Releasing capture device");
            self.source.stop();
        }
    }
}

/// Owned peer connection plus the control channel created on it.
#[derive(Clone)]
pub struct TransportGuard {
    peer: Arc<dyn PeerConnection>,
    channel: Arc<Mutex<Option<ControlChannel>>>,
    released: Arc<AtomicBool>,
}

impl TransportGuard {
    fn new(peer: Arc<dyn PeerConnection>) -> Self {
        Self {
            peer,
            channel: Arc::new(Mutex::new(None)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn peer(&self) -> &Arc<dyn PeerConnection> {
        &self.peer
    }

    /// Returns `false` (and closes `channel`) if the transport is already gone.
    fn attach_channel(&self, channel: ControlChannel) -> bool {
        let mut slot = self.channel.lock();
        if self.released.load(Ordering::Acquire) {
            channel.close();
            return false;
        }
        *slot = Some(channel);
        true
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(channel) = self.channel.lock().take() {
            channel.close();
        }
        tracing::debug!("Closing peer connection");
        self.peer.close();
    }
}

/// Session state with exactly the resources valid in each phase.
pub enum SessionState {
    Idle,
    AcquiringMedia {
        transport: TransportGuard,
    },
    Offering {
        transport: TransportGuard,
        capture: CaptureGuard,
    },
    AwaitingAnswer {
        transport: TransportGuard,
        capture: CaptureGuard,
        local: SessionDescription,
    },
    Connected {
        transport: TransportGuard,
        capture: CaptureGuard,
        local: SessionDescription,
        remote: SessionDescription,
    },
    Closed,
}

type Step = std::result::Result<SessionState, SessionState>;

impl SessionState {
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        match self {
            Self::Idle => SessionPhase::Idle,
            Self::AcquiringMedia { .. } => SessionPhase::AcquiringMedia,
            Self::Offering { .. } => SessionPhase::Offering,
            Self::AwaitingAnswer { .. } => SessionPhase::AwaitingAnswer,
            Self::Connected { .. } => SessionPhase::Connected,
            Self::Closed => SessionPhase::Closed,
        }
    }

    fn begin(self, transport: TransportGuard) -> Step {
        match self {
            Self::Idle => Ok(Self::AcquiringMedia { transport }),
            other => Err(other),
        }
    }

    fn media_acquired(self, capture: CaptureGuard) -> Step {
        match self {
            Self::AcquiringMedia { transport } => Ok(Self::Offering { transport, capture }),
            other => Err(other),
        }
    }

    fn offer_applied(self, local: SessionDescription) -> Step {
        match self {
            Self::Offering { transport, capture } => Ok(Self::AwaitingAnswer { transport, capture, local }),
            other => Err(other),
        }
    }

    fn answer_applied(self, remote: SessionDescription) -> Step {
        match self {
            Self::AwaitingAnswer { transport, capture, local } => Ok(Self::Connected {
                transport,
                capture,
                local,
                remote,
            }),
            other => Err(other),
        }
    }

    fn release(self) {
        match self {
            Self::Idle | Self::Closed => {}
            Self::AcquiringMedia { transport } => transport.release(),
            Self::Offering { transport, capture }
            | Self::AwaitingAnswer { transport, capture, .. }
            | Self::Connected { transport, capture, .. } => {
                capture.release();
                transport.release();
            }
        }
    }
}

/// External services and host objects a negotiation needs.
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialProvider>,
    pub signaling: Arc<dyn OfferExchange>,
    pub devices: Arc<dyn MediaDevices>,
    pub peers: Arc<dyn PeerConnector>,
}

/// A live session handed to the dispatcher.
pub struct Connection {
    pub channel: ControlChannel,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
    pub local: SessionDescription,
    pub remote: SessionDescription,
    pub credential_expires_at: Option<u64>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("channel", &self.channel)
            .field("credential_expires_at", &self.credential_expires_at)
            .finish_non_exhaustive()
    }
}

/// Drives one negotiation attempt. Not reusable: once closed, build a new one.
pub struct Negotiator {
    model: String,
    voice: String,
    collaborators: Collaborators,
    state: Mutex<SessionState>,
    closed: watch::Sender<bool>,
    events: EventSink,
}

impl Negotiator {
    #[must_use]
    pub(crate) fn new(
        model: impl Into<String>,
        voice: impl Into<String>,
        collaborators: Collaborators,
        events: EventSink,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            model: model.into(),
            voice: voice.into(),
            collaborators,
            state: Mutex::new(SessionState::Idle),
            closed,
            events,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase()
    }

    /// Resolves once [`Negotiator::close`] has run.
    #[must_use]
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Run the negotiation from `Idle` to `Connected`.
    ///
    /// # Errors
    /// Returns the first failure (`Auth`, `MediaAccess`, `Negotiation`, ...)
    /// after releasing every acquired resource, or `Error::Closed` if the
    /// session was closed mid-way. The session ends `Closed` in both cases.
    pub async fn negotiate(&self) -> Result<Connection> {
        let phase = self.phase();
        if phase != SessionPhase::Idle {
            return Err(Error::InvalidState {
                expected: SessionPhase::Idle.as_str(),
                actual: phase.as_str(),
            });
        }
        match self.run().await {
            Ok(connection) => {
                tracing::info!(model = %self.model, "Realtime session connected");
                Ok(connection)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn run(&self) -> Result<Connection> {
        let credential = self
            .until_closed(self.collaborators.credentials.fetch_credential(&self.model, &self.voice))
            .await?;
        let credential_expires_at = credential.expires_at();

        let transport = TransportGuard::new(self.collaborators.peers.create()?);
        self.advance(|s| s.begin(transport.clone()), || transport.release())?;

        let source = self.collaborators.devices.acquire_audio().await?;
        let capture = CaptureGuard::new(source);
        self.advance(|s| s.media_acquired(capture.clone()), || capture.release())?;

        let peer = transport.peer();
        peer.add_audio_track(capture.source())?;
        let channel = ControlChannel::new(peer.create_data_channel(CONTROL_CHANNEL_LABEL)?);
        if !transport.attach_channel(channel.clone()) {
            return Err(Error::Closed);
        }

        let local = peer.create_offer().await?;
        self.ensure_live()?;
        peer.set_local_description(local.clone()).await?;
        self.advance(|s| s.offer_applied(local.clone()), || ())?;

        let remote = self
            .until_closed(self.collaborators.signaling.exchange(credential, &self.model, &local))
            .await?;
        self.ensure_live()?;
        peer.set_remote_description(remote.clone()).await?;
        self.advance(|s| s.answer_applied(remote.clone()), || ())?;

        let events = peer
            .take_events()
            .ok_or_else(|| Error::Channel("peer event stream already taken".to_string()))?;

        Ok(Connection {
            channel,
            events,
            local,
            remote,
            credential_expires_at,
        })
    }

    /// Tear the session down from any state. Idempotent and non-blocking.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), SessionState::Closed);
        self.closed.send_replace(true);
        if previous.phase() == SessionPhase::Closed {
            return;
        }
        let from = previous.phase();
        previous.release();
        tracing::info!(from = %from, "Realtime session closed");
        emit(&self.events, SessionEvent::PhaseChanged(SessionPhase::Closed));
    }

    fn fail(&self, err: Error) -> Error {
        if !matches!(err, Error::Closed) {
            tracing::warn!(kind = err.kind(), error = %err, "Session negotiation failed");
            emit(&self.events, SessionEvent::error(&err));
        }
        self.close();
        err
    }

    fn advance(&self, step: impl FnOnce(SessionState) -> Step, discard: impl FnOnce()) -> Result<()> {
        let phase = {
            let mut guard = self.state.lock();
            let current = std::mem::replace(&mut *guard, SessionState::Closed);
            match step(current) {
                Ok(next) => {
                    let phase = next.phase();
                    *guard = next;
                    phase
                }
                Err(unchanged) => {
                    *guard = unchanged;
                    drop(guard);
                    tracing::debug!("Session closed mid-step, discarding result");
                    discard();
                    return Err(Error::Closed);
                }
            }
        };
        tracing::info!(phase = %phase, "Session phase changed");
        emit(&self.events, SessionEvent::PhaseChanged(phase));
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.phase() == SessionPhase::Closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    async fn until_closed<T>(&self, step: impl Future<Output = Result<T>>) -> Result<T> {
        let mut closed = self.closed.subscribe();
        let closed = async move {
            let _ = closed.wait_for(|c| *c).await;
        };
        tokio::select! {
            biased;
            () = closed => Err(Error::Closed),
            out = step => out,
        }
    }
}
