//! Interfaces for the media stack the session drives.
//!
//! Capture devices, the peer connection and its data channel are supplied by
//! the host (a browser binding, `str0m`, a test fake). The negotiator only
//! needs the operations below. Implementations take `&self` and use interior
//! mutability, so a close issued from another task never waits on an
//! in-flight negotiation step.

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Label of the data channel carrying JSON control events.
pub const CONTROL_CHANNEL_LABEL: &str = "oai-events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// One side's opaque negotiation blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpKind::Offer, sdp: sdp.into() }
    }

    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: SdpKind::Answer, sdp: sdp.into() }
    }
}

/// Asynchronous notifications raised by a peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Remote audio became available; may arrive before or after the answer is applied.
    RemoteAudioTrack { id: String },
    ChannelOpen,
    ChannelMessage(String),
    ChannelClosed,
}

/// A live local capture (microphone) track.
pub trait AudioSource: Send + Sync {
    fn id(&self) -> &str;
    /// Stop capturing and release the device.
    fn stop(&self);
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request microphone capture.
    ///
    /// # Errors
    /// Returns `Error::MediaAccess` if access is denied or no device exists.
    async fn acquire_audio(&self) -> Result<Arc<dyn AudioSource>>;
}

pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    /// Write one text frame.
    ///
    /// # Errors
    /// Returns `Error::Channel` if the underlying channel rejects the write.
    fn send_text(&self, text: &str) -> Result<()>;

    fn close(&self);
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// # Errors
    /// Returns an error if the track cannot be attached.
    fn add_audio_track(&self, track: &Arc<dyn AudioSource>) -> Result<()>;

    /// # Errors
    /// Returns an error if the channel cannot be created.
    fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>>;

    /// Generate an offer for bidirectional audio plus the data channels created so far.
    ///
    /// # Errors
    /// Returns `Error::Negotiation` if the offer cannot be produced.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// # Errors
    /// Returns `Error::Negotiation` if the description is rejected.
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    /// # Errors
    /// Returns `Error::Negotiation` if the description is rejected.
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    /// Take the event receiver. Returns `None` once taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PeerEvent>>;

    /// Tear down the transport. Stops sending on all tracks.
    fn close(&self);
}

/// Creates a fresh peer connection per negotiation attempt.
pub trait PeerConnector: Send + Sync {
    /// # Errors
    /// Returns an error if the transport cannot be constructed.
    fn create(&self) -> Result<Arc<dyn PeerConnection>>;
}
