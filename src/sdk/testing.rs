//! In-memory stand-ins for the media stack and the HTTP collaborators.

use super::negotiator::Collaborators;
use super::transport::{CredentialProvider, OfferExchange};
use crate::transport::peer::{
    AudioSource, DataChannel, MediaDevices, PeerConnection, PeerConnector, PeerEvent, SessionDescription,
};
use crate::transport::rest::Credential;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

#[derive(Default)]
pub struct FakeCredentials {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn fetch_credential(&self, _model: &str, _voice: &str) -> Result<Credential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Auth("relay returned 500".to_string()));
        }
        Ok(Credential::new("ek_test", Some(60)))
    }
}

#[derive(Default)]
pub struct FakeExchange {
    pub reject_with: Mutex<Option<u16>>,
    pub hang: AtomicBool,
    pub offers: Mutex<Vec<String>>,
    /// Runs once, right before the answer is returned.
    pub on_answer: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

#[async_trait]
impl OfferExchange for FakeExchange {
    async fn exchange(
        &self,
        credential: Credential,
        _model: &str,
        offer: &SessionDescription,
    ) -> Result<SessionDescription> {
        assert_eq!(credential.secret(), "ek_test");
        self.offers.lock().push(offer.sdp.clone());
        if self.hang.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if let Some(status) = *self.reject_with.lock() {
            return Err(Error::negotiation(Some(status), "Unauthorized"));
        }
        if let Some(hook) = self.on_answer.lock().take() {
            hook();
        }
        Ok(SessionDescription::answer("v=0 answer"))
    }
}

pub struct FakeSource {
    pub stops: AtomicUsize,
}

impl AudioSource for FakeSource {
    fn id(&self) -> &str {
        "mic-0"
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeDevices {
    pub deny: AtomicBool,
    pub requests: AtomicUsize,
    pub sources: Mutex<Vec<Arc<FakeSource>>>,
}

impl FakeDevices {
    pub fn only(&self) -> Arc<FakeSource> {
        let sources = self.sources.lock();
        assert_eq!(sources.len(), 1, "expected exactly one capture");
        Arc::clone(&sources[0])
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire_audio(&self) -> Result<Arc<dyn AudioSource>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(Error::MediaAccess("Permission denied".to_string()));
        }
        let source = Arc::new(FakeSource { stops: AtomicUsize::new(0) });
        self.sources.lock().push(Arc::clone(&source));
        Ok(source)
    }
}

pub struct FakeChannel {
    label: String,
    pub sent: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
}

impl FakeChannel {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            sent: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }

    /// The `type` field of every frame written so far.
    pub fn sent_types(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|frame| {
                let value: Value = serde_json::from_str(frame).unwrap();
                value["type"].as_str().unwrap().to_string()
            })
            .collect()
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.sent.lock().iter().map(|frame| serde_json::from_str(frame).unwrap()).collect()
    }
}

impl DataChannel for FakeChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn send_text(&self, text: &str) -> Result<()> {
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakePeer {
    pub tracks: AtomicUsize,
    pub offers: AtomicUsize,
    pub closes: AtomicUsize,
    pub local: Mutex<Option<SessionDescription>>,
    pub remote: Mutex<Option<SessionDescription>>,
    channel: Mutex<Option<Arc<FakeChannel>>>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
}

impl FakePeer {
    fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            tracks: AtomicUsize::new(0),
            offers: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            channel: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn channel(&self) -> Arc<FakeChannel> {
        self.channel.lock().clone().unwrap()
    }

    pub fn push(&self, event: PeerEvent) {
        self.events_tx.send(event).unwrap();
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn add_audio_track(&self, _track: &Arc<dyn AudioSource>) -> Result<()> {
        self.tracks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        let channel = FakeChannel::new(label);
        *self.channel.lock() = Some(Arc::clone(&channel));
        Ok(channel)
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.offers.fetch_add(1, Ordering::SeqCst);
        Ok(SessionDescription::offer("v=0 offer"))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        *self.local.lock() = Some(description);
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        *self.remote.lock() = Some(description);
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PeerEvent>> {
        self.events_rx.lock().take()
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakePeers {
    pub created: Mutex<Vec<Arc<FakePeer>>>,
}

impl FakePeers {
    pub fn only(&self) -> Arc<FakePeer> {
        let created = self.created.lock();
        assert_eq!(created.len(), 1, "expected exactly one peer connection");
        Arc::clone(&created[0])
    }

    pub fn last(&self) -> Arc<FakePeer> {
        Arc::clone(self.created.lock().last().unwrap())
    }
}

impl PeerConnector for FakePeers {
    fn create(&self) -> Result<Arc<dyn PeerConnection>> {
        let peer = Arc::new(FakePeer::new());
        self.created.lock().push(Arc::clone(&peer));
        Ok(peer)
    }
}

#[derive(Default)]
pub struct Fixture {
    pub credentials: Arc<FakeCredentials>,
    pub exchange: Arc<FakeExchange>,
    pub devices: Arc<FakeDevices>,
    pub peers: Arc<FakePeers>,
}

pub fn collaborators(fixture: &Fixture) -> Collaborators {
    Collaborators {
        credentials: fixture.credentials.clone(),
        signaling: fixture.exchange.clone(),
        devices: fixture.devices.clone(),
        peers: fixture.peers.clone(),
    }
}

/// An open control channel over a fake data channel.
pub fn open_channel() -> (super::channel::ControlChannel, Arc<FakeChannel>) {
    let fake = FakeChannel::new(crate::transport::peer::CONTROL_CHANNEL_LABEL);
    let channel = super::channel::ControlChannel::new(fake.clone());
    assert!(channel.mark_open());
    (channel, fake)
}
