#![allow(dead_code)]

use async_trait::async_trait;
use oai_rtc::{
    AudioSource, DataChannel, Error, MediaDevices, PeerConnection, PeerConnector, PeerEvent, Result,
    SessionDescription,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct Mic {
    pub stops: AtomicUsize,
}

impl AudioSource for Mic {
    fn id(&self) -> &str {
        "mic"
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct Devices {
    pub deny: AtomicBool,
    pub requests: AtomicUsize,
    pub mics: Mutex<Vec<Arc<Mic>>>,
}

impl Devices {
    pub fn denying() -> Arc<Self> {
        let devices = Self::default();
        devices.deny.store(true, Ordering::SeqCst);
        Arc::new(devices)
    }
}

#[async_trait]
impl MediaDevices for Devices {
    async fn acquire_audio(&self) -> Result<Arc<dyn AudioSource>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(Error::MediaAccess("NotAllowedError: Permission denied".to_string()));
        }
        let mic = Arc::new(Mic { stops: AtomicUsize::new(0) });
        self.mics.lock().unwrap().push(Arc::clone(&mic));
        Ok(mic)
    }
}

pub struct Channel {
    label: String,
    pub frames: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
}

impl Channel {
    pub fn json(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub fn types(&self) -> Vec<String> {
        self.json().iter().map(|v| v["type"].as_str().unwrap().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl DataChannel for Channel {
    fn label(&self) -> &str {
        &self.label
    }

    fn send_text(&self, text: &str) -> Result<()> {
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Peer {
    pub tracks: AtomicUsize,
    pub closes: AtomicUsize,
    pub remote: Mutex<Option<SessionDescription>>,
    channel: Mutex<Option<Arc<Channel>>>,
    tx: mpsc::UnboundedSender<PeerEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
}

impl Peer {
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.lock().unwrap().clone().unwrap()
    }

    pub fn push(&self, event: PeerEvent) {
        self.tx.send(event).unwrap();
    }

    pub fn message(&self, value: &Value) {
        self.push(PeerEvent::ChannelMessage(value.to_string()));
    }
}

#[async_trait]
impl PeerConnection for Peer {
    fn add_audio_track(&self, _track: &Arc<dyn AudioSource>) -> Result<()> {
        self.tracks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        let channel = Arc::new(Channel {
            label: label.to_string(),
            frames: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        });
        *self.channel.lock().unwrap() = Some(Arc::clone(&channel));
        Ok(channel)
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::offer("v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n"))
    }

    async fn set_local_description(&self, _description: SessionDescription) -> Result<()> {
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        *self.remote.lock().unwrap() = Some(description);
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<PeerEvent>> {
        self.rx.lock().unwrap().take()
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct Peers {
    pub created: Mutex<Vec<Arc<Peer>>>,
}

impl Peers {
    pub fn last(&self) -> Arc<Peer> {
        Arc::clone(self.created.lock().unwrap().last().unwrap())
    }

    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl PeerConnector for Peers {
    fn create(&self) -> Result<Arc<dyn PeerConnection>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(Peer {
            tracks: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            remote: Mutex::new(None),
            channel: Mutex::new(None),
            tx,
            rx: Mutex::new(Some(rx)),
        });
        self.created.lock().unwrap().push(Arc::clone(&peer));
        Ok(peer)
    }
}

/// Wait until `done` holds, giving spawned tasks and HTTP mocks time to run.
pub async fn settle(mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !done() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
