use crate::protocol::client_events::ClientEvent;
use crate::transport::peer::DataChannel;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

impl ChannelState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// The `oai-events` data channel behind an explicit open gate.
///
/// Media negotiation finishing says nothing about the channel; only the
/// channel-open notification flips the gate. Clones share the gate.
#[derive(Clone)]
pub struct ControlChannel {
    inner: Arc<dyn DataChannel>,
    state: Arc<Mutex<ChannelState>>,
    released: Arc<AtomicBool>,
}

impl std::fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannel")
            .field("label", &self.inner.label())
            .field("state", &self.state())
            .finish()
    }
}

impl ControlChannel {
    #[must_use]
    pub fn new(inner: Arc<dyn DataChannel>) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(ChannelState::Connecting)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Returns `false` once the channel has been released locally.
    pub(crate) fn mark_open(&self) -> bool {
        if self.released.load(Ordering::Acquire) {
            return false;
        }
        *self.state.lock() = ChannelState::Open;
        true
    }

    /// Returns `true` if the gate was not already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        let mut state = self.state.lock();
        let was_closed = *state == ChannelState::Closed;
        *state = ChannelState::Closed;
        !was_closed
    }

    /// Send one event.
    ///
    /// # Errors
    /// Returns `Error::Channel` unless the channel is open, an error if the event
    /// fails validation, or the write error from the data channel.
    #[allow(clippy::result_large_err)]
    pub fn send(&self, event: &ClientEvent) -> Result<()> {
        let state = self.state();
        if state != ChannelState::Open {
            return Err(Error::Channel(format!(
                "cannot send {} while channel is {}",
                event.kind(),
                state.as_str()
            )));
        }
        crate::validate_client_event(event)?;
        let json = serde_json::to_string(event)?;
        tracing::trace!("Sending event: {}", crate::safe_truncate(&json, crate::TRACE_LOG_MAX_BYTES));
        self.inner.send_text(&json)
    }

    /// Send only if the channel is open. `Ok(false)` means the event was discarded.
    ///
    /// # Errors
    /// Same as [`ControlChannel::send`] once the channel is open.
    #[allow(clippy::result_large_err)]
    pub fn send_if_open(&self, event: &ClientEvent) -> Result<bool> {
        if !self.is_open() {
            tracing::debug!(event = event.kind(), "Channel not open, discarding event");
            return Ok(false);
        }
        self.send(event).map(|()| true)
    }

    /// Close the gate and release the underlying data channel. Idempotent.
    pub fn close(&self) {
        self.mark_closed();
        if !self.released.swap(true, Ordering::AcqRel) {
            self.inner.close();
        }
    }
}
