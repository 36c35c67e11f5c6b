// ── Named event channels ──
//
// Both backends surface asynchronous events on string-named channels. The
// hub keeps one broadcast sender per channel; a `Listener` is a detachable
// subscription that stops receiving as soon as it is dropped.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

/// Default per-channel buffer before slow listeners start lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Every channel a backend may emit on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum Channel {
    ReadersDiscovered,
    RequestConnectionToken,
    DidReportUnexpectedReaderDisconnect,
    DidChangeConnectionStatus,
    DidChangePaymentStatus,
    DidRequestReaderInput,
    DidRequestReaderDisplayMessage,
    DidReportAvailableUpdate,
    DidStartInstallingUpdate,
    DidReportReaderSoftwareUpdateProgress,
    DidFinishInstallingUpdate,
    DidStartReaderReconnect,
    DidSucceedReaderReconnect,
    DidFailReaderReconnect,
}

/// Fan-out point for a single backend's events.
#[derive(Debug)]
pub struct EventHub {
    senders: DashMap<Channel, broadcast::Sender<Value>>,
    capacity: usize,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            senders: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Emit `payload` on `channel`. Returns how many listeners saw it.
    pub fn notify(&self, channel: Channel, payload: Value) -> usize {
        match self.senders.get(&channel) {
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        }
    }

    /// Attach a new listener. Events emitted before this call are not replayed.
    pub fn listen(&self, channel: Channel) -> Listener {
        let rx = self
            .senders
            .entry(channel)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        Listener { channel, rx }
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        self.senders
            .get(&channel)
            .map_or(0, |tx| tx.receiver_count())
    }
}

/// A detachable subscription to one channel of one backend.
#[derive(Debug)]
pub struct Listener {
    channel: Channel,
    rx: broadcast::Receiver<Value>,
}

impl Listener {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Wait for the next event. `None` once the emitting backend is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "listener lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Value> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "listener lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
