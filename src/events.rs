// src/events.rs
//
// Change notifications pushed from the bridge to its observers.
// Delivery is push-only: an event goes to every observer subscribed at the
// moment it is emitted and is never replayed.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::io::ChannelId;

/// Notification emitted by the bridge.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The discovered port list changed.
    PortsChanged { ports: Vec<String> },
    Connected { channel: ChannelId },
    Disconnected { channel: ChannelId },
    /// The cached OS port name changed; `None` once closed.
    PortNameChanged {
        channel: ChannelId,
        name: Option<String>,
    },
    BaudChanged { channel: ChannelId, baud: u32 },
    /// One complete, decoded line.
    LineReceived { channel: ChannelId, text: String },
    /// The active probe did not complete; the channel stays open.
    NotRadioModem { channel: ChannelId },
    TxTargetChanged { channel: Option<ChannelId> },
    RxSourceChanged { channel: Option<ChannelId> },
    /// Human-readable error detail, tagged with the channel when known.
    Error {
        channel: Option<ChannelId>,
        message: String,
    },
}

/// Receiving end handed to each observer.
pub type EventReceiver = mpsc::UnboundedReceiver<BridgeEvent>;

/// Current observer set. Dropped receivers are pruned on the next emit.
#[derive(Default)]
pub struct Observers {
    senders: Vec<mpsc::UnboundedSender<BridgeEvent>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, event: BridgeEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}
