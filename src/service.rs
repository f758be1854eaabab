// src/service.rs
//
// Threaded front end for SerialBridge.
//
// The bridge lives on one blocking worker thread that alternates between
// draining queued commands and polling the channels. Callers talk to it
// through a cloneable BridgeHandle; each request carries its own reply
// channel. The queue is bounded and never blocks: a full queue is reported
// as `BridgeError::Busy`.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::bridge::{SendTarget, SerialBridge};
use crate::consumers::LineSink;
use crate::error::BridgeError;
use crate::events::EventReceiver;
use crate::io::ChannelId;

/// Commands buffered ahead of the worker before callers see `Busy`.
const COMMAND_QUEUE_DEPTH: usize = 32;

// ============================================================================
// Commands
// ============================================================================

type Reply<T> = oneshot::Sender<T>;

/// Request executed on the worker thread.
pub enum BridgeCommand {
    Discover {
        reply: Reply<Result<Vec<String>, BridgeError>>,
    },
    Connect {
        channel: ChannelId,
        name: String,
        baud: u32,
        reply: Reply<Result<(), BridgeError>>,
    },
    Disconnect {
        channel: ChannelId,
        reply: Reply<()>,
    },
    SetTxTarget {
        channel: ChannelId,
        reply: Reply<Result<(), BridgeError>>,
    },
    SetRxSource {
        channel: ChannelId,
        reply: Reply<Result<(), BridgeError>>,
    },
    Send {
        target: SendTarget,
        text: String,
        reply: Reply<Result<(), BridgeError>>,
    },
    Subscribe {
        reply: Reply<EventReceiver>,
    },
    Status {
        reply: Reply<BridgeStatus>,
    },
}

/// Snapshot of one channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelStatus {
    pub channel: ChannelId,
    pub connected: bool,
    pub port_name: Option<String>,
    pub baud: Option<u32>,
    pub listening: bool,
}

/// Snapshot of the whole bridge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BridgeStatus {
    pub channels: Vec<ChannelStatus>,
    pub tx_target: Option<ChannelId>,
    pub rx_source: Option<ChannelId>,
    pub ports: Vec<String>,
}

impl BridgeStatus {
    pub fn of(bridge: &SerialBridge) -> Self {
        BridgeStatus {
            channels: ChannelId::ALL
                .iter()
                .map(|&channel| ChannelStatus {
                    channel,
                    connected: bridge.is_connected(channel),
                    port_name: bridge.port_name(channel).map(String::from),
                    baud: bridge.baud(channel),
                    listening: bridge.is_listening(channel),
                })
                .collect(),
            tx_target: bridge.tx_target(),
            rx_source: bridge.rx_source(),
            ports: bridge.ports().to_vec(),
        }
    }
}

fn execute(bridge: &mut SerialBridge, command: BridgeCommand) {
    // A dropped reply receiver means the caller gave up; nothing to do
    match command {
        BridgeCommand::Discover { reply } => {
            let _ = reply.send(bridge.discover_ports());
        }
        BridgeCommand::Connect {
            channel,
            name,
            baud,
            reply,
        } => {
            let _ = reply.send(bridge.connect(channel, &name, baud).map_err(BridgeError::from));
        }
        BridgeCommand::Disconnect { channel, reply } => {
            bridge.disconnect(channel);
            let _ = reply.send(());
        }
        BridgeCommand::SetTxTarget { channel, reply } => {
            let _ = reply.send(bridge.set_tx_target(channel).map_err(BridgeError::from));
        }
        BridgeCommand::SetRxSource { channel, reply } => {
            let _ = reply.send(bridge.set_rx_source(channel).map_err(BridgeError::from));
        }
        BridgeCommand::Send { target, text, reply } => {
            let _ = reply.send(bridge.send(target, &text).map_err(BridgeError::from));
        }
        BridgeCommand::Subscribe { reply } => {
            let _ = reply.send(bridge.subscribe());
        }
        BridgeCommand::Status { reply } => {
            let _ = reply.send(BridgeStatus::of(bridge));
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Blocking worker loop. Returns when cancelled or when every handle is gone.
fn run_bridge_blocking(
    mut bridge: SerialBridge,
    commands: std_mpsc::Receiver<BridgeCommand>,
    cancel_flag: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    tlog!("[bridge_service] Worker started (poll every {:?})", poll_interval);

    while !cancel_flag.load(Ordering::Relaxed) {
        match commands.recv_timeout(poll_interval) {
            Ok(command) => {
                execute(&mut bridge, command);
                // Drain the rest without waiting
                while let Ok(command) = commands.try_recv() {
                    execute(&mut bridge, command);
                }
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
        bridge.poll();
    }

    bridge.disconnect_all();
    tlog!("[bridge_service] Worker stopped");
}

/// Running bridge worker plus the handle used to reach it.
pub struct BridgeService {
    handle: BridgeHandle,
    task: JoinHandle<()>,
}

impl BridgeService {
    /// Move `bridge` onto a blocking worker. Must be called inside a tokio runtime.
    pub fn spawn(bridge: SerialBridge, poll_interval: Duration) -> Self {
        let (command_tx, command_rx) = std_mpsc::sync_channel::<BridgeCommand>(COMMAND_QUEUE_DEPTH);
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let worker_cancel = cancel_flag.clone();
        let task = tokio::task::spawn_blocking(move || {
            run_bridge_blocking(bridge, command_rx, worker_cancel, poll_interval)
        });

        BridgeService {
            handle: BridgeHandle {
                command_tx,
                cancel_flag,
            },
            task,
        }
    }

    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Stop the worker, closing every channel, and wait for it to exit.
    pub async fn shutdown(self) {
        self.handle.cancel_flag.store(true, Ordering::Relaxed);
        if let Err(e) = self.task.await {
            tlog!("[bridge_service] Worker panicked: {:?}", e);
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable async access to a running bridge worker.
#[derive(Clone)]
pub struct BridgeHandle {
    command_tx: std_mpsc::SyncSender<BridgeCommand>,
    cancel_flag: Arc<AtomicBool>,
}

impl BridgeHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> BridgeCommand) -> Result<T, BridgeError> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            return Err(BridgeError::ServiceStopped);
        }
        let (reply, result_rx) = oneshot::channel();
        self.command_tx.try_send(make(reply)).map_err(|e| match e {
            std_mpsc::TrySendError::Full(_) => BridgeError::Busy,
            std_mpsc::TrySendError::Disconnected(_) => BridgeError::ServiceStopped,
        })?;
        result_rx.await.map_err(|_| BridgeError::ServiceStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.cancel_flag.load(Ordering::Relaxed)
    }

    pub async fn discover_ports(&self) -> Result<Vec<String>, BridgeError> {
        self.request(|reply| BridgeCommand::Discover { reply }).await?
    }

    pub async fn connect(&self, channel: ChannelId, name: &str, baud: u32) -> Result<(), BridgeError> {
        let name = name.to_string();
        self.request(|reply| BridgeCommand::Connect {
            channel,
            name,
            baud,
            reply,
        })
        .await?
    }

    pub async fn disconnect(&self, channel: ChannelId) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCommand::Disconnect { channel, reply }).await
    }

    pub async fn set_tx_target(&self, channel: ChannelId) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCommand::SetTxTarget { channel, reply }).await?
    }

    pub async fn set_rx_source(&self, channel: ChannelId) -> Result<(), BridgeError> {
        self.request(|reply| BridgeCommand::SetRxSource { channel, reply }).await?
    }

    pub async fn send(&self, target: SendTarget, text: &str) -> Result<(), BridgeError> {
        let text = text.to_string();
        self.request(|reply| BridgeCommand::Send { target, text, reply }).await?
    }

    pub async fn subscribe(&self) -> Result<EventReceiver, BridgeError> {
        self.request(|reply| BridgeCommand::Subscribe { reply }).await
    }

    pub async fn status(&self) -> Result<BridgeStatus, BridgeError> {
        self.request(|reply| BridgeCommand::Status { reply }).await
    }
}

#[async_trait]
impl LineSink for BridgeHandle {
    async fn send_line(&self, target: SendTarget, text: &str) -> Result<(), BridgeError> {
        self.send(target, text).await
    }
}

// ============================================================================
// Tests
// ============================================================================
