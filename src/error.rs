// src/error.rs
//
// Error types for the serial bridge.
// Each failure class the bridge can surface has its own enum so callers can
// match on what went wrong; `BridgeError` wraps them for the service layer.

use thiserror::Error;

use crate::io::ChannelId;

/// Opening or configuring a channel failed. The attempt leaves no partial state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("Failed to open {name}: device not found ({reason})")]
    NoDevice { name: String, reason: String },

    #[error("Failed to open {name}: permission denied ({reason})")]
    PermissionDenied { name: String, reason: String },

    #[error("Failed to open {name}: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("{name} is already open on {other}; one device cannot serve two channels")]
    Conflict { name: String, other: ChannelId },

    #[error("Invalid baud rate {baud} for {name}")]
    InvalidBaud { name: String, baud: u32 },
}

impl OpenError {
    /// OS port name the failed attempt was for.
    pub fn port_name(&self) -> &str {
        match self {
            OpenError::NoDevice { name, .. }
            | OpenError::PermissionDenied { name, .. }
            | OpenError::Unavailable { name, .. }
            | OpenError::Conflict { name, .. }
            | OpenError::InvalidBaud { name, .. } => name,
        }
    }
}

/// Writing an outgoing line failed. Any turnaround pause is already unwound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("No transmit target: set a TX target or open exactly one channel")]
    NoTarget,

    #[error("Port is not open on {0}")]
    NotOpen(ChannelId),

    #[error("Write failed on {channel}: {reason}")]
    Rejected { channel: ChannelId, reason: String },

    #[error("Write timeout on {channel} (no bytes flushed after {waited_ms} ms)")]
    FlushTimeout { channel: ChannelId, waited_ms: u64 },
}

/// Send requests fail with the same kinds as raw writes.
pub type SendError = WriteError;

/// A routing request named a channel that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("Channel {0} is out of range (expected 1 or 2)")]
    OutOfRange(u8),

    #[error("Cannot route to {0}: port is not open")]
    NotOpen(ChannelId),
}

/// Asynchronous device fault reported by the driver while reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Driver error on {channel}: {message}")]
pub struct DriverError {
    pub channel: ChannelId,
    pub message: String,
}

impl DriverError {
    /// Classify a read error. Routine polling artifacts (timeouts, interrupts,
    /// would-block) return `None` and are never surfaced.
    pub fn classify(channel: ChannelId, err: &std::io::Error) -> Option<Self> {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => None,
            _ => Some(DriverError {
                channel,
                message: err.to_string(),
            }),
        }
    }
}

/// Loading the bridge configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for the threaded service and its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Failed to enumerate ports: {0}")]
    Discovery(String),

    #[error("Invalid send rate {0} Hz (must be > 0)")]
    InvalidRate(u32),

    #[error("Bridge command queue is full")]
    Busy,

    #[error("Bridge service is not running")]
    ServiceStopped,
}
