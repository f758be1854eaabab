// src/lib.rs
//
// Dual-channel serial bridge for line-delimited telemetry over half-duplex
// radio modems.

#[macro_use]
pub mod logging;

pub mod bridge;
pub mod config;
pub mod consumers;
pub mod error;
pub mod events;
pub mod io;
pub mod routing;
pub mod service;

pub use bridge::{normalize_outgoing, BridgeOptions, SendTarget, SerialBridge};
pub use config::{default_config_path, load_config, BridgeConfig};
pub use error::{BridgeError, ConfigError, DriverError, OpenError, RoutingError, SendError, WriteError};
pub use events::{BridgeEvent, EventReceiver};
pub use io::serial::{NativeDriver, PortDescriptor, PortDriver, PortKind, SerialLink};
pub use io::{ChannelId, OpenStates};
pub use routing::RoutingTable;
pub use service::{BridgeHandle, BridgeService, BridgeStatus, ChannelStatus};
