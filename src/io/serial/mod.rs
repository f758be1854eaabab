// src/io/serial/mod.rs
//
// Serial port driver layer for the bridge.
//
// Features:
// - Fixed 8N1 / no flow control port configuration
// - Port discovery with USB descriptor details
// - Line reassembly with CRLF normalisation and lossless decode
// - Half-duplex turnaround windows for shared TX/RX links
// - Passive and active radio-modem detection

pub mod framer;
pub mod heuristic;
pub mod link;
#[cfg(test)]
pub(crate) mod mock;
pub mod ports;
pub mod turnaround;
pub(crate) mod utils;

pub use framer::{decode_line, LineAssembler};
pub use heuristic::{collect_probe_reply, looks_like_radio, probe_radio_at};
pub use link::{NativeDriver, PortDriver, SerialLink};
pub use ports::{PortDescriptor, PortHandle, PortKind};
pub use turnaround::{estimate_tx_duration, TurnaroundLimits, TurnaroundWindow};
