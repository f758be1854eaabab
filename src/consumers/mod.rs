// src/consumers/mod.rs
//
// Line consumers built on top of the bridge's event stream and send path.

pub mod alarm;
pub mod select;
pub mod sender;
pub mod telemetry;

pub use alarm::{AlarmClassifier, AlarmLevel};
pub use select::should_listen;
pub use sender::{LineSink, PeriodicSender, SenderEvent, DEFAULT_RATE_HZ};
pub use telemetry::{TelemetryParser, TelemetrySample, WarnThrottle};
