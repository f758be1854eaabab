// src/io/mod.rs
//
// Serial IO layer: channel identity shared by every component, plus the
// serial driver, line assembly and turnaround modules under `serial`.

pub mod serial;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RoutingError;

// ============================================================================
// Channel Identity
// ============================================================================

/// Logical channel index. The bridge manages at most two channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChannelId {
    One,
    Two,
}

impl ChannelId {
    /// Both channels, in index order.
    pub const ALL: [ChannelId; 2] = [ChannelId::One, ChannelId::Two];

    /// Zero-based slot index.
    pub fn index(self) -> usize {
        match self {
            ChannelId::One => 0,
            ChannelId::Two => 1,
        }
    }

    /// One-based number as shown to users.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    /// The other channel of the pair.
    pub fn other(self) -> ChannelId {
        match self {
            ChannelId::One => ChannelId::Two,
            ChannelId::Two => ChannelId::One,
        }
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = RoutingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ChannelId::One),
            2 => Ok(ChannelId::Two),
            other => Err(RoutingError::OutOfRange(other)),
        }
    }
}

impl From<ChannelId> for u8 {
    fn from(channel: ChannelId) -> u8 {
        channel.number()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {}", self.number())
    }
}

/// Open/closed snapshot of both channels, indexed by `ChannelId::index`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenStates(pub [bool; 2]);

impl OpenStates {
    pub fn is_open(&self, channel: ChannelId) -> bool {
        self.0[channel.index()]
    }

    pub fn open_count(&self) -> usize {
        self.0.iter().filter(|open| **open).count()
    }

    /// The only open channel, if exactly one is open.
    pub fn single_open(&self) -> Option<ChannelId> {
        match self.0 {
            [true, false] => Some(ChannelId::One),
            [false, true] => Some(ChannelId::Two),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_from_number() {
        assert_eq!(ChannelId::try_from(1).unwrap(), ChannelId::One);
        assert_eq!(ChannelId::try_from(2).unwrap(), ChannelId::Two);
        assert_eq!(ChannelId::try_from(0), Err(RoutingError::OutOfRange(0)));
        assert_eq!(ChannelId::try_from(3), Err(RoutingError::OutOfRange(3)));
    }

    #[test]
    fn test_channel_id_serializes_as_number() {
        let json = serde_json::to_string(&ChannelId::Two).unwrap();
        assert_eq!(json, "2");
        let back: ChannelId = serde_json::from_str("1").unwrap();
        assert_eq!(back, ChannelId::One);
        assert!(serde_json::from_str::<ChannelId>("7").is_err());
    }

    #[test]
    fn test_open_states() {
        let states = OpenStates([false, true]);
        assert!(!states.is_open(ChannelId::One));
        assert!(states.is_open(ChannelId::Two));
        assert_eq!(states.open_count(), 1);
        assert_eq!(states.single_open(), Some(ChannelId::Two));
        assert_eq!(OpenStates([true, true]).single_open(), None);
        assert_eq!(OpenStates::default().open_count(), 0);
    }
}
