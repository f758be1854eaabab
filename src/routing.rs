// src/routing.rs
//
// TX target / RX source assignment for the two channels.
//
// Rules:
// 1. An assignment may only name an open channel
// 2. Assigning the current value is a silent no-op
// 3. With no RX source every open channel is listened to; with one, only it
// 4. Closing a channel clears every slot that referenced it

use crate::error::RoutingError;
use crate::io::{ChannelId, OpenStates};

/// Which channel transmits by default and which one feeds line events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoutingTable {
    tx_target: Option<ChannelId>,
    rx_source: Option<ChannelId>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tx_target(&self) -> Option<ChannelId> {
        self.tx_target
    }

    pub fn rx_source(&self) -> Option<ChannelId> {
        self.rx_source
    }

    /// Point default sends at `channel`. Returns whether the slot changed.
    pub fn set_tx_target(&mut self, channel: ChannelId, open: OpenStates) -> Result<bool, RoutingError> {
        Self::validate(channel, open)?;
        if self.tx_target == Some(channel) {
            return Ok(false);
        }
        self.tx_target = Some(channel);
        Ok(true)
    }

    /// Make `channel` the only line source. Returns whether the slot changed.
    /// The caller detaches the previous source before attaching the new one.
    pub fn set_rx_source(&mut self, channel: ChannelId, open: OpenStates) -> Result<bool, RoutingError> {
        Self::validate(channel, open)?;
        if self.rx_source == Some(channel) {
            return Ok(false);
        }
        self.rx_source = Some(channel);
        Ok(true)
    }

    /// Forget every slot pointing at `channel`. Returns (tx cleared, rx cleared).
    pub fn release(&mut self, channel: ChannelId) -> (bool, bool) {
        let tx = self.tx_target == Some(channel);
        let rx = self.rx_source == Some(channel);
        if tx {
            self.tx_target = None;
        }
        if rx {
            self.rx_source = None;
        }
        (tx, rx)
    }

    /// Whether line extraction should be attached to `channel`.
    pub fn listens_to(&self, channel: ChannelId, open: OpenStates) -> bool {
        if !open.is_open(channel) {
            return false;
        }
        match self.rx_source {
            Some(source) => source == channel,
            None => true,
        }
    }

    /// Channel a send without an explicit target goes to: the TX target, or
    /// the single open channel when no target is set.
    pub fn resolve_tx(&self, open: OpenStates) -> Option<ChannelId> {
        match self.tx_target {
            Some(target) => Some(target),
            None => open.single_open(),
        }
    }

    /// A channel is a shared half-duplex link when it transmits and is also
    /// an active line source.
    pub fn is_shared(&self, tx_channel: ChannelId, open: OpenStates) -> bool {
        self.listens_to(tx_channel, open)
    }

    fn validate(channel: ChannelId, open: OpenStates) -> Result<(), RoutingError> {
        if open.is_open(channel) {
            Ok(())
        } else {
            Err(RoutingError::NotOpen(channel))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
