// src/consumers/select.rs
//
// Which channel a line consumer should follow. Independent of the bridge's
// RX source: with both channels open, consumers settle on channel 1.

use crate::io::{ChannelId, OpenStates};

/// Whether a consumer should act on a line from `which`.
pub fn should_listen(open: OpenStates, which: ChannelId) -> bool {
    match open.open_count() {
        2 => which == ChannelId::One,
        1 => open.is_open(which),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_open_prefers_channel_one() {
        let open = OpenStates([true, true]);
        assert!(should_listen(open, ChannelId::One));
        assert!(!should_listen(open, ChannelId::Two));
    }

    #[test]
    fn test_single_open_channel() {
        let open = OpenStates([false, true]);
        assert!(!should_listen(open, ChannelId::One));
        assert!(should_listen(open, ChannelId::Two));
    }

    #[test]
    fn test_nothing_open() {
        let open = OpenStates::default();
        assert!(!should_listen(open, ChannelId::One));
        assert!(!should_listen(open, ChannelId::Two));
    }
}
