// src/io/serial/turnaround.rs
//
// Half-duplex turnaround coordination.
// While a shared channel transmits, line extraction is suspended; received
// bytes keep accumulating and are scanned once the window closes.

use std::time::{Duration, Instant};

/// Bits on the wire per byte at 8N1 (start + 8 data + stop).
const BITS_PER_BYTE: u64 = 10;

/// Clamp range for the estimated transmission time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnaroundLimits {
    pub min: Duration,
    pub max: Duration,
}

impl Default for TurnaroundLimits {
    fn default() -> Self {
        TurnaroundLimits {
            min: Duration::from_millis(1),
            max: Duration::from_millis(10),
        }
    }
}

/// Estimate how long `bytes` take on the wire at `baud`, rounded up to
/// whole milliseconds and clamped to `limits`. A zero baud yields the maximum.
pub fn estimate_tx_duration(bytes: usize, baud: u32, limits: TurnaroundLimits) -> Duration {
    if baud == 0 {
        return limits.max;
    }
    let bits = bytes as u64 * BITS_PER_BYTE;
    let ms = (bits * 1000).div_ceil(baud as u64);
    Duration::from_millis(ms).clamp(limits.min, limits.max)
}

/// Paused flag plus deadline for one channel.
#[derive(Debug, Default)]
pub struct TurnaroundWindow {
    deadline: Option<Instant>,
}

impl TurnaroundWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend extraction for at least `duration` from now.
    pub fn begin(&mut self, duration: Duration) {
        self.deadline = Some(Instant::now() + duration);
    }

    pub fn is_paused(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the estimated transmission ends.
    pub fn remaining(&self) -> Duration {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Resume extraction. Returns whether a window was active.
    pub fn end(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_estimate_scales_with_payload_and_baud() {
        let limits = TurnaroundLimits {
            min: ms(1),
            max: ms(1000),
        };
        // 12 bytes * 10 bits at 9600 baud = 12.5 ms -> 13
        assert_eq!(estimate_tx_duration(12, 9600, limits), ms(13));
        // 96 bytes at 9600 = exactly 100 ms
        assert_eq!(estimate_tx_duration(96, 9600, limits), ms(100));
    }

    #[test]
    fn test_estimate_is_clamped() {
        let limits = TurnaroundLimits::default();
        assert_eq!(estimate_tx_duration(5, 115200, limits), ms(1));
        assert_eq!(estimate_tx_duration(0, 57600, limits), ms(1));
        assert_eq!(estimate_tx_duration(4096, 57600, limits), ms(10));
        assert_eq!(estimate_tx_duration(64, 0, limits), ms(10));
    }

    #[test]
    fn test_window_lifecycle() {
        let mut w = TurnaroundWindow::new();
        assert!(!w.is_paused());
        assert_eq!(w.remaining(), Duration::ZERO);

        w.begin(ms(50));
        assert!(w.is_paused());
        assert!(w.remaining() > Duration::ZERO);
        assert!(w.remaining() <= ms(50));

        assert!(w.end());
        assert!(!w.is_paused());
        assert!(!w.end());
    }
}
