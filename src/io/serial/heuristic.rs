// src/io/serial/heuristic.rs
//
// Radio-modem detection. Advisory only: a negative result never blocks or
// closes a connection.
//
// - Passive: classify a discovered device by USB ids and descriptor strings
// - Active: walk an open port through the AT escape / exit sequence

use std::time::Duration;

use super::link::SerialLink;
use super::ports::{PortDescriptor, PortKind};

// ============================================================================
// Constants
// ============================================================================

/// USB-to-serial bridge chipsets found in common telemetry radios (vid, pid).
const KNOWN_BRIDGE_IDS: &[(u16, u16)] = &[
    (0x0403, 0x6001), // FTDI FT232R
    (0x0403, 0x6010), // FTDI FT2232
    (0x0403, 0x6011), // FTDI FT4232
    (0x0403, 0x6014), // FTDI FT232H
    (0x0403, 0x6015), // FTDI FT-X
    (0x10C4, 0xEA60), // Silicon Labs CP210x
    (0x10C4, 0xEA70), // Silicon Labs CP2105
    (0x067B, 0x2303), // Prolific PL2303
    (0x1A86, 0x7523), // WCH CH340
    (0x1A86, 0x5523), // WCH CH341
];

/// Lowercase vendor / chipset fragments matched against descriptor strings.
const KNOWN_VENDOR_NAMES: &[&str] = &[
    "ftdi",
    "silicon labs",
    "cp210",
    "prolific",
    "pl2303",
    "wch",
    "ch340",
    "ch341",
];

/// Lowercase markers of OS-provided Bluetooth virtual serial ports.
const BLUETOOTH_MARKERS: &[&str] = &["bluetooth", "bthenum", "rfcomm"];

/// Three-byte AT escape token.
pub const AT_ESCAPE: &[u8] = b"+++";

/// Leave command mode and return to transparent data mode.
pub const AT_EXIT_COMMAND: &[u8] = b"ATO\r\n";

/// Silence most AT modems require around the escape token.
pub const DEFAULT_GUARD_TIME: Duration = Duration::from_millis(1000);

// ============================================================================
// Passive Filter
// ============================================================================

fn field_contains(field: &Option<String>, needles: &[&str]) -> bool {
    field
        .as_deref()
        .map(|s| {
            let lower = s.to_lowercase();
            needles.iter().any(|n| lower.contains(n))
        })
        .unwrap_or(false)
}

/// Whether a discovered device looks like a USB-serial radio modem.
pub fn looks_like_radio(port: &PortDescriptor) -> bool {
    if port.kind == PortKind::Bluetooth
        || field_contains(&port.description, BLUETOOTH_MARKERS)
        || field_contains(&port.manufacturer, BLUETOOTH_MARKERS)
    {
        return false;
    }

    if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        if KNOWN_BRIDGE_IDS.contains(&(vid, pid)) {
            return true;
        }
    }

    field_contains(&port.description, KNOWN_VENDOR_NAMES)
        || field_contains(&port.manufacturer, KNOWN_VENDOR_NAMES)
}

// ============================================================================
// Active Probe
// ============================================================================

/// Send the AT escape and exit sequence on an open link.
///
/// The reply is not parsed; `true` means every write was accepted. Blocks for
/// about twice `guard`.
pub fn probe_radio_at(link: &mut dyn SerialLink, guard: Duration) -> bool {
    // Drop anything buffered before the guard silence starts
    if let Err(e) = link.clear_input() {
        tlog!("[radio_probe] Failed to clear input: {}", e);
    }
    let mut stale = Vec::new();
    if let Ok(n) = link.read_available(&mut stale) {
        if n > 0 {
            tlog!("[radio_probe] Drained {} stale bytes", n);
        }
    }

    std::thread::sleep(guard);
    if let Err(e) = link.write_all(AT_ESCAPE) {
        tlog!("[radio_probe] Escape write failed: {}", e);
        return false;
    }

    std::thread::sleep(guard);
    if let Err(e) = link.write_all(AT_EXIT_COMMAND) {
        tlog!("[radio_probe] Exit command write failed: {}", e);
        return false;
    }

    true
}

/// Wait one guard interval for the modem's answer to the probe (usually
/// "OK") and take it off the link, so it is never framed as a line.
/// Returns the bytes removed.
pub fn collect_probe_reply(link: &mut dyn SerialLink, guard: Duration) -> Vec<u8> {
    std::thread::sleep(guard);
    let mut reply = Vec::new();
    if let Err(e) = link.read_available(&mut reply) {
        tlog!("[radio_probe] Failed to read probe reply: {}", e);
    }
    reply
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::link::PortDriver;
    use crate::io::serial::mock::MockDriver;

    fn usb(vid: u16, pid: u16, description: Option<&str>, manufacturer: Option<&str>) -> PortDescriptor {
        PortDescriptor {
            port_name: "/dev/ttyUSB0".to_string(),
            kind: PortKind::Usb,
            vid: Some(vid),
            pid: Some(pid),
            description: description.map(String::from),
            manufacturer: manufacturer.map(String::from),
            serial_number: None,
        }
    }

    #[test]
    fn test_known_vid_pid_matches() {
        assert!(looks_like_radio(&usb(0x0403, 0x6015, None, None)));
        assert!(looks_like_radio(&usb(0x10C4, 0xEA60, None, None)));
    }

    #[test]
    fn test_vendor_name_matches_case_insensitively() {
        assert!(looks_like_radio(&usb(0x1234, 0x0001, Some("USB-Serial (CH340)"), None)));
        assert!(looks_like_radio(&usb(0x1234, 0x0001, None, Some("Silicon Labs"))));
        assert!(looks_like_radio(&usb(0x1234, 0x0001, None, Some("FTDI"))));
    }

    #[test]
    fn test_unknown_device_rejected() {
        assert!(!looks_like_radio(&usb(0x2341, 0x0043, Some("Arduino Uno"), Some("Arduino"))));
        assert!(!looks_like_radio(&PortDescriptor::bare("/dev/ttyS0")));
    }

    #[test]
    fn test_bluetooth_marker_overrides_match() {
        let port = usb(0x0403, 0x6001, Some("Standard Serial over Bluetooth link"), None);
        assert!(!looks_like_radio(&port));

        let port = usb(0x10C4, 0xEA60, None, Some("Microsoft BTHENUM"));
        assert!(!looks_like_radio(&port));

        let mut port = usb(0x0403, 0x6001, None, None);
        port.kind = PortKind::Bluetooth;
        assert!(!looks_like_radio(&port));
    }

    #[test]
    fn test_probe_writes_escape_then_exit() {
        let driver = MockDriver::with_ports(&["COM7"]);
        let port = driver.port("COM7");
        let mut link = driver.open("COM7", 57600).unwrap();
        port.push_inbound(b"stale telemetry\n");

        assert!(probe_radio_at(link.as_mut(), Duration::ZERO));
        assert_eq!(port.written(), b"+++ATO\r\n".to_vec());
        assert_eq!(port.clears(), 1);
        assert_eq!(port.inbound_len(), 0);
    }

    #[test]
    fn test_probe_reply_is_collected() {
        let driver = MockDriver::with_ports(&["COM7"]);
        let port = driver.port("COM7");
        let mut link = driver.open("COM7", 57600).unwrap();
        port.reply_on_write(b"");
        port.reply_on_write(b"OK\r\n");

        assert!(probe_radio_at(link.as_mut(), Duration::ZERO));
        assert_eq!(collect_probe_reply(link.as_mut(), Duration::ZERO), b"OK\r\n".to_vec());
        assert_eq!(port.inbound_len(), 0);
    }

    #[test]
    fn test_probe_reports_write_failure() {
        let driver = MockDriver::with_ports(&["COM7"]);
        let port = driver.port("COM7");
        let mut link = driver.open("COM7", 57600).unwrap();
        port.fail_writes(std::io::ErrorKind::BrokenPipe);

        assert!(!probe_radio_at(link.as_mut(), Duration::ZERO));
    }
}
