// src/io/serial/utils.rs
//
// Shared helpers for the native serial driver.
// Holds the fixed port framing and maps serialport errors onto OpenError.

use serialport::{DataBits, FlowControl, Parity, SerialPortBuilder, StopBits};
use std::time::Duration;

use crate::error::OpenError;

// ============================================================================
// Fixed Framing
// ============================================================================

/// Every channel runs 8 data bits, no parity, 1 stop bit, no flow control.
pub const DATA_BITS: DataBits = DataBits::Eight;
pub const PARITY: Parity = Parity::None;
pub const STOP_BITS: StopBits = StopBits::One;
pub const FLOW_CONTROL: FlowControl = FlowControl::None;

/// Short read timeout so the poll loop never stalls on an idle port.
pub const READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Human-readable framing summary for log lines, e.g. "8-N-1".
pub fn framing_label() -> String {
    let parity = match PARITY {
        Parity::None => 'N',
        Parity::Odd => 'O',
        Parity::Even => 'E',
    };
    let data_bits = match DATA_BITS {
        DataBits::Five => 5,
        DataBits::Six => 6,
        DataBits::Seven => 7,
        DataBits::Eight => 8,
    };
    let stop_bits = match STOP_BITS {
        StopBits::One => 1,
        StopBits::Two => 2,
    };
    format!("{}-{}-{}", data_bits, parity, stop_bits)
}

/// Port builder with the fixed framing applied.
pub fn configured_builder(name: &str, baud: u32) -> SerialPortBuilder {
    serialport::new(name, baud)
        .data_bits(DATA_BITS)
        .parity(PARITY)
        .stop_bits(STOP_BITS)
        .flow_control(FLOW_CONTROL)
        .timeout(READ_TIMEOUT)
}

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a serialport open failure into an OpenError carrying the OS message.
pub fn open_error_from(name: &str, err: &serialport::Error) -> OpenError {
    let reason = err.description.clone();
    match err.kind() {
        serialport::ErrorKind::NoDevice => OpenError::NoDevice {
            name: name.to_string(),
            reason,
        },
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => OpenError::NoDevice {
            name: name.to_string(),
            reason,
        },
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            OpenError::PermissionDenied {
                name: name.to_string(),
                reason,
            }
        }
        _ => OpenError::Unavailable {
            name: name.to_string(),
            reason,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_label() {
        assert_eq!(framing_label(), "8-N-1");
    }

    #[test]
    fn test_open_error_no_device() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert_eq!(
            open_error_from("COM7", &err),
            OpenError::NoDevice {
                name: "COM7".to_string(),
                reason: "gone".to_string()
            }
        );
    }

    #[test]
    fn test_open_error_permission_denied() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "access denied",
        );
        assert!(matches!(
            open_error_from("/dev/ttyUSB0", &err),
            OpenError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn test_open_error_other_kinds_are_unavailable() {
        let err = serialport::Error::new(serialport::ErrorKind::InvalidInput, "bad baud");
        let open = open_error_from("/dev/ttyUSB0", &err);
        assert!(matches!(open, OpenError::Unavailable { .. }));
        assert!(open.to_string().contains("bad baud"));
    }
}
