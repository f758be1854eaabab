// src/io/serial/ports.rs
//
// Port discovery descriptors and the per-channel PortHandle.

use serde::Serialize;

use super::link::{PortDriver, SerialLink};
use crate::error::OpenError;

// ============================================================================
// Discovery Types
// ============================================================================

/// Transport the OS reports for a serial device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Usb,
    Bluetooth,
    Pci,
    Unknown,
}

/// Information about an available serial port
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortDescriptor {
    pub port_name: String,
    pub kind: PortKind,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    /// Free-text product description
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub serial_number: Option<String>,
}

impl PortDescriptor {
    /// Descriptor with only a name, as for platform ports without USB details.
    pub fn bare(port_name: impl Into<String>) -> Self {
        PortDescriptor {
            port_name: port_name.into(),
            kind: PortKind::Unknown,
            vid: None,
            pid: None,
            description: None,
            manufacturer: None,
            serial_number: None,
        }
    }
}

impl From<serialport::SerialPortInfo> for PortDescriptor {
    fn from(p: serialport::SerialPortInfo) -> Self {
        let (kind, vid, pid, description, manufacturer, serial_number) = match p.port_type {
            serialport::SerialPortType::UsbPort(info) => (
                PortKind::Usb,
                Some(info.vid),
                Some(info.pid),
                info.product,
                info.manufacturer,
                info.serial_number,
            ),
            serialport::SerialPortType::BluetoothPort => {
                (PortKind::Bluetooth, None, None, None, None, None)
            }
            serialport::SerialPortType::PciPort => (PortKind::Pci, None, None, None, None, None),
            serialport::SerialPortType::Unknown => {
                (PortKind::Unknown, None, None, None, None, None)
            }
        };
        PortDescriptor {
            port_name: p.port_name,
            kind,
            vid,
            pid,
            description,
            manufacturer,
            serial_number,
        }
    }
}

// ============================================================================
// Port Handle
// ============================================================================

/// Owns one OS serial connection for a channel slot.
///
/// The cached name is `None` both before the first open and after a close,
/// while the last configured baud rate is kept so observers only see a
/// baud change when it actually changes.
#[derive(Default)]
pub struct PortHandle {
    name: Option<String>,
    baud: Option<u32>,
    link: Option<Box<dyn SerialLink>>,
}

impl PortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `name` at `baud`, closing any existing connection first so the
    /// new configuration always applies. On failure the handle is left closed.
    pub fn open(&mut self, driver: &dyn PortDriver, name: &str, baud: u32) -> Result<(), OpenError> {
        self.close();

        if baud == 0 {
            return Err(OpenError::InvalidBaud {
                name: name.to_string(),
                baud,
            });
        }

        let link = driver.open(name, baud)?;
        self.link = Some(link);
        self.name = Some(name.to_string());
        self.baud = Some(baud);
        Ok(())
    }

    /// Close the connection and clear the cached name. Safe on a closed handle.
    pub fn close(&mut self) {
        self.link = None;
        self.name = None;
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// OS port name while open.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Most recently configured baud rate.
    pub fn baud(&self) -> Option<u32> {
        self.baud
    }

    pub fn link_mut(&mut self) -> Option<&mut (dyn SerialLink + 'static)> {
        self.link.as_deref_mut()
    }
}

// ============================================================================
// Tests
// ============================================================================
