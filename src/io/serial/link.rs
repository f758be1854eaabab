// src/io/serial/link.rs
//
// Seams between the bridge and the OS serial stack.
// `SerialLink` is one open connection; `PortDriver` enumerates and opens them.
// The native implementations wrap the serialport crate.

use std::io::{self, Read, Write};

use super::ports::PortDescriptor;
use super::utils;
use crate::error::OpenError;

// ============================================================================
// Traits
// ============================================================================

/// One open, configured serial connection.
pub trait SerialLink: Send {
    /// Read every byte the driver currently holds, appending to `out`.
    /// Returns the number of bytes appended (0 when idle).
    fn read_available(&mut self, out: &mut Vec<u8>) -> io::Result<usize>;

    /// Hand the whole payload to the driver.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Bytes still queued in the driver's output buffer.
    fn bytes_to_write(&mut self) -> io::Result<u32>;

    /// Discard any stale input held by the driver.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Enumerates and opens serial devices.
pub trait PortDriver: Send {
    /// Host-visible serial devices in OS order.
    fn enumerate(&self) -> Result<Vec<PortDescriptor>, String>;

    /// Open `name` at `baud` with the fixed 8N1 framing, read/write.
    fn open(&self, name: &str, baud: u32) -> Result<Box<dyn SerialLink>, OpenError>;
}

// ============================================================================
// Native Implementation
// ============================================================================

/// A serialport-crate connection.
pub struct NativeLink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialLink for NativeLink {
    fn read_available(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }

        let start = out.len();
        out.resize(start + pending, 0);
        match self.port.read(&mut out[start..]) {
            Ok(n) => {
                out.truncate(start + n);
                Ok(n)
            }
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, data)
    }

    fn bytes_to_write(&mut self) -> io::Result<u32> {
        Ok(self.port.bytes_to_write()?)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(self.port.clear(serialport::ClearBuffer::Input)?)
    }
}

/// Host serial stack via the serialport crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeDriver;

impl PortDriver for NativeDriver {
    /// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
    /// The cu (calling unit) devices do not block on open waiting for carrier detect.
    fn enumerate(&self) -> Result<Vec<PortDescriptor>, String> {
        let ports = serialport::available_ports()
            .map_err(|e| format!("Failed to enumerate ports: {}", e))?;

        Ok(ports
            .into_iter()
            .filter(|_p| {
                #[cfg(target_os = "macos")]
                {
                    !_p.port_name.starts_with("/dev/tty.")
                }
                #[cfg(not(target_os = "macos"))]
                {
                    true
                }
            })
            .map(PortDescriptor::from)
            .collect())
    }

    fn open(&self, name: &str, baud: u32) -> Result<Box<dyn SerialLink>, OpenError> {
        let port = utils::configured_builder(name, baud)
            .open()
            .map_err(|e| utils::open_error_from(name, &e))?;
        Ok(Box::new(NativeLink { port }))
    }
}
