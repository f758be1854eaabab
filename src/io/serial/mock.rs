// src/io/serial/mock.rs
//
// Scripted in-memory serial devices for tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::link::{PortDriver, SerialLink};
use super::ports::PortDescriptor;
use crate::error::OpenError;

#[derive(Default)]
pub(crate) struct MockPortState {
    pub open: bool,
    pub baud: u32,
    pub open_count: usize,
    pub inbound: VecDeque<u8>,
    pub written: Vec<u8>,
    pub writes: usize,
    pub clears: usize,
    pub stall_flush: bool,
    pub reply_on_write: VecDeque<Vec<u8>>,
    pub read_error: Option<io::ErrorKind>,
    pub write_error: Option<io::ErrorKind>,
    pub deny_open: bool,
}

/// Test-side view of one simulated device.
#[derive(Clone, Default)]
pub(crate) struct MockPort(Arc<Mutex<MockPortState>>);

impl MockPort {
    fn with<R>(&self, f: impl FnOnce(&mut MockPortState) -> R) -> R {
        let mut guard = self.0.lock().unwrap();
        f(&mut guard)
    }

    pub fn is_open(&self) -> bool {
        self.with(|s| s.open)
    }

    pub fn baud(&self) -> u32 {
        self.with(|s| s.baud)
    }

    pub fn open_count(&self) -> usize {
        self.with(|s| s.open_count)
    }

    /// Make bytes available to the next read.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.with(|s| s.inbound.extend(bytes.iter().copied()));
    }

    pub fn inbound_len(&self) -> usize {
        self.with(|s| s.inbound.len())
    }

    pub fn written(&self) -> Vec<u8> {
        self.with(|s| s.written.clone())
    }

    pub fn writes(&self) -> usize {
        self.with(|s| s.writes)
    }

    pub fn clears(&self) -> usize {
        self.with(|s| s.clears)
    }

    /// Report queued output forever so flush waits time out.
    pub fn stall_flush(&self) {
        self.with(|s| s.stall_flush = true);
    }

    /// Bytes that "arrive" on the wire as soon as the next write lands.
    pub fn reply_on_write(&self, bytes: &[u8]) {
        self.with(|s| s.reply_on_write.push_back(bytes.to_vec()));
    }

    /// Fail the next read with `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.with(|s| s.read_error = Some(kind));
    }

    /// Fail every write with `kind`.
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.with(|s| s.write_error = Some(kind));
    }

    pub fn deny_open(&self) {
        self.with(|s| s.deny_open = true);
    }
}

struct MockLink {
    port: MockPort,
}

impl SerialLink for MockLink {
    fn read_available(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        self.port.with(|s| {
            if let Some(kind) = s.read_error.take() {
                return Err(io::Error::new(kind, "mock read failure"));
            }
            let n = s.inbound.len();
            out.extend(s.inbound.drain(..));
            Ok(n)
        })
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.with(|s| {
            if let Some(kind) = s.write_error {
                return Err(io::Error::new(kind, "mock write failure"));
            }
            s.written.extend_from_slice(data);
            s.writes += 1;
            if let Some(reply) = s.reply_on_write.pop_front() {
                s.inbound.extend(reply);
            }
            Ok(())
        })
    }

    fn bytes_to_write(&mut self) -> io::Result<u32> {
        self.port.with(|s| Ok(if s.stall_flush { 1 } else { 0 }))
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port.with(|s| {
            s.inbound.clear();
            s.clears += 1;
            Ok(())
        })
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.port.with(|s| s.open = false);
    }
}

/// Simulated host serial stack.
#[derive(Clone, Default)]
pub(crate) struct MockDriver {
    ports: Arc<Mutex<Vec<(PortDescriptor, MockPort)>>>,
}

impl MockDriver {
    pub fn with_ports(names: &[&str]) -> Self {
        let driver = MockDriver::default();
        for name in names {
            driver.add_port(PortDescriptor::bare(*name));
        }
        driver
    }

    pub fn add_port(&self, descriptor: PortDescriptor) -> MockPort {
        let port = MockPort::default();
        self.ports.lock().unwrap().push((descriptor, port.clone()));
        port
    }

    pub fn remove_port(&self, name: &str) {
        self.ports.lock().unwrap().retain(|(d, _)| d.port_name != name);
    }

    /// Handle to a registered device. Panics if the name is unknown.
    pub fn port(&self, name: &str) -> MockPort {
        self.ports
            .lock()
            .unwrap()
            .iter()
            .find(|(d, _)| d.port_name == name)
            .map(|(_, p)| p.clone())
            .unwrap_or_else(|| panic!("no mock port named {}", name))
    }
}

impl PortDriver for MockDriver {
    fn enumerate(&self) -> Result<Vec<PortDescriptor>, String> {
        Ok(self.ports.lock().unwrap().iter().map(|(d, _)| d.clone()).collect())
    }

    fn open(&self, name: &str, baud: u32) -> Result<Box<dyn SerialLink>, OpenError> {
        let port = self
            .ports
            .lock()
            .unwrap()
            .iter()
            .find(|(d, _)| d.port_name == name)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| OpenError::NoDevice {
                name: name.to_string(),
                reason: "No such file or directory".to_string(),
            })?;

        let denied = port.with(|s| {
            if s.deny_open {
                return true;
            }
            s.open = true;
            s.baud = baud;
            s.open_count += 1;
            false
        });
        if denied {
            return Err(OpenError::PermissionDenied {
                name: name.to_string(),
                reason: "Access denied".to_string(),
            });
        }

        Ok(Box::new(MockLink { port }))
    }
}
