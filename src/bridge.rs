// src/bridge.rs
//
// Dual-channel serial bridge.
//
// Owns up to two channels and everything attached to them: the OS handle, the
// receive buffer, the turnaround window and the read attachment. Every
// operation takes `&mut self`, so one caller context serialises all channel
// I/O and no locks guard the buffers.
//
// Flow per channel:
//   poll  -> read available -> append -> (not paused) extract -> line events
//   send  -> (shared link) pause -> write -> flush wait -> resume -> extract

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, DriverError, OpenError, RoutingError, WriteError};
use crate::events::{BridgeEvent, EventReceiver, Observers};
use crate::io::serial::{
    collect_probe_reply, decode_line, estimate_tx_duration, looks_like_radio, probe_radio_at,
    LineAssembler, NativeDriver, PortDriver, PortHandle, SerialLink, TurnaroundLimits,
    TurnaroundWindow,
};
use crate::io::{ChannelId, OpenStates};
use crate::routing::RoutingTable;

/// Sleep between output-queue checks while waiting for a flush.
const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// Options
// ============================================================================

/// Runtime knobs for the bridge, usually derived from `BridgeConfig`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BridgeOptions {
    pub flush_timeout: Duration,
    pub turnaround: TurnaroundLimits,
    pub guard_time: Duration,
    pub probe_on_connect: bool,
    pub filter_radio_ports: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        BridgeOptions::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for BridgeOptions {
    fn from(config: &BridgeConfig) -> Self {
        BridgeOptions {
            flush_timeout: config.flush_timeout(),
            turnaround: config.turnaround_limits(),
            guard_time: config.guard_time(),
            probe_on_connect: config.probe_on_connect,
            filter_radio_ports: config.filter_radio_ports,
        }
    }
}

/// Where a send goes: an explicit channel or the routed default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendTarget {
    Default,
    Channel(ChannelId),
}

impl From<ChannelId> for SendTarget {
    fn from(channel: ChannelId) -> Self {
        SendTarget::Channel(channel)
    }
}

impl From<Option<ChannelId>> for SendTarget {
    fn from(channel: Option<ChannelId>) -> Self {
        channel.map(SendTarget::Channel).unwrap_or(SendTarget::Default)
    }
}

/// Encode an outgoing line with exactly one bare '\n' terminator.
pub fn normalize_outgoing(text: &str) -> Vec<u8> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let body = body.strip_suffix('\r').unwrap_or(body);
    let mut data = Vec::with_capacity(body.len() + 1);
    data.extend_from_slice(body.as_bytes());
    data.push(b'\n');
    data
}

// ============================================================================
// Channel State
// ============================================================================

/// Proof that line extraction is attached to a channel. Dropping it detaches.
struct ReadAttachment {
    channel: ChannelId,
    since: Instant,
}

impl ReadAttachment {
    /// Attach to an open link, discarding stale driver input first.
    fn attach(channel: ChannelId, link: &mut dyn SerialLink) -> Self {
        if let Err(e) = link.clear_input() {
            tlog!("[bridge] {}: failed to clear stale input: {}", channel, e);
        }
        tlog!("[bridge] {}: line extraction attached", channel);
        ReadAttachment {
            channel,
            since: Instant::now(),
        }
    }
}

impl Drop for ReadAttachment {
    fn drop(&mut self) {
        tlog!(
            "[bridge] {}: line extraction detached after {:?}",
            self.channel,
            self.since.elapsed()
        );
    }
}

struct ChannelSlot {
    id: ChannelId,
    handle: PortHandle,
    assembler: LineAssembler,
    window: TurnaroundWindow,
    attachment: Option<ReadAttachment>,
    /// Read fault seen mid-send, handled once the send has unwound.
    fault: Option<DriverError>,
}

impl ChannelSlot {
    fn new(id: ChannelId) -> Self {
        ChannelSlot {
            id,
            handle: PortHandle::new(),
            assembler: LineAssembler::new(),
            window: TurnaroundWindow::new(),
            attachment: None,
            fault: None,
        }
    }

    /// Detach extraction and drop partial-line and pause state.
    fn detach(&mut self) {
        self.attachment = None;
        self.window.end();
        self.assembler.clear();
    }

    /// Pull whatever the driver holds into the receive buffer without
    /// extracting. Only used while paused; a fault stops further reads.
    fn accumulate(&mut self) {
        if self.fault.is_some() {
            return;
        }
        let Some(link) = self.handle.link_mut() else {
            return;
        };
        let mut incoming = Vec::new();
        match link.read_available(&mut incoming) {
            Ok(_) => self.assembler.push(&incoming),
            Err(e) => self.fault = DriverError::classify(self.id, &e),
        }
    }

    /// Write `payload` and wait for the driver to drain it. On a shared link
    /// inbound bytes keep accumulating, and the pause is held until both the
    /// flush is confirmed and the estimated airtime has elapsed.
    fn transmit(&mut self, payload: &[u8], shared: bool, flush_timeout: Duration) -> Result<(), WriteError> {
        let channel = self.id;
        let link = self.handle.link_mut().ok_or(WriteError::NotOpen(channel))?;
        link.write_all(payload).map_err(|e| WriteError::Rejected {
            channel,
            reason: e.to_string(),
        })?;

        let started = Instant::now();
        loop {
            if shared {
                self.accumulate();
            }
            let link = self.handle.link_mut().ok_or(WriteError::NotOpen(channel))?;
            match link.bytes_to_write() {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(WriteError::Rejected {
                        channel,
                        reason: e.to_string(),
                    })
                }
            }
            if started.elapsed() >= flush_timeout {
                return Err(WriteError::FlushTimeout {
                    channel,
                    waited_ms: flush_timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(FLUSH_POLL_INTERVAL);
        }

        if shared {
            while !self.window.remaining().is_zero() {
                self.accumulate();
                std::thread::sleep(self.window.remaining().min(FLUSH_POLL_INTERVAL));
            }
            self.accumulate();
        }
        Ok(())
    }
}

// ============================================================================
// Serial Bridge
// ============================================================================

pub struct SerialBridge {
    driver: Box<dyn PortDriver>,
    options: BridgeOptions,
    channels: [ChannelSlot; 2],
    routing: RoutingTable,
    ports: Vec<String>,
    observers: Observers,
}

impl SerialBridge {
    pub fn new(driver: Box<dyn PortDriver>, options: BridgeOptions) -> Self {
        SerialBridge {
            driver,
            options,
            channels: [ChannelSlot::new(ChannelId::One), ChannelSlot::new(ChannelId::Two)],
            routing: RoutingTable::new(),
            ports: Vec::new(),
            observers: Observers::new(),
        }
    }

    /// Bridge over the host serial stack.
    pub fn native(options: BridgeOptions) -> Self {
        Self::new(Box::new(NativeDriver), options)
    }

    pub fn subscribe(&mut self) -> EventReceiver {
        self.observers.subscribe()
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    // ------------------------------------------------------------------------
    // State queries
    // ------------------------------------------------------------------------

    /// Cached port list from the last discovery.
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    pub fn is_connected(&self, channel: ChannelId) -> bool {
        self.slot(channel).handle.is_open()
    }

    pub fn port_name(&self, channel: ChannelId) -> Option<&str> {
        self.slot(channel).handle.name()
    }

    pub fn baud(&self, channel: ChannelId) -> Option<u32> {
        self.slot(channel).handle.baud()
    }

    pub fn open_states(&self) -> OpenStates {
        OpenStates([self.channels[0].handle.is_open(), self.channels[1].handle.is_open()])
    }

    pub fn tx_target(&self) -> Option<ChannelId> {
        self.routing.tx_target()
    }

    pub fn rx_source(&self) -> Option<ChannelId> {
        self.routing.rx_source()
    }

    /// Whether line events are currently produced for `channel`.
    pub fn is_listening(&self, channel: ChannelId) -> bool {
        self.slot(channel).attachment.is_some()
    }

    fn slot(&self, channel: ChannelId) -> &ChannelSlot {
        &self.channels[channel.index()]
    }

    fn slot_mut(&mut self, channel: ChannelId) -> &mut ChannelSlot {
        &mut self.channels[channel.index()]
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// Rescan host serial devices. `PortsChanged` fires only when the list
    /// differs from the cached one in order or membership.
    pub fn discover_ports(&mut self) -> Result<Vec<String>, BridgeError> {
        let descriptors = match self.driver.enumerate() {
            Ok(d) => d,
            Err(e) => {
                self.emit_error(None, e.clone());
                return Err(BridgeError::Discovery(e));
            }
        };

        let filter = self.options.filter_radio_ports;
        let names: Vec<String> = descriptors
            .into_iter()
            .filter(|d| !filter || looks_like_radio(d))
            .map(|d| d.port_name)
            .collect();

        if names != self.ports {
            tlog!("[bridge] Port list changed: {:?}", names);
            self.ports = names.clone();
            self.observers.emit(BridgeEvent::PortsChanged { ports: names.clone() });
        }
        Ok(names)
    }

    // ------------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------------

    /// Open `name` at `baud` on `channel`, replacing any connection it had.
    pub fn connect(&mut self, channel: ChannelId, name: &str, baud: u32) -> Result<(), OpenError> {
        if self.slot(channel.other()).handle.name() == Some(name) {
            let err = OpenError::Conflict {
                name: name.to_string(),
                other: channel.other(),
            };
            tlog!("[bridge] {}: refused {}: {}", channel, name, err);
            self.emit_error(Some(channel), err.to_string());
            return Err(err);
        }

        let slot = &mut self.channels[channel.index()];
        let was_open = slot.handle.is_open();
        let prev_name = slot.handle.name().map(String::from);
        let prev_baud = slot.handle.baud();
        slot.detach();

        let result = slot.handle.open(self.driver.as_ref(), name, baud);
        if let Err(err) = result {
            tlog!("[bridge] {}: {}", channel, err);
            if was_open {
                self.finish_close(channel, prev_name.is_some());
            }
            self.emit_error(Some(channel), err.to_string());
            return Err(err);
        }

        tlog!(
            "[bridge] {}: opened {} at {} baud ({})",
            channel,
            name,
            baud,
            crate::io::serial::utils::framing_label()
        );
        self.observers.emit(BridgeEvent::Connected { channel });
        if prev_name.as_deref() != Some(name) {
            self.observers.emit(BridgeEvent::PortNameChanged {
                channel,
                name: Some(name.to_string()),
            });
        }
        if prev_baud != Some(baud) {
            self.observers.emit(BridgeEvent::BaudChanged { channel, baud });
        }

        if self.options.probe_on_connect {
            self.run_probe(channel);
        }

        self.sync_attachments();
        Ok(())
    }

    /// Close `channel`. Any partial line and turnaround state is discarded.
    pub fn disconnect(&mut self, channel: ChannelId) {
        let slot = self.slot_mut(channel);
        if !slot.handle.is_open() {
            slot.detach();
            return;
        }
        let had_name = slot.handle.name().is_some();
        slot.detach();
        tlog!("[bridge] {}: closing {}", channel, slot.handle.name().unwrap_or("?"));
        self.finish_close(channel, had_name);
    }

    /// Close every open channel.
    pub fn disconnect_all(&mut self) {
        for channel in ChannelId::ALL {
            self.disconnect(channel);
        }
    }

    fn finish_close(&mut self, channel: ChannelId, had_name: bool) {
        self.slot_mut(channel).handle.close();

        let (tx_cleared, rx_cleared) = self.routing.release(channel);
        if tx_cleared {
            self.observers.emit(BridgeEvent::TxTargetChanged { channel: None });
        }
        if rx_cleared {
            self.observers.emit(BridgeEvent::RxSourceChanged { channel: None });
        }

        self.observers.emit(BridgeEvent::Disconnected { channel });
        if had_name {
            self.observers.emit(BridgeEvent::PortNameChanged { channel, name: None });
        }
        self.sync_attachments();
    }

    fn run_probe(&mut self, channel: ChannelId) {
        let guard = self.options.guard_time;
        let Some(link) = self.slot_mut(channel).handle.link_mut() else {
            return;
        };
        if probe_radio_at(link, guard) {
            let reply = collect_probe_reply(link, guard);
            tlog!(
                "[bridge] {}: AT probe completed, modem answered {:?}",
                channel,
                decode_line(&reply).trim()
            );
        } else {
            tlog!("[bridge] {}: AT probe failed; device does not look like a radio modem", channel);
            self.observers.emit(BridgeEvent::NotRadioModem { channel });
        }
    }

    // ------------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------------

    pub fn set_tx_target(&mut self, channel: ChannelId) -> Result<(), RoutingError> {
        let open = self.open_states();
        let changed = match self.routing.set_tx_target(channel, open) {
            Ok(changed) => changed,
            Err(e) => {
                self.report_routing_error(channel, &e);
                return Err(e);
            }
        };
        if changed {
            tlog!("[bridge] TX target -> {}", channel);
            self.observers.emit(BridgeEvent::TxTargetChanged {
                channel: Some(channel),
            });
        }
        Ok(())
    }

    /// Make `channel` the only line source. The previous source is detached
    /// before the new one is attached.
    pub fn set_rx_source(&mut self, channel: ChannelId) -> Result<(), RoutingError> {
        let open = self.open_states();
        let changed = match self.routing.set_rx_source(channel, open) {
            Ok(changed) => changed,
            Err(e) => {
                self.report_routing_error(channel, &e);
                return Err(e);
            }
        };
        if changed {
            tlog!("[bridge] RX source -> {}", channel);
            self.sync_attachments();
            self.observers.emit(BridgeEvent::RxSourceChanged {
                channel: Some(channel),
            });
        }
        Ok(())
    }

    fn report_routing_error(&mut self, channel: ChannelId, err: &RoutingError) {
        tlog!("[bridge] Routing request rejected: {}", err);
        self.emit_error(Some(channel), err.to_string());
    }

    /// Bring read attachments in line with the routing table: every detach
    /// happens before any attach, so two sources never overlap.
    fn sync_attachments(&mut self) {
        let open = self.open_states();
        let routing = self.routing;

        for slot in self.channels.iter_mut() {
            if slot.attachment.is_some() && !routing.listens_to(slot.id, open) {
                slot.detach();
            }
        }
        for slot in self.channels.iter_mut() {
            if slot.attachment.is_none() && routing.listens_to(slot.id, open) {
                if let Some(link) = slot.handle.link_mut() {
                    slot.attachment = Some(ReadAttachment::attach(slot.id, link));
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Transmit
    // ------------------------------------------------------------------------

    /// Send one line. A missing '\n' is appended and a trailing "\r\n" becomes
    /// '\n'. Succeeds only once the driver confirms the flush.
    pub fn send(&mut self, target: SendTarget, text: &str) -> Result<(), WriteError> {
        let open = self.open_states();
        let channel = match target {
            SendTarget::Channel(channel) => channel,
            SendTarget::Default => match self.routing.resolve_tx(open) {
                Some(channel) => channel,
                None => {
                    let err = WriteError::NoTarget;
                    self.emit_error(None, err.to_string());
                    return Err(err);
                }
            },
        };

        if !open.is_open(channel) {
            let err = WriteError::NotOpen(channel);
            self.emit_error(Some(channel), err.to_string());
            return Err(err);
        }

        let payload = normalize_outgoing(text);
        let options = self.options;
        let shared = self.routing.is_shared(channel, open) && self.slot(channel).attachment.is_some();

        let slot = self.slot_mut(channel);
        if shared {
            let baud = slot.handle.baud().unwrap_or(0);
            let window = estimate_tx_duration(payload.len(), baud, options.turnaround);
            slot.window.begin(window);
        }

        let result = slot.transmit(&payload, shared, options.flush_timeout);

        // The pause always ends here, success or not
        let lines = if shared {
            slot.window.end();
            slot.assembler.extract()
        } else {
            Vec::new()
        };
        let fault = slot.fault.take();

        match &result {
            Ok(()) => tlog!(
                "[bridge] {}: sent {} bytes{} [{}]",
                channel,
                payload.len(),
                if shared { " (half-duplex)" } else { "" },
                hex::encode(&payload)
            ),
            Err(e) => tlog!("[bridge] {}", e),
        }

        self.emit_lines(channel, lines);
        if let Err(e) = &result {
            self.emit_error(Some(channel), e.to_string());
        }
        if let Some(fault) = fault {
            self.handle_fault(fault);
        }
        result
    }

    // ------------------------------------------------------------------------
    // Receive
    // ------------------------------------------------------------------------

    /// Service byte arrival on every open channel. Returns the number of line
    /// events emitted. Bytes on a channel with no read attachment are dropped.
    pub fn poll(&mut self) -> usize {
        let mut emitted = 0;

        for channel in ChannelId::ALL {
            let slot = self.slot_mut(channel);
            let Some(link) = slot.handle.link_mut() else {
                continue;
            };

            let mut incoming = Vec::new();
            match link.read_available(&mut incoming) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => match DriverError::classify(channel, &e) {
                    Some(fault) => {
                        self.handle_fault(fault);
                        continue;
                    }
                    None => continue,
                },
            }

            if slot.attachment.is_none() {
                continue;
            }
            slot.assembler.push(&incoming);
            if slot.window.is_paused() {
                continue;
            }
            let lines = slot.assembler.extract();
            emitted += lines.len();
            self.emit_lines(channel, lines);
        }

        emitted
    }

    fn emit_lines(&mut self, channel: ChannelId, lines: Vec<String>) {
        for text in lines {
            self.observers.emit(BridgeEvent::LineReceived { channel, text });
        }
    }

    /// Report an asynchronous device fault once, then close the channel.
    fn handle_fault(&mut self, fault: DriverError) {
        tlog!("[bridge] {}", fault);
        self.emit_error(Some(fault.channel), fault.message.clone());
        self.disconnect(fault.channel);
    }

    /// Single funnel for user-facing error messages.
    fn emit_error(&mut self, channel: Option<ChannelId>, message: String) {
        self.observers.emit(BridgeEvent::Error { channel, message });
    }
}

// ============================================================================
// Tests
// ============================================================================
