// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory scripted bridge.
//
// Stands in for real hardware in simulation mode and in tests: attached
// ports, chooser behaviour, open failures, capture responses and tag events
// are all scripted up front, and everything the driver writes is recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kioskid_core::error::{KioskError, Result};
use tracing::debug;

use crate::traits::*;

/// Scripted reply to one `read_response` call.
#[derive(Debug, Clone)]
enum ScriptedRead {
    Bytes(Vec<u8>),
    Error(String),
}

#[derive(Default)]
struct MemoryState {
    /// Attached devices and whether the app already has access to them.
    ports: Vec<(SerialPortInfo, bool)>,
    cancel_prompt: bool,
    prompt_delay: Duration,
    open_failure: Option<String>,
    reads: VecDeque<ScriptedRead>,
    response_delay: Duration,
    written: Vec<Vec<u8>>,
    opened: u32,
    closed: u32,
    tag_reader: bool,
    tag_events: VecDeque<(Duration, TagEvent)>,
    /// Bumped by every start/stop so stale session threads go quiet.
    tag_generation: u64,
    tag_stops: u32,
}

/// Scripted in-process bridge. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryBridge {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Scripting --------------------------------------------------------

    /// Attach a device the user has not yet granted access to.
    pub fn attach_port(&self, port: SerialPortInfo) -> &Self {
        self.state().ports.push((port, false));
        self
    }

    /// Attach a device the app may open without prompting.
    pub fn attach_granted_port(&self, port: SerialPortInfo) -> &Self {
        self.state().ports.push((port, true));
        self
    }

    /// Make the port chooser behave as if the user pressed Cancel.
    pub fn cancel_prompt(&self) -> &Self {
        self.state().cancel_prompt = true;
        self
    }

    /// Keep the port chooser open for `delay` before it answers.
    pub fn set_prompt_delay(&self, delay: Duration) -> &Self {
        self.state().prompt_delay = delay;
        self
    }

    /// Make every `open_port` call fail with `reason`.
    pub fn fail_open(&self, reason: impl Into<String>) -> &Self {
        self.state().open_failure = Some(reason.into());
        self
    }

    /// Queue the bytes returned by the next capture read.
    pub fn push_response(&self, bytes: impl Into<Vec<u8>>) -> &Self {
        self.state().reads.push_back(ScriptedRead::Bytes(bytes.into()));
        self
    }

    /// Queue a transport failure for the next capture read.
    pub fn push_read_error(&self, reason: impl Into<String>) -> &Self {
        self.state().reads.push_back(ScriptedRead::Error(reason.into()));
        self
    }

    /// Delay every read by `delay` (simulates a slow or silent device).
    pub fn set_response_delay(&self, delay: Duration) -> &Self {
        self.state().response_delay = delay;
        self
    }

    /// Enable or disable the proximity reader.
    pub fn set_tag_reader(&self, available: bool) -> &Self {
        self.state().tag_reader = available;
        self
    }

    /// Queue an event delivered `delay` after the next session starts.
    pub fn push_tag_event(&self, delay: Duration, event: TagEvent) -> &Self {
        self.state().tag_events.push_back((delay, event));
        self
    }

    // -- Inspection -------------------------------------------------------

    /// Every buffer written to any opened connection, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state().written.clone()
    }

    pub fn open_count(&self) -> u32 {
        self.state().opened
    }

    pub fn close_count(&self) -> u32 {
        self.state().closed
    }

    pub fn tag_stop_count(&self) -> u32 {
        self.state().tag_stops
    }
}

impl PlatformBridge for MemoryBridge {
    fn platform_name(&self) -> &str {
        "In-memory simulator"
    }
}

impl SerialTransport for MemoryBridge {
    fn serial_available(&self) -> bool {
        true
    }

    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        Ok(self
            .state()
            .ports
            .iter()
            .filter(|(_, granted)| *granted)
            .map(|(port, _)| port.clone())
            .collect())
    }

    fn request_port(&self, filters: &[UsbFilter]) -> Result<Option<SerialPortInfo>> {
        let delay = self.state().prompt_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let mut state = self.state();
        if state.cancel_prompt {
            return Ok(None);
        }
        let chosen = state
            .ports
            .iter_mut()
            .find(|(port, _)| port.matches_any(filters))
            .ok_or_else(|| KioskError::PortOpenFailure("no matching device attached".into()))?;
        chosen.1 = true;
        Ok(Some(chosen.0.clone()))
    }

    fn open_port(
        &self,
        port: &SerialPortInfo,
        baud_rate: u32,
    ) -> Result<Box<dyn SerialConnection>> {
        let mut state = self.state();
        if let Some(reason) = &state.open_failure {
            return Err(KioskError::PortOpenFailure(reason.clone()));
        }
        state.opened += 1;
        debug!(port = %port.port_name, baud_rate, "memory port opened");
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

impl TagReaderTransport for MemoryBridge {
    fn tag_reader_available(&self) -> bool {
        self.state().tag_reader
    }

    fn start_tag_session(&self, on_event: TagEventCallback) -> Result<()> {
        let (generation, events) = {
            let mut state = self.state();
            if !state.tag_reader {
                return Err(KioskError::DeviceUnavailable);
            }
            state.tag_generation += 1;
            (state.tag_generation, state.tag_events.drain(..).collect::<Vec<_>>())
        };

        let shared = Arc::clone(&self.state);
        std::thread::spawn(move || {
            for (delay, event) in events {
                std::thread::sleep(delay);
                let current = shared
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .tag_generation;
                if current != generation {
                    return;
                }
                on_event(event);
            }
        });
        Ok(())
    }

    fn stop_tag_session(&self) {
        let mut state = self.state();
        state.tag_generation += 1;
        state.tag_stops += 1;
    }
}

/// Connection handed out by [`MemoryBridge::open_port`].
struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

impl MemoryConnection {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SerialConnection for MemoryConnection {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(KioskError::Transport("port is closed".into()));
        }
        self.state().written.push(data.to_vec());
        Ok(())
    }

    fn read_response(&mut self, max_len: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(KioskError::Transport("port is closed".into()));
        }
        let delay = self.state().response_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        match self.state().reads.pop_front() {
            Some(ScriptedRead::Bytes(mut bytes)) => {
                bytes.truncate(max_len);
                Ok(bytes)
            }
            Some(ScriptedRead::Error(reason)) => Err(KioskError::Transport(reason)),
            None => Ok(Vec::new()),
        }
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state().closed += 1;
        }
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn prompt_grants_matching_port() {
        let bridge = MemoryBridge::new();
        bridge.attach_port(SerialPortInfo::usb("/dev/ttyACM0", 0x04d8, 0xf372));
        assert!(bridge.list_ports().unwrap().is_empty());

        let filters = [UsbFilter {
            vendor_id: 0x04d8,
            product_id: 0xf372,
        }];
        let chosen = bridge.request_port(&filters).unwrap().expect("port chosen");
        assert_eq!(chosen.port_name, "/dev/ttyACM0");
        assert_eq!(bridge.list_ports().unwrap(), vec![chosen]);
    }

    #[test]
    fn prompt_without_device_fails() {
        let bridge = MemoryBridge::new();
        bridge.attach_port(SerialPortInfo::usb("/dev/ttyUSB0", 0x1234, 0x5678));
        let filters = [UsbFilter {
            vendor_id: 0x04d8,
            product_id: 0xf372,
        }];
        assert!(matches!(
            bridge.request_port(&filters),
            Err(KioskError::PortOpenFailure(_))
        ));
    }

    #[test]
    fn cancelled_prompt_is_none() {
        let bridge = MemoryBridge::new();
        bridge
            .attach_port(SerialPortInfo::usb("/dev/ttyACM0", 0x04d8, 0xf372))
            .cancel_prompt();
        assert!(bridge.request_port(&[]).unwrap().is_none());
    }

    #[test]
    fn connection_replays_script_and_records_writes() {
        let bridge = MemoryBridge::new();
        bridge.push_response(vec![1, 2, 3, 4]).push_read_error("framing error");
        let port = SerialPortInfo::usb("/dev/ttyACM0", 0x04d8, 0xf372);
        let mut conn = bridge.open_port(&port, 9600).unwrap();

        conn.write_all(b"CAPTURE").unwrap();
        assert_eq!(conn.read_response(2).unwrap(), vec![1, 2]);
        assert!(matches!(conn.read_response(16), Err(KioskError::Transport(_))));
        assert!(conn.read_response(16).unwrap().is_empty());
        assert_eq!(bridge.written(), vec![b"CAPTURE".to_vec()]);

        conn.close().unwrap();
        conn.close().unwrap();
        drop(conn);
        assert_eq!(bridge.close_count(), 1);
    }

    #[test]
    fn stopped_session_delivers_nothing() {
        let bridge = MemoryBridge::new();
        bridge.set_tag_reader(true).push_tag_event(
            Duration::from_millis(50),
            TagEvent::Reading {
                serial_number: "04A1B2C3".into(),
            },
        );
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        bridge
            .start_tag_session(Box::new(move |event| {
                let _ = tx.lock().unwrap().send(event);
            }))
            .unwrap();
        bridge.stop_tag_session();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(bridge.tag_stop_count(), 1);
    }
}
