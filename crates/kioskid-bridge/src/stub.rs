// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for hosts without a native serial or proximity-tag backend.
//
// Every transport reports `DeviceUnavailable`.

use kioskid_core::error::{KioskError, Result};

use crate::traits::*;

/// No-op bridge returned when no native backend is linked.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl SerialTransport for StubBridge {
    fn serial_available(&self) -> bool {
        false
    }

    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        Err(KioskError::DeviceUnavailable)
    }

    fn request_port(&self, _filters: &[UsbFilter]) -> Result<Option<SerialPortInfo>> {
        tracing::warn!("SerialTransport::request_port called on stub bridge");
        Err(KioskError::DeviceUnavailable)
    }

    fn open_port(
        &self,
        _port: &SerialPortInfo,
        _baud_rate: u32,
    ) -> Result<Box<dyn SerialConnection>> {
        tracing::warn!("SerialTransport::open_port called on stub bridge");
        Err(KioskError::DeviceUnavailable)
    }
}

impl TagReaderTransport for StubBridge {
    fn tag_reader_available(&self) -> bool {
        false
    }

    fn start_tag_session(&self, _on_event: TagEventCallback) -> Result<()> {
        tracing::warn!("TagReaderTransport::start_tag_session called on stub bridge");
        Err(KioskError::DeviceUnavailable)
    }

    fn stop_tag_session(&self) {}
}
