// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the kiosk's hardware transports.
//
// All methods are blocking. Async callers run them on the blocking pool
// (`tokio::task::spawn_blocking`).

use kioskid_core::error::Result;

/// Unified bridge that groups every transport the kiosk uses.
pub trait PlatformBridge: SerialTransport + TagReaderTransport + Send + Sync {
    /// Human-readable platform name (e.g. "Linux (stub)").
    fn platform_name(&self) -> &str;
}

/// USB vendor/product pair used to filter the port chooser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbFilter {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// A serial port as reported by the platform.
///
/// Vendor and product ids are optional: not every port exposes USB metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl SerialPortInfo {
    pub fn usb(port_name: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            port_name: port_name.into(),
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
        }
    }

    /// Whether this port passes any of `filters`. An empty filter list passes all.
    pub fn matches_any(&self, filters: &[UsbFilter]) -> bool {
        filters.is_empty()
            || filters.iter().any(|f| {
                self.vendor_id == Some(f.vendor_id) && self.product_id == Some(f.product_id)
            })
    }
}

/// Serial port enumeration and opening.
pub trait SerialTransport {
    /// Whether the platform exposes serial ports at all.
    fn serial_available(&self) -> bool;

    /// Ports this application may already open without prompting.
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>>;

    /// Ask the user to choose a port matching `filters`.
    ///
    /// Returns `Ok(None)` if the user cancelled the chooser and
    /// `Err(PortOpenFailure)` if no matching device is attached.
    fn request_port(&self, filters: &[UsbFilter]) -> Result<Option<SerialPortInfo>>;

    /// Open `port` at `baud_rate` (8N1, no flow control).
    fn open_port(&self, port: &SerialPortInfo, baud_rate: u32)
    -> Result<Box<dyn SerialConnection>>;
}

/// An open serial connection, exclusively owned by one driver.
pub trait SerialConnection: Send {
    /// Write all of `data` to the device.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Read one response buffer of at most `max_len` bytes. An empty vector
    /// means the device produced nothing.
    fn read_response(&mut self, max_len: usize) -> Result<Vec<u8>>;

    /// Release the reader and writer and close the port. Idempotent;
    /// implementations also close on drop.
    fn close(&mut self) -> Result<()>;
}

/// Event delivered by a proximity-tag reading session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    /// A tag was read successfully.
    Reading { serial_number: String },
    /// The platform reported a read failure.
    Error(String),
}

/// Listener invoked by the platform for each tag event. May be called from
/// any thread, any number of times.
pub type TagEventCallback = Box<dyn Fn(TagEvent) + Send + Sync>;

/// Proximity-tag (RFID/NFC) reader.
pub trait TagReaderTransport {
    /// Whether the platform exposes a proximity reader.
    fn tag_reader_available(&self) -> bool;

    /// Begin a reading session, delivering events to `on_event` until
    /// `stop_tag_session` is called.
    fn start_tag_session(&self, on_event: TagEventCallback) -> Result<()>;

    /// End the current reading session. Safe to call when none is active.
    fn stop_tag_session(&self);
}
