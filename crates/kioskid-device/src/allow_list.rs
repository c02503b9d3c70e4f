// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lookups over the scanner allow-list.

use kioskid_bridge::{SerialPortInfo, UsbFilter};
use kioskid_core::ScannerAllowListEntry;

/// Port-chooser filters for every allow-listed device.
pub fn usb_filters(entries: &[ScannerAllowListEntry]) -> Vec<UsbFilter> {
    entries
        .iter()
        .map(|e| UsbFilter {
            vendor_id: e.vendor_id,
            product_id: e.product_id,
        })
        .collect()
}

/// The allow-list entry describing `port`, if it is a supported scanner.
/// Ports without USB metadata never match.
pub fn entry_for_port(
    entries: &[ScannerAllowListEntry],
    port: &SerialPortInfo,
) -> Option<ScannerAllowListEntry> {
    let (vendor_id, product_id) = (port.vendor_id?, port.product_id?);
    entries
        .iter()
        .find(|e| e.matches(vendor_id, product_id))
        .copied()
}
