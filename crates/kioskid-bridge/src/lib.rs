// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kioskid: platform transport abstractions.
//
// The matchers and the session cipher never see a platform type. Serial and
// proximity-tag access go through the traits in `traits`, implemented once
// per target. `memory` is an in-process scripted implementation used by the
// simulator and by tests.

pub mod memory;
pub mod stub;
pub mod traits;

use std::sync::Arc;

pub use memory::MemoryBridge;
pub use stub::StubBridge;
pub use traits::{
    PlatformBridge, SerialConnection, SerialPortInfo, SerialTransport, TagEvent,
    TagEventCallback, TagReaderTransport, UsbFilter,
};

/// Return the bridge implementation for the target platform.
///
/// No native backend is linked into this build, so every target gets the
/// stub, which reports `DeviceUnavailable` for each transport.
pub fn platform_bridge() -> Arc<dyn PlatformBridge> {
    Arc::new(StubBridge)
}
