// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kioskid-device: the two hardware-facing components of the kiosk.
//
// Both sit on top of a `PlatformBridge` and push its blocking calls onto the
// tokio blocking pool. Neither touches the biometric registries.

pub mod allow_list;
pub mod scanner;
pub mod tag;

pub use scanner::SecureScannerDriver;
pub use tag::{DEFAULT_SCAN_TIMEOUT_MS, TagScanner, derive_bag_id, validate_tag_id};
