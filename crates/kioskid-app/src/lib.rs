// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kioskid service layer, shared by the `kioskid` binary and by any host
// (kiosk UI, test harness) that embeds the kiosk.

pub mod services;

pub use services::app_services::{CapabilityReport, KioskServices};
