// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kioskid-security: cryptographic plumbing for the kiosk.
//
// Captured scanner data is sealed with a per-session AES-256-GCM key before it
// leaves the driver. Audit records reference payloads only by digest.

pub mod audit;
pub mod cipher;
pub mod integrity;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use cipher::{EncryptedPayload, SessionCipher};
pub use integrity::{hash_bytes, payload_digest};
