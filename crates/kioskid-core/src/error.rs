// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Kioskid.
//
// Signature length mismatches and below-threshold scores are not errors:
// they are scored as 0.0 and reported as "no match" respectively.

use thiserror::Error;

/// Top-level error type for all Kioskid operations.
#[derive(Debug, Error)]
pub enum KioskError {
    // -- Transport / device --
    #[error("required transport is not available on this platform")]
    DeviceUnavailable,

    #[error("access to the device was declined")]
    PermissionDenied,

    #[error("could not open scanner port: {0}")]
    PortOpenFailure(String),

    #[error("scanner did not respond within {timeout_ms} ms")]
    CaptureTimeout { timeout_ms: u64 },

    #[error("scanner returned an empty response")]
    EmptyRead,

    #[error("transport error: {0}")]
    Transport(String),

    // -- Security --
    #[error("no session key; connect the scanner before capturing")]
    EncryptionUnavailable,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed encrypted payload: {0}")]
    InvalidPayload(String),

    // -- Tag scanning --
    #[error("no tag was read within {timeout_ms} ms")]
    ScanTimeout { timeout_ms: u64 },

    #[error("tag read failed: {0}")]
    ScanError(String),

    // -- Matching --
    #[error("match threshold {0} is outside (0, 1]")]
    InvalidThreshold(f64),

    #[error("could not derive a signature from the image: {0}")]
    Image(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KioskError>;
