// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Kioskid identity kiosk.

use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result};

/// Opaque unique identifier of an enrolled worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for WorkerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed-length face embedding (a histogram or model output).
///
/// Two signatures are only comparable when their lengths are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSignature(Vec<f64>);

impl FaceSignature {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for FaceSignature {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Opaque positional fingerprint encoding as delivered by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintTemplate(Vec<u8>);

impl FingerprintTemplate {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for FingerprintTemplate {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Minimum acceptable score for a positive identification, in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct MatchThreshold(f64);

impl MatchThreshold {
    /// Default for the face channel.
    pub const FACE_DEFAULT: Self = Self(0.6);
    /// Default for the fingerprint channel.
    pub const FINGERPRINT_DEFAULT: Self = Self(0.7);
    /// Only an exact match passes.
    pub const EXACT: Self = Self(1.0);

    pub fn new(value: f64) -> Result<Self> {
        if value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(KioskError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for MatchThreshold {
    type Error = KioskError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MatchThreshold> for f64 {
    fn from(threshold: MatchThreshold) -> Self {
        threshold.0
    }
}

/// A positive identification: the winning worker and its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub worker_id: WorkerId,
    pub score: f64,
}

/// Biometric channel, used for logging and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    Face,
    Fingerprint,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Fingerprint => "fingerprint",
        }
    }
}

/// One row of the static table of supported scanner hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerAllowListEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub baud_rate: u32,
    /// Read deadline applied to each capture response.
    pub timeout_ms: u64,
}

impl ScannerAllowListEntry {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

/// Scanners known to work with the kiosk.
pub const DEFAULT_SCANNER_ALLOW_LIST: [ScannerAllowListEntry; 2] = [
    ScannerAllowListEntry {
        vendor_id: 0x04d8,
        product_id: 0xf372,
        baud_rate: 9600,
        timeout_ms: 5000,
    },
    ScannerAllowListEntry {
        vendor_id: 0x10c4,
        product_id: 0xea60,
        baud_rate: 9600,
        timeout_ms: 5000,
    },
];

/// Lifecycle states of the secure scanner driver.
///
/// `Disconnected → Connecting → Connected → KeyReady ⇄ Capturing → Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScannerState {
    Disconnected,
    Connecting,
    Connected,
    KeyReady,
    Capturing,
}

/// A single successful proximity-tag read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReading {
    pub serial_number: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl TagReading {
    /// Stamp a reading with the current wall-clock time.
    pub fn now(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}
