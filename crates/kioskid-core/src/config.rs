// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kiosk configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DEFAULT_SCANNER_ALLOW_LIST, MatchThreshold, ScannerAllowListEntry};

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persistent kiosk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Minimum correlation for a face identification.
    pub face_threshold: MatchThreshold,
    /// Minimum positional agreement for a fingerprint identification.
    pub fingerprint_threshold: MatchThreshold,
    /// Upper bound on a single proximity-tag scan.
    pub tag_scan_timeout_ms: u64,
    /// Supported scanner hardware.
    pub scanners: Vec<ScannerAllowListEntry>,
    /// Command written to the scanner to trigger one capture.
    pub capture_command: Vec<u8>,
    /// Largest capture response accepted from the scanner.
    pub max_response_bytes: usize,
    /// Apply each allow-list entry's `timeout_ms` as a read deadline.
    pub enforce_read_timeout: bool,
    /// Record enroll/authenticate/capture events in the audit log.
    pub audit_enabled: bool,
    /// Use the in-memory scripted bridge instead of native transports.
    pub simulate_hardware: bool,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            face_threshold: MatchThreshold::FACE_DEFAULT,
            fingerprint_threshold: MatchThreshold::FINGERPRINT_DEFAULT,
            tag_scan_timeout_ms: 30_000,
            scanners: DEFAULT_SCANNER_ALLOW_LIST.to_vec(),
            capture_command: b"CAPTURE\r\n".to_vec(),
            max_response_bytes: 4096,
            enforce_read_timeout: true,
            audit_enabled: true,
            simulate_hardware: false,
        }
    }
}

impl KioskConfig {
    /// Load `config.json` from `data_dir`. Returns `Ok(None)` if no file exists.
    pub fn load(data_dir: &Path) -> Result<Option<Self>> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Write this config as pretty JSON into `data_dir`.
    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}
