// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: owns one biometric manager, one scanner driver,
// one tag scanner and the audit log for a single kiosk.
//
// The manager and the audit log are plain `std::sync::Mutex`es: every call
// into them is short and never suspends. The scanner driver suspends on
// serial I/O and sits behind a `tokio::sync::Mutex` so only one connect or
// capture is in flight at a time.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kioskid_biometric::BiometricManager;
use kioskid_bridge::{MemoryBridge, PlatformBridge, SerialPortInfo, TagEvent, platform_bridge};
use kioskid_core::error::Result;
use kioskid_core::human_errors::{HumanError, humanize_error};
use kioskid_core::{
    FaceSignature, FingerprintTemplate, KioskConfig, Modality, ScannerState, TagReading, WorkerId,
};
use kioskid_device::{SecureScannerDriver, TagScanner};
use kioskid_security::{AuditAction, AuditEntry, AuditLog, payload_digest};
use serde::Serialize;
use tracing::{error, info, warn};

use super::data_dir;

/// File name of the audit database inside the data directory.
const AUDIT_DB: &str = "audit.db";

/// Bytes returned by the simulated scanner for its one scripted capture.
const SIMULATED_TEMPLATE: &[u8] = b"\x46\x4d\x52\x00\x20\x32\x30\x00simulated-minutiae";

/// Serial number presented by the simulated proximity reader.
const SIMULATED_TAG: &str = "04A1B2C3D4E5";

/// Subject recorded when an authentication attempt matched nobody.
const UNIDENTIFIED: &str = "unidentified";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What this kiosk can do right now.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    pub platform: String,
    pub simulated: bool,
    pub serial_available: bool,
    pub tag_reader_available: bool,
    pub scanner_state: ScannerState,
    pub face_enrolled: usize,
    pub fingerprint_enrolled: usize,
    pub audit_entries: u64,
    pub data_dir: PathBuf,
}

/// Shared kiosk services. Cheap to clone; clones share every component.
#[derive(Clone)]
pub struct KioskServices {
    bridge: Arc<dyn PlatformBridge>,
    biometrics: Arc<Mutex<BiometricManager>>,
    scanner: Arc<tokio::sync::Mutex<SecureScannerDriver>>,
    tags: TagScanner,
    audit_log: Arc<Mutex<AuditLog>>,
    data_dir: PathBuf,
    config: Arc<Mutex<KioskConfig>>,
}

impl KioskServices {
    /// Initialise all services from the data directory. Call once at startup.
    pub fn init() -> Result<Self> {
        let dir = data_dir::data_dir()?;
        info!(path = %dir.display(), "initialising kiosk services");

        let config = match KioskConfig::load(&dir) {
            Ok(Some(config)) => config,
            Ok(None) => KioskConfig::default(),
            Err(e) => {
                warn!(error = %e, "config unreadable, using defaults");
                KioskConfig::default()
            }
        };
        let audit_log = AuditLog::open(dir.join(AUDIT_DB))?;
        let bridge = select_bridge(&config);

        Ok(Self::assemble(bridge, config, audit_log, dir))
    }

    /// Default config and an in-memory audit log, for when the data
    /// directory is unusable.
    pub fn fallback() -> Result<Self> {
        let config = KioskConfig::default();
        let audit_log = AuditLog::open_in_memory()?;
        let bridge = select_bridge(&config);
        Ok(Self::assemble(bridge, config, audit_log, std::env::temp_dir()))
    }

    /// Wire services around an explicit bridge and audit log.
    pub fn assemble(
        bridge: Arc<dyn PlatformBridge>,
        config: KioskConfig,
        audit_log: AuditLog,
        data_dir: PathBuf,
    ) -> Self {
        let biometrics = BiometricManager::new()
            .with_thresholds(config.face_threshold, config.fingerprint_threshold);
        let scanner = SecureScannerDriver::new(Arc::clone(&bridge), &config);
        let tags = TagScanner::new(Arc::clone(&bridge));
        info!(platform = bridge.platform_name(), "kiosk services assembled");

        Self {
            bridge,
            biometrics: Arc::new(Mutex::new(biometrics)),
            scanner: Arc::new(tokio::sync::Mutex::new(scanner)),
            tags,
            audit_log: Arc::new(Mutex::new(audit_log)),
            data_dir,
            config: Arc::new(Mutex::new(config)),
        }
    }

    // -- Biometrics ----------------------------------------------------------

    pub fn enroll(
        &self,
        worker_id: WorkerId,
        face: Option<FaceSignature>,
        fingerprint: Option<FingerprintTemplate>,
    ) -> Vec<Modality> {
        let enrolled = lock(&self.biometrics).enroll(worker_id.clone(), face, fingerprint);
        if !enrolled.is_empty() {
            let details = enrolled
                .iter()
                .map(Modality::as_str)
                .collect::<Vec<_>>()
                .join(",");
            self.audit(AuditAction::Enroll, worker_id.as_str(), true, Some(&details));
        }
        enrolled
    }

    pub fn authenticate_face(&self, signature: &FaceSignature) -> Option<WorkerId> {
        let verdict = lock(&self.biometrics).authenticate_by_face(signature);
        self.audit_verdict(Modality::Face, verdict.as_ref());
        verdict
    }

    pub fn authenticate_fingerprint(&self, template: &FingerprintTemplate) -> Option<WorkerId> {
        let verdict = lock(&self.biometrics).authenticate_by_fingerprint(template);
        self.audit_verdict(Modality::Fingerprint, verdict.as_ref());
        verdict
    }

    fn audit_verdict(&self, modality: Modality, verdict: Option<&WorkerId>) {
        let subject = verdict.map_or(UNIDENTIFIED, WorkerId::as_str);
        self.audit(
            AuditAction::Authenticate,
            subject,
            verdict.is_some(),
            Some(modality.as_str()),
        );
    }

    /// Wipe every enrollment.
    pub fn clear_registry(&self) {
        lock(&self.biometrics).clear_all();
        self.audit(AuditAction::ClearRegistry, "all", true, None);
    }

    pub fn enrolled_count(&self, modality: Modality) -> usize {
        lock(&self.biometrics).enrolled_count(modality)
    }

    // -- Fingerprint scanner -------------------------------------------------

    pub async fn connect_scanner(&self) -> bool {
        let mut scanner = self.scanner.lock().await;
        let connected = scanner.connect().await;
        let cause = scanner.last_error().map(ToString::to_string);
        self.audit(
            AuditAction::ScannerConnect,
            scanner.port_name().unwrap_or("none"),
            connected,
            cause.as_deref(),
        );
        connected
    }

    /// Capture one template, sealed under the current session key.
    ///
    /// Successful captures are audited under the digest of the encoded
    /// payload, never the plaintext.
    pub async fn capture_template(&self) -> Option<String> {
        let mut scanner = self.scanner.lock().await;
        let encoded = scanner.capture_and_encrypt_template().await;
        match &encoded {
            Some(payload) => {
                self.audit(AuditAction::ScannerCapture, &payload_digest(payload), true, None)
            }
            None => {
                let cause = scanner.last_error().map(ToString::to_string);
                self.audit(
                    AuditAction::ScannerCapture,
                    scanner.port_name().unwrap_or("none"),
                    false,
                    cause.as_deref(),
                );
            }
        }
        encoded
    }

    pub async fn disconnect_scanner(&self) {
        let mut scanner = self.scanner.lock().await;
        let port = scanner.port_name().map(str::to_owned);
        scanner.disconnect();
        if let Some(port) = port {
            self.audit(AuditAction::ScannerDisconnect, &port, true, None);
        }
    }

    pub async fn scanner_state(&self) -> ScannerState {
        self.scanner.lock().await.state()
    }

    /// Operator-facing description of the last scanner failure, if the
    /// last operation failed.
    pub async fn scanner_error(&self) -> Option<HumanError> {
        self.scanner.lock().await.last_error().map(humanize_error)
    }

    // -- Proximity tags ------------------------------------------------------

    pub fn tag_reader_available(&self) -> bool {
        self.tags.is_available()
    }

    /// Read one tag, waiting at most `timeout_ms` (or the configured default).
    pub async fn scan_tag(&self, timeout_ms: Option<u64>) -> Result<TagReading> {
        let timeout_ms = timeout_ms.unwrap_or_else(|| lock(&self.config).tag_scan_timeout_ms);
        let result = self.tags.scan(timeout_ms).await;
        match &result {
            Ok(reading) => self.audit(AuditAction::TagScan, &reading.serial_number, true, None),
            Err(e) => self.audit(AuditAction::TagScan, "none", false, Some(&e.to_string())),
        }
        result
    }

    // -- Probe ---------------------------------------------------------------

    pub async fn probe(&self) -> CapabilityReport {
        let (face_enrolled, fingerprint_enrolled) = {
            let manager = lock(&self.biometrics);
            (
                manager.enrolled_count(Modality::Face),
                manager.enrolled_count(Modality::Fingerprint),
            )
        };
        let audit_entries = self.audit_count().unwrap_or_else(|e| {
            warn!(error = %e, "audit log unreadable");
            0
        });
        let simulated = lock(&self.config).simulate_hardware;
        let scanner_state = self.scanner_state().await;

        CapabilityReport {
            platform: self.bridge.platform_name().to_owned(),
            simulated,
            serial_available: self.bridge.serial_available(),
            tag_reader_available: self.tags.is_available(),
            scanner_state,
            face_enrolled,
            fingerprint_enrolled,
            audit_entries,
            data_dir: self.data_dir.clone(),
        }
    }

    // -- Audit ---------------------------------------------------------------

    /// Record an audit entry. Failures are logged, never surfaced.
    pub fn audit(&self, action: AuditAction, subject: &str, success: bool, details: Option<&str>) {
        if !lock(&self.config).audit_enabled {
            return;
        }
        if let Err(e) = lock(&self.audit_log).record(action, subject, success, details) {
            error!(error = %e, "failed to record audit entry");
        }
    }

    pub fn recent_audit_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        lock(&self.audit_log).recent_entries(limit)
    }

    pub fn audit_entries_for(&self, subject: &str) -> Result<Vec<AuditEntry>> {
        lock(&self.audit_log).entries_for_subject(subject)
    }

    pub fn audit_count(&self) -> Result<u64> {
        lock(&self.audit_log).count()
    }

    // -- Config --------------------------------------------------------------

    pub fn config(&self) -> KioskConfig {
        lock(&self.config).clone()
    }

    /// Persist `config` and apply its thresholds. Bridge and scanner
    /// settings take effect on the next start.
    pub fn save_config(&self, config: &KioskConfig) -> Result<()> {
        config.persist(&self.data_dir)?;
        lock(&self.biometrics).set_thresholds(config.face_threshold, config.fingerprint_threshold);
        *lock(&self.config) = config.clone();
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn select_bridge(config: &KioskConfig) -> Arc<dyn PlatformBridge> {
    if config.simulate_hardware {
        info!("hardware simulation enabled");
        Arc::new(simulated_bridge(config))
    } else {
        platform_bridge()
    }
}

/// One granted scanner from the allow-list that answers a single capture,
/// and a reader that presents one tag shortly after the first scan starts.
fn simulated_bridge(config: &KioskConfig) -> MemoryBridge {
    let bridge = MemoryBridge::new();
    if let Some(entry) = config.scanners.first() {
        bridge.attach_granted_port(SerialPortInfo::usb(
            "sim://scanner0",
            entry.vendor_id,
            entry.product_id,
        ));
    }
    bridge
        .push_response(SIMULATED_TEMPLATE.to_vec())
        .set_tag_reader(true)
        .push_tag_event(
            Duration::from_millis(250),
            TagEvent::Reading {
                serial_number: SIMULATED_TAG.into(),
            },
        );
    bridge
}
