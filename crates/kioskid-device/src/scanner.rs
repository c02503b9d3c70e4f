// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure scanner driver: owns one serial connection to an allow-listed
// fingerprint scanner and the AES-256-GCM key for that session.
//
// State machine:
//
//   Disconnected → Connecting → Connected → KeyReady ⇄ Capturing
//        ↑                                      │
//        └──────────────── disconnect ──────────┘
//
// The public surface reports `bool` / `Option`; the cause of the most recent
// failure is kept in `last_error()`. Captured bytes only ever leave the
// driver sealed under the session key.

use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::time::Duration;

use kioskid_bridge::{PlatformBridge, SerialConnection, SerialPortInfo};
use kioskid_core::error::{KioskError, Result};
use kioskid_core::{KioskConfig, ScannerAllowListEntry, ScannerState};
use kioskid_security::SessionCipher;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::allow_list::{entry_for_port, usb_filters};

// ---------------------------------------------------------------------------
// Session plumbing
// ---------------------------------------------------------------------------

/// The open port. Shared with the blocking read task so a timed-out read
/// can finish (and drop the port) after the driver has moved on.
type SharedPort = Arc<Mutex<Box<dyn SerialConnection>>>;

struct Session {
    id: Uuid,
    port_name: String,
    entry: ScannerAllowListEntry,
    port: SharedPort,
    cipher: SessionCipher,
}

/// Holds the driver in a transient state (`Connecting`, `Capturing`) and
/// puts it back to a resting state when dropped, so a cancelled call never
/// leaves the transient state behind.
struct TransientState<'a> {
    state: &'a mut ScannerState,
    resting: ScannerState,
}

impl<'a> TransientState<'a> {
    fn enter(state: &'a mut ScannerState, now: ScannerState, resting: ScannerState) -> Self {
        *state = now;
        Self { state, resting }
    }

    fn set(&mut self, now: ScannerState) {
        *self.state = now;
    }
}

impl Drop for TransientState<'_> {
    fn drop(&mut self) {
        *self.state = self.resting;
    }
}

fn join_err(e: tokio::task::JoinError) -> KioskError {
    KioskError::Transport(format!("blocking transport task failed: {e}"))
}

/// Pick a port: one already granted to the app, else prompt the user.
fn select_port(
    bridge: &dyn PlatformBridge,
    scanners: &[ScannerAllowListEntry],
) -> Result<(SerialPortInfo, ScannerAllowListEntry)> {
    let granted = bridge.list_ports()?;
    if let Some(found) = granted
        .into_iter()
        .find_map(|port| entry_for_port(scanners, &port).map(|entry| (port, entry)))
    {
        debug!(port = %found.0.port_name, "using previously granted port");
        return Ok(found);
    }

    let port = bridge
        .request_port(&usb_filters(scanners))?
        .ok_or(KioskError::PermissionDenied)?;
    let entry = entry_for_port(scanners, &port).ok_or_else(|| {
        KioskError::PortOpenFailure(format!("{} is not an allow-listed scanner", port.port_name))
    })?;
    Ok((port, entry))
}

/// Select and open a port, then generate the session key.
async fn open_session(
    bridge: &Arc<dyn PlatformBridge>,
    scanners: &[ScannerAllowListEntry],
    state: &mut TransientState<'_>,
) -> Result<Session> {
    if !bridge.serial_available() {
        return Err(KioskError::DeviceUnavailable);
    }

    let chooser = Arc::clone(bridge);
    let scanners = scanners.to_vec();
    let (port_info, entry) =
        tokio::task::spawn_blocking(move || select_port(chooser.as_ref(), &scanners))
            .await
            .map_err(join_err)??;

    let opener = Arc::clone(bridge);
    let target = port_info.clone();
    let mut conn =
        tokio::task::spawn_blocking(move || opener.open_port(&target, entry.baud_rate))
            .await
            .map_err(join_err)??;
    state.set(ScannerState::Connected);
    debug!(port = %port_info.port_name, "port open");

    let cipher = match SessionCipher::generate() {
        Ok(cipher) => cipher,
        Err(e) => {
            let _ = conn.close();
            return Err(e);
        }
    };

    Ok(Session {
        id: Uuid::new_v4(),
        port_name: port_info.port_name,
        entry,
        port: Arc::new(Mutex::new(conn)),
        cipher,
    })
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Driver for one physical fingerprint scanner.
pub struct SecureScannerDriver {
    bridge: Arc<dyn PlatformBridge>,
    scanners: Vec<ScannerAllowListEntry>,
    capture_command: Vec<u8>,
    max_response_bytes: usize,
    enforce_read_timeout: bool,
    state: ScannerState,
    session: Option<Session>,
    last_error: Option<KioskError>,
}

impl SecureScannerDriver {
    pub fn new(bridge: Arc<dyn PlatformBridge>, config: &KioskConfig) -> Self {
        Self {
            bridge,
            scanners: config.scanners.clone(),
            capture_command: config.capture_command.clone(),
            max_response_bytes: config.max_response_bytes,
            enforce_read_timeout: config.enforce_read_timeout,
            state: ScannerState::Disconnected,
            session: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    /// True iff a port handle is held.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Cause of the most recent failed `connect` or capture. Cleared by the
    /// next success.
    pub fn last_error(&self) -> Option<&KioskError> {
        self.last_error.as_ref()
    }

    /// Key for the current session, for whoever has to decrypt or wrap it.
    pub fn session_cipher(&self) -> Option<&SessionCipher> {
        self.session.as_ref().map(|s| &s.cipher)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn port_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.port_name.as_str())
    }

    /// Open an allow-listed scanner and generate a fresh session key.
    ///
    /// Returns `false` on any failure and leaves the driver `Disconnected`.
    /// Calling it while connected keeps the existing session.
    #[instrument(skip_all)]
    pub async fn connect(&mut self) -> bool {
        if self.session.is_some() {
            debug!("scanner already connected");
            return true;
        }

        let opened = {
            let mut connecting = TransientState::enter(
                &mut self.state,
                ScannerState::Connecting,
                ScannerState::Disconnected,
            );
            open_session(&self.bridge, &self.scanners, &mut connecting).await
        };
        match opened {
            Ok(session) => {
                info!(
                    session = %session.id,
                    port = %session.port_name,
                    baud_rate = session.entry.baud_rate,
                    "scanner connected, session key ready"
                );
                self.session = Some(session);
                self.state = ScannerState::KeyReady;
                self.last_error = None;
                true
            }
            Err(e) => {
                warn!(error = %e, "scanner connect failed");
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Trigger one capture and return `base64(IV || ciphertext)`.
    ///
    /// `None` before `connect`, on transport errors, on an empty response
    /// and when the read deadline passes.
    #[instrument(skip_all)]
    pub async fn capture_and_encrypt_template(&mut self) -> Option<String> {
        match self.capture().await {
            Ok(encoded) => {
                self.last_error = None;
                Some(encoded)
            }
            Err(e) => {
                warn!(error = %e, "capture failed");
                self.last_error = Some(e);
                None
            }
        }
    }

    async fn capture(&mut self) -> Result<String> {
        let (port, timeout_ms) = match &self.session {
            Some(s) if self.state >= ScannerState::KeyReady => {
                (Arc::clone(&s.port), s.entry.timeout_ms)
            }
            _ => return Err(KioskError::EncryptionUnavailable),
        };

        let command = self.capture_command.clone();
        let max_len = self.max_response_bytes;
        let enforce_deadline = self.enforce_read_timeout;

        let joined = {
            let _capturing = TransientState::enter(
                &mut self.state,
                ScannerState::Capturing,
                ScannerState::KeyReady,
            );
            let exchange = tokio::task::spawn_blocking(move || {
                let mut conn = port.lock().unwrap_or_else(PoisonError::into_inner);
                conn.write_all(&command)?;
                conn.read_response(max_len)
            });
            if enforce_deadline {
                tokio::time::timeout(Duration::from_millis(timeout_ms), exchange)
                    .await
                    .map_err(|_| KioskError::CaptureTimeout { timeout_ms })?
            } else {
                exchange.await
            }
        };

        let raw = Zeroizing::new(joined.map_err(join_err)??);
        if raw.is_empty() {
            return Err(KioskError::EmptyRead);
        }

        let session = self
            .session
            .as_ref()
            .ok_or(KioskError::EncryptionUnavailable)?;
        let payload = session.cipher.seal(&raw)?;
        debug!(session = %session.id, captured = raw.len(), "capture sealed");
        Ok(payload.to_base64())
    }

    /// Close the port and discard the session key. Safe from any state and
    /// safe to repeat.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            let Session {
                id, port, cipher, ..
            } = session;
            drop(cipher);
            match port.try_lock() {
                Ok(mut conn) => {
                    if let Err(e) = conn.close() {
                        warn!(error = %e, "error closing scanner port");
                    }
                }
                Err(TryLockError::WouldBlock) => {
                    debug!("read still in flight; port closes when it returns");
                }
                Err(TryLockError::Poisoned(poisoned)) => {
                    let _ = poisoned.into_inner().close();
                }
            }
            info!(session = %id, "scanner disconnected");
        }
        self.state = ScannerState::Disconnected;
    }
}

impl Drop for SecureScannerDriver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for SecureScannerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureScannerDriver")
            .field("platform", &self.bridge.platform_name())
            .field("state", &self.state)
            .field("port", &self.port_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kioskid_bridge::{MemoryBridge, StubBridge};

    const SCANNER_VID: u16 = 0x04d8;
    const SCANNER_PID: u16 = 0xf372;

    fn scanner_port() -> SerialPortInfo {
        SerialPortInfo::usb("/dev/ttyACM0", SCANNER_VID, SCANNER_PID)
    }

    fn driver_with(bridge: &MemoryBridge, config: &KioskConfig) -> SecureScannerDriver {
        SecureScannerDriver::new(Arc::new(bridge.clone()), config)
    }

    fn driver(bridge: &MemoryBridge) -> SecureScannerDriver {
        driver_with(bridge, &KioskConfig::default())
    }

    #[tokio::test]
    async fn cancelled_connect_returns_to_disconnected() {
        let bridge = MemoryBridge::new();
        bridge
            .attach_port(scanner_port())
            .set_prompt_delay(Duration::from_millis(200));
        let mut driver = driver(&bridge);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), driver.connect()).await;
        assert!(cancelled.is_err());
        assert_eq!(driver.state(), ScannerState::Disconnected);
        assert!(!driver.is_connected());

        // The abandoned prompt does not block a fresh attempt.
        bridge.set_prompt_delay(Duration::ZERO);
        assert!(driver.connect().await);
        assert_eq!(driver.state(), ScannerState::KeyReady);
    }

    #[tokio::test]
    async fn cancelled_capture_returns_to_key_ready() {
        let bridge = MemoryBridge::new();
        bridge
            .attach_port(scanner_port())
            .push_response(vec![9; 16])
            .set_response_delay(Duration::from_millis(200));
        let mut driver = driver(&bridge);
        assert!(driver.connect().await);

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            driver.capture_and_encrypt_template(),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(driver.state(), ScannerState::KeyReady);
        assert!(driver.is_connected());

        driver.disconnect();
        assert_eq!(driver.state(), ScannerState::Disconnected);
    }

    #[tokio::test]
    async fn capture_before_connect_is_none() {
        let bridge = MemoryBridge::new();
        bridge.push_response(vec![1, 2, 3]);
        let mut driver = driver(&bridge);

        assert!(driver.capture_and_encrypt_template().await.is_none());
        assert!(matches!(
            driver.last_error(),
            Some(KioskError::EncryptionUnavailable)
        ));
        assert!(bridge.written().is_empty());
    }

    #[tokio::test]
    async fn connect_through_prompt() {
        let bridge = MemoryBridge::new();
        bridge.attach_port(scanner_port());
        let mut driver = driver(&bridge);

        assert!(driver.connect().await);
        assert!(driver.is_connected());
        assert_eq!(driver.state(), ScannerState::KeyReady);
        assert_eq!(driver.port_name(), Some("/dev/ttyACM0"));
        assert!(driver.session_cipher().is_some());
        assert!(driver.last_error().is_none());

        // A second connect keeps the session.
        let id = driver.session_id();
        assert!(driver.connect().await);
        assert_eq!(driver.session_id(), id);
        assert_eq!(bridge.open_count(), 1);
    }

    #[tokio::test]
    async fn granted_port_skips_prompt() {
        let bridge = MemoryBridge::new();
        bridge.attach_granted_port(scanner_port()).cancel_prompt();
        let mut driver = driver(&bridge);
        assert!(driver.connect().await);
    }

    #[tokio::test]
    async fn cancelled_prompt_fails_with_permission_denied() {
        let bridge = MemoryBridge::new();
        bridge.attach_port(scanner_port()).cancel_prompt();
        let mut driver = driver(&bridge);

        assert!(!driver.connect().await);
        assert_eq!(driver.state(), ScannerState::Disconnected);
        assert!(matches!(driver.last_error(), Some(KioskError::PermissionDenied)));
    }

    #[tokio::test]
    async fn unlisted_device_is_not_opened() {
        let bridge = MemoryBridge::new();
        bridge.attach_granted_port(SerialPortInfo::usb("/dev/ttyUSB3", 0x1234, 0x5678));
        let mut driver = driver(&bridge);

        assert!(!driver.connect().await);
        assert!(matches!(driver.last_error(), Some(KioskError::PortOpenFailure(_))));
        assert_eq!(bridge.open_count(), 0);
    }

    #[tokio::test]
    async fn open_failure_leaves_driver_disconnected() {
        let bridge = MemoryBridge::new();
        bridge.attach_port(scanner_port()).fail_open("device busy");
        let mut driver = driver(&bridge);

        assert!(!driver.connect().await);
        assert!(!driver.is_connected());
        assert_eq!(driver.state(), ScannerState::Disconnected);
        assert!(matches!(driver.last_error(), Some(KioskError::PortOpenFailure(_))));
    }

    #[tokio::test]
    async fn missing_serial_support_is_device_unavailable() {
        let mut driver = SecureScannerDriver::new(Arc::new(StubBridge), &KioskConfig::default());
        assert!(!driver.connect().await);
        assert!(matches!(driver.last_error(), Some(KioskError::DeviceUnavailable)));
    }

    #[tokio::test]
    async fn capture_round_trips_under_session_key() {
        let bridge = MemoryBridge::new();
        let template: Vec<u8> = (0u8..=200).collect();
        bridge.attach_port(scanner_port()).push_response(template.clone());
        let mut driver = driver(&bridge);
        assert!(driver.connect().await);

        let encoded = driver.capture_and_encrypt_template().await.expect("capture");
        assert_eq!(driver.state(), ScannerState::KeyReady);
        assert_eq!(bridge.written(), vec![b"CAPTURE\r\n".to_vec()]);

        let cipher = driver.session_cipher().unwrap();
        assert_eq!(cipher.open_base64(&encoded).unwrap(), template);
    }

    #[tokio::test]
    async fn each_capture_uses_a_fresh_iv() {
        let bridge = MemoryBridge::new();
        bridge
            .attach_port(scanner_port())
            .push_response(vec![7; 32])
            .push_response(vec![7; 32]);
        let mut driver = driver(&bridge);
        assert!(driver.connect().await);

        let a = driver.capture_and_encrypt_template().await.unwrap();
        let b = driver.capture_and_encrypt_template().await.unwrap();
        let iv = |s: &str| kioskid_security::EncryptedPayload::from_base64(s).unwrap().iv;
        assert_ne!(iv(&a), iv(&b));
    }

    #[tokio::test]
    async fn empty_and_failed_reads_are_none() {
        let bridge = MemoryBridge::new();
        bridge
            .attach_port(scanner_port())
            .push_response(Vec::<u8>::new())
            .push_read_error("framing error");
        let mut driver = driver(&bridge);
        assert!(driver.connect().await);

        assert!(driver.capture_and_encrypt_template().await.is_none());
        assert!(matches!(driver.last_error(), Some(KioskError::EmptyRead)));

        assert!(driver.capture_and_encrypt_template().await.is_none());
        assert!(matches!(driver.last_error(), Some(KioskError::Transport(_))));

        // Failures keep the session.
        assert!(driver.is_connected());
        assert_eq!(driver.state(), ScannerState::KeyReady);
    }

    #[tokio::test]
    async fn silent_device_hits_read_deadline() {
        let bridge = MemoryBridge::new();
        bridge
            .attach_port(scanner_port())
            .push_response(vec![1, 2, 3])
            .set_response_delay(Duration::from_millis(400));
        let config = KioskConfig {
            scanners: vec![ScannerAllowListEntry {
                vendor_id: SCANNER_VID,
                product_id: SCANNER_PID,
                baud_rate: 9600,
                timeout_ms: 50,
            }],
            ..KioskConfig::default()
        };
        let mut driver = driver_with(&bridge, &config);
        assert!(driver.connect().await);

        let started = std::time::Instant::now();
        assert!(driver.capture_and_encrypt_template().await.is_none());
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(matches!(
            driver.last_error(),
            Some(KioskError::CaptureTimeout { timeout_ms: 50 })
        ));
        assert_eq!(driver.state(), ScannerState::KeyReady);

        // Disconnecting mid-read defers the close to the read task.
        driver.disconnect();
        assert!(!driver.is_connected());
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(bridge.close_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_drops_key() {
        let bridge = MemoryBridge::new();
        bridge.attach_port(scanner_port()).push_response(vec![1]);
        let mut driver = driver(&bridge);

        driver.disconnect();
        assert!(driver.connect().await);
        driver.disconnect();
        driver.disconnect();

        assert_eq!(driver.state(), ScannerState::Disconnected);
        assert!(driver.session_cipher().is_none());
        assert_eq!(bridge.close_count(), 1);
        assert!(driver.capture_and_encrypt_template().await.is_none());
    }

    #[tokio::test]
    async fn dropping_driver_closes_port() {
        let bridge = MemoryBridge::new();
        bridge.attach_port(scanner_port());
        {
            let mut driver = driver(&bridge);
            assert!(driver.connect().await);
        }
        assert_eq!(bridge.close_count(), 1);
    }
}
