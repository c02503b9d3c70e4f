// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proximity-tag scanner: bounded, single-shot reads from an RFID/NFC reader.
//
// A scan races three outcomes: a reading, a reader error, and the timeout.
// The platform callback and the timer share a one-shot latch; whoever takes
// the sender first decides the result and every later event is dropped.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use kioskid_bridge::{PlatformBridge, TagEvent, TagEventCallback};
use kioskid_core::TagReading;
use kioskid_core::error::{KioskError, Result};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

/// Default upper bound on one scan.
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 30_000;

type Outcome = std::result::Result<String, String>;
type Latch = Arc<Mutex<Option<oneshot::Sender<Outcome>>>>;

/// Take the sender out of the latch. `None` means the race is already decided.
fn claim(latch: &Latch) -> Option<oneshot::Sender<Outcome>> {
    latch.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Listener handed to the platform. Only the first event it sees after the
/// latch is armed is forwarded; the rest are dropped.
fn listener(latch: Latch) -> TagEventCallback {
    Box::new(move |event| {
        let Some(tx) = claim(&latch) else {
            debug!("tag event after scan resolved, dropped");
            return;
        };
        let outcome = match event {
            TagEvent::Reading { serial_number } => Ok(serial_number),
            TagEvent::Error(message) => Err(message),
        };
        let _ = tx.send(outcome);
    })
}

/// Stops the reader session when the scan ends, including when the scan
/// future is dropped mid-wait.
struct ActiveSession<'a> {
    bridge: &'a dyn PlatformBridge,
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.bridge.stop_tag_session();
    }
}

fn settle(received: std::result::Result<Outcome, oneshot::error::RecvError>) -> Result<TagReading> {
    match received {
        Ok(Ok(serial_number)) => Ok(TagReading::now(serial_number)),
        Ok(Err(message)) => Err(KioskError::ScanError(message)),
        Err(_) => Err(KioskError::ScanError(
            "reader session ended without an event".into(),
        )),
    }
}

/// Reads proximity tags through the platform bridge.
#[derive(Clone)]
pub struct TagScanner {
    bridge: Arc<dyn PlatformBridge>,
}

impl TagScanner {
    pub fn new(bridge: Arc<dyn PlatformBridge>) -> Self {
        Self { bridge }
    }

    /// Whether the platform has a proximity reader.
    pub fn is_available(&self) -> bool {
        self.bridge.tag_reader_available()
    }

    /// Wait for one tag. Fails with `ScanTimeout` if nothing arrives within
    /// `timeout_ms`, and with `ScanError` if the reader reports a failure
    /// first or cannot start.
    #[instrument(skip(self))]
    pub async fn scan(&self, timeout_ms: u64) -> Result<TagReading> {
        let (tx, mut rx) = oneshot::channel::<Outcome>();
        let latch: Latch = Arc::new(Mutex::new(Some(tx)));

        self.bridge
            .start_tag_session(listener(Arc::clone(&latch)))
            .map_err(|e| {
                warn!(error = %e, "tag session failed to start");
                KioskError::ScanError(e.to_string())
            })?;
        let session = ActiveSession {
            bridge: self.bridge.as_ref(),
        };

        let result = tokio::select! {
            biased;
            received = &mut rx => settle(received),
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                if claim(&latch).is_some() {
                    Err(KioskError::ScanTimeout { timeout_ms })
                } else {
                    // The listener claimed the latch first; its value is in flight.
                    settle(rx.await)
                }
            }
        };

        drop(session);
        match &result {
            Ok(reading) => info!(serial = %reading.serial_number, "tag read"),
            Err(e) => debug!(error = %e, "tag scan ended without a reading"),
        }
        result
    }
}

impl std::fmt::Debug for TagScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagScanner")
            .field("platform", &self.bridge.platform_name())
            .finish()
    }
}

/// True for 8 to 14 hexadecimal characters.
pub fn validate_tag_id(id: &str) -> bool {
    (8..=14).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Generate a bag id: `{lot}-BAG-{last 8 of tag, uppercased}-{base36 ms}`.
///
/// Embeds the current time, so two calls never agree. This creates ids; it
/// cannot be used to look one up.
pub fn derive_bag_id(tag_id: &str, lot_id: &str) -> String {
    derive_bag_id_at(tag_id, lot_id, Utc::now().timestamp_millis())
}

/// `derive_bag_id` with an explicit Unix timestamp in milliseconds.
pub fn derive_bag_id_at(tag_id: &str, lot_id: &str, timestamp_ms: i64) -> String {
    let tail_start = tag_id
        .char_indices()
        .rev()
        .nth(7)
        .map_or(0, |(i, _)| i);
    let tail = tag_id[tail_start..].to_uppercase();
    let stamp = to_base36(u64::try_from(timestamp_ms).unwrap_or(0));
    format!("{lot_id}-BAG-{tail}-{stamp}")
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kioskid_bridge::{MemoryBridge, StubBridge};
    use std::time::Instant;

    fn scanner(bridge: &MemoryBridge) -> TagScanner {
        TagScanner::new(Arc::new(bridge.clone()))
    }

    fn reading(serial: &str) -> TagEvent {
        TagEvent::Reading {
            serial_number: serial.into(),
        }
    }

    #[tokio::test]
    async fn first_reading_wins() {
        let bridge = MemoryBridge::new();
        bridge
            .set_tag_reader(true)
            .push_tag_event(Duration::from_millis(20), reading("04A1B2C3D4"))
            .push_tag_event(Duration::from_millis(5), TagEvent::Error("late".into()));

        let tag = scanner(&bridge).scan(1_000).await.unwrap();
        assert_eq!(tag.serial_number, "04A1B2C3D4");
        assert!(tag.timestamp_ms > 0);
        assert_eq!(bridge.tag_stop_count(), 1);
    }

    #[tokio::test]
    async fn reader_error_fails_scan() {
        let bridge = MemoryBridge::new();
        bridge
            .set_tag_reader(true)
            .push_tag_event(Duration::from_millis(10), TagEvent::Error("antenna fault".into()));

        let err = scanner(&bridge).scan(1_000).await.unwrap_err();
        assert!(matches!(err, KioskError::ScanError(ref m) if m == "antenna fault"));
    }

    #[tokio::test]
    async fn times_out_promptly() {
        let bridge = MemoryBridge::new();
        bridge.set_tag_reader(true);

        let started = Instant::now();
        let err = scanner(&bridge).scan(100).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, KioskError::ScanTimeout { timeout_ms: 100 }));
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");
        assert_eq!(bridge.tag_stop_count(), 1);
    }

    #[tokio::test]
    async fn late_reading_after_timeout_is_ignored() {
        let bridge = MemoryBridge::new();
        bridge
            .set_tag_reader(true)
            .push_tag_event(Duration::from_millis(150), reading("DEADBEEF"));
        let scanner = scanner(&bridge);

        let err = scanner.scan(30).await.unwrap_err();
        assert!(matches!(err, KioskError::ScanTimeout { .. }));
        assert_eq!(bridge.tag_stop_count(), 1);

        // The stale reading is due while the next scan is live.
        bridge.push_tag_event(Duration::from_millis(200), reading("CAFEF00D"));
        let tag = scanner.scan(1_000).await.unwrap();
        assert_eq!(tag.serial_number, "CAFEF00D");
        assert_eq!(bridge.tag_stop_count(), 2);
    }

    #[tokio::test]
    async fn listener_forwards_only_the_first_event() {
        let (tx, rx) = oneshot::channel::<Outcome>();
        let latch: Latch = Arc::new(Mutex::new(Some(tx)));
        let on_event = listener(Arc::clone(&latch));

        on_event(reading("04A1B2C3"));
        on_event(TagEvent::Error("second".into()));
        on_event(reading("FFFFFFFF"));

        assert!(claim(&latch).is_none());
        assert_eq!(rx.await.unwrap(), Ok("04A1B2C3".to_string()));
    }

    #[tokio::test]
    async fn listener_is_silent_once_timer_has_claimed() {
        let (tx, mut rx) = oneshot::channel::<Outcome>();
        let latch: Latch = Arc::new(Mutex::new(Some(tx)));
        let on_event = listener(Arc::clone(&latch));

        let timer_claim = claim(&latch);
        assert!(timer_claim.is_some());
        on_event(reading("DEADBEEF"));

        assert!(rx.try_recv().is_err());
        drop(timer_claim);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn cancelled_scan_stops_the_reader() {
        let bridge = MemoryBridge::new();
        bridge.set_tag_reader(true);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), scanner(&bridge).scan(5_000)).await;
        assert!(cancelled.is_err());
        assert_eq!(bridge.tag_stop_count(), 1);
    }

    #[tokio::test]
    async fn unavailable_reader_is_scan_error() {
        let scanner = TagScanner::new(Arc::new(StubBridge));
        assert!(!scanner.is_available());
        assert!(matches!(
            scanner.scan(50).await,
            Err(KioskError::ScanError(_))
        ));
    }

    #[test]
    fn tag_id_validation() {
        assert!(validate_tag_id("1A2B3C4D"));
        assert!(validate_tag_id("04a1b2c3d4e5f6"));
        assert!(!validate_tag_id("xyz"));
        assert!(!validate_tag_id("1A2B3C4"));
        assert!(!validate_tag_id("1A2B3C4D5E6F7081"));
        assert!(!validate_tag_id("1A2B3C4G"));
        assert!(!validate_tag_id(""));
    }

    #[test]
    fn bag_id_layout() {
        assert_eq!(
            derive_bag_id_at("04a1b2c3d4e5", "LOT7", 1_700_000_000_000),
            "LOT7-BAG-B2C3D4E5-LOYW3V28"
        );
        assert_eq!(derive_bag_id_at("abc", "L", 35), "L-BAG-ABC-Z");
    }

    #[test]
    fn bag_id_embeds_current_time() {
        let id = derive_bag_id("04A1B2C3D4E5", "LOT1");
        let stamp = id.rsplit('-').next().unwrap();
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap();
        let parsed = u64::from_str_radix(stamp, 36).unwrap();
        assert!(parsed <= now && now - parsed < 5_000);
        assert!(id.starts_with("LOT1-BAG-B2C3D4E5-"));
    }
}
