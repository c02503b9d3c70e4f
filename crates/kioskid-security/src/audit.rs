// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only SQLite log of identity-relevant kiosk events.
//
// Schema:
//   audit_log(
//     id        INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp TEXT    NOT NULL,   -- RFC 3339
//     action    TEXT    NOT NULL,   -- see `AuditAction`
//     subject   TEXT    NOT NULL,   -- worker id, payload digest or tag serial
//     success   INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details   TEXT                -- optional free-form context
//   )
//
// No signature, template or key material is ever written here.

use std::path::Path;

use chrono::Utc;
use kioskid_core::error::KioskError;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS audit_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT    NOT NULL,
    action    TEXT    NOT NULL,
    subject   TEXT    NOT NULL,
    success   INTEGER NOT NULL,
    details   TEXT
);";

// ---------------------------------------------------------------------------
// Local error helpers
// ---------------------------------------------------------------------------

fn db_err(e: rusqlite::Error) -> KioskError {
    KioskError::Database(e.to_string())
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Kinds of event recorded in the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Enroll,
    Authenticate,
    ClearRegistry,
    ScannerConnect,
    ScannerCapture,
    ScannerDisconnect,
    TagScan,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enroll => "enroll",
            Self::Authenticate => "authenticate",
            Self::ClearRegistry => "clear_registry",
            Self::ScannerConnect => "scanner_connect",
            Self::ScannerCapture => "scanner_capture",
            Self::ScannerDisconnect => "scanner_disconnect",
            Self::TagScan => "tag_scan",
        }
    }
}

/// A single entry in the audit log, used for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub subject: String,
    pub success: bool,
    pub details: Option<String>,
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        action: row.get(2)?,
        subject: row.get(3)?,
        success: row.get::<_, i32>(4)? != 0,
        details: row.get(5)?,
    })
}

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

/// Append-only audit log backed by a SQLite database.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`, with WAL enabled.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KioskError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("audit log opened");
        Ok(Self { conn })
    }

    /// Open an in-memory audit database; entries vanish with the process.
    pub fn open_in_memory() -> Result<Self, KioskError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("in-memory audit log opened");
        Ok(Self { conn })
    }

    /// Record a new audit entry.
    #[instrument(skip(self, details), fields(action = action.as_str(), %subject, success))]
    pub fn record(
        &self,
        action: AuditAction,
        subject: &str,
        success: bool,
        details: Option<&str>,
    ) -> Result<(), KioskError> {
        let timestamp = Utc::now().to_rfc3339();
        let success_int: i32 = if success { 1 } else { 0 };

        self.conn
            .execute(
                "INSERT INTO audit_log (timestamp, action, subject, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![timestamp, action.as_str(), subject, success_int, details],
            )
            .map_err(db_err)?;

        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for `subject`, oldest first.
    pub fn entries_for_subject(&self, subject: &str) -> Result<Vec<AuditEntry>, KioskError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, action, subject, success, details
                 FROM audit_log
                 WHERE subject = ?1
                 ORDER BY id ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![subject], entry_from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, KioskError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, action, subject, success, details
                 FROM audit_log
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;

        let rows = stmt.query_map(params![limit], entry_from_row).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn count(&self) -> Result<u64, KioskError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }
}
