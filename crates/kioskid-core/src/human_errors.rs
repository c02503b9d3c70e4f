// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language messages for the person standing at the kiosk.
//
// Every technical error is mapped to a short message with a clear next step.
// Severity drives how the kiosk screen presents it.

use crate::error::KioskError;

/// Severity of an error from the worker's or site supervisor's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Timeout or glitch; trying again usually works.
    Transient,
    /// Someone must do something (plug in the scanner, grant access).
    ActionRequired,
    /// Retrying will not help; the kiosk needs servicing.
    Permanent,
}

/// A human-readable error with a short message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Shown as the heading on the kiosk screen.
    pub message: String,
    /// Shown as body text.
    pub suggestion: String,
    /// Whether offering a "Try again" button makes sense.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, retriable: bool, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert a `KioskError` into a `HumanError` suitable for the kiosk screen.
pub fn humanize_error(err: &KioskError) -> HumanError {
    match err {
        // -- Transport / device --
        KioskError::DeviceUnavailable => HumanError::new(
            "This kiosk can't talk to the scanner.",
            "Use your ID tag or ask a supervisor to sign you in.",
            false,
            Severity::Permanent,
        ),

        KioskError::PermissionDenied => HumanError::new(
            "Scanner access was not allowed.",
            "Ask a supervisor to allow access to the scanner, then try again.",
            false,
            Severity::ActionRequired,
        ),

        KioskError::PortOpenFailure(_) => HumanError::new(
            "The fingerprint scanner isn't connected.",
            "Check the scanner cable is plugged in, then try again.",
            true,
            Severity::ActionRequired,
        ),

        KioskError::CaptureTimeout { .. } | KioskError::EmptyRead => HumanError::new(
            "We couldn't read your fingerprint.",
            "Place your finger flat on the scanner and hold still, then try again.",
            true,
            Severity::Transient,
        ),

        KioskError::Transport(_) => HumanError::new(
            "The scanner stopped responding.",
            "Try again. If this keeps happening, unplug the scanner and plug it back in.",
            true,
            Severity::Transient,
        ),

        // -- Security --
        KioskError::EncryptionUnavailable => HumanError::new(
            "The scanner isn't ready yet.",
            "Wait a moment for the scanner to connect, then try again.",
            true,
            Severity::Transient,
        ),

        KioskError::Encryption(_) | KioskError::Decryption(_) | KioskError::InvalidPayload(_) => {
            HumanError::new(
                "There was a security problem with this scan.",
                "Please scan again. If this keeps happening, ask a supervisor to restart the kiosk.",
                true,
                Severity::Transient,
            )
        }

        // -- Tag scanning --
        KioskError::ScanTimeout { .. } => HumanError::new(
            "No ID tag was found.",
            "Hold your tag flat against the reader until you hear a beep.",
            true,
            Severity::Transient,
        ),

        KioskError::ScanError(detail) => HumanError::new(
            "The tag reader had a problem.",
            format!("Try again. If this keeps happening, the reader may need servicing. ({detail})"),
            true,
            Severity::Transient,
        ),

        // -- Matching --
        KioskError::InvalidThreshold(_) => HumanError::new(
            "The kiosk is set up incorrectly.",
            "Ask a supervisor to check the matching settings.",
            false,
            Severity::Permanent,
        ),

        KioskError::Image(_) => HumanError::new(
            "We couldn't see your face clearly.",
            "Face the camera in good light and try again.",
            true,
            Severity::Transient,
        ),

        // -- Storage --
        KioskError::Database(_) | KioskError::Serialization(_) => HumanError::new(
            "The kiosk had an internal data problem.",
            "Try again. If this keeps happening, ask a supervisor to restart the kiosk.",
            true,
            Severity::Transient,
        ),

        KioskError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError::new(
                    "The kiosk can't access its settings.",
                    "Ask a supervisor to check the kiosk's file permissions.",
                    false,
                    Severity::ActionRequired,
                )
            } else {
                HumanError::new(
                    "The kiosk had a storage problem.",
                    "Try again. If this keeps happening, the kiosk's storage may be full.",
                    true,
                    Severity::Transient,
                )
            }
        }
    }
}
