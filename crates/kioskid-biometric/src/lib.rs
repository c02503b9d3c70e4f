// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kioskid-biometric: enrollment and identification for the kiosk.
//
// Pure in-memory computation: nothing in this crate performs I/O or
// suspends. Each matcher owns a `TemplateStore`; the `BiometricManager`
// owns one matcher per modality.

pub mod extract;
pub mod face;
pub mod fingerprint;
pub mod manager;
pub mod registry;
mod scoring;

pub use extract::{face_signature_from_image, face_signature_from_rgba};
pub use face::{FaceMatcher, pearson_correlation};
pub use fingerprint::{FingerprintMatcher, positional_agreement};
pub use manager::BiometricManager;
pub use registry::{InMemoryStore, TemplateStore};
