// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Biometric manager: one face matcher and one fingerprint matcher behind a
// single enroll/authenticate/clear surface.
//
// No cross-modal fusion: each channel answers independently and the caller
// decides how to combine verdicts.

use kioskid_core::{
    FaceSignature, FingerprintTemplate, MatchResult, MatchThreshold, Modality, WorkerId,
};
use tracing::{info, instrument};

use crate::face::FaceMatcher;
use crate::fingerprint::FingerprintMatcher;
use crate::registry::{InMemoryStore, TemplateStore};

/// Owns both registries. Construct one per kiosk; nothing here is global.
#[derive(Debug, Clone)]
pub struct BiometricManager<
    F = InMemoryStore<FaceSignature>,
    P = InMemoryStore<FingerprintTemplate>,
> {
    face: FaceMatcher<F>,
    fingerprint: FingerprintMatcher<P>,
    face_threshold: MatchThreshold,
    fingerprint_threshold: MatchThreshold,
}

impl Default for BiometricManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BiometricManager {
    /// Empty in-memory registries with the default thresholds (0.6 face,
    /// 0.7 fingerprint).
    pub fn new() -> Self {
        Self::with_matchers(FaceMatcher::new(), FingerprintMatcher::new())
    }
}

impl<F, P> BiometricManager<F, P>
where
    F: TemplateStore<FaceSignature>,
    P: TemplateStore<FingerprintTemplate>,
{
    pub fn with_matchers(face: FaceMatcher<F>, fingerprint: FingerprintMatcher<P>) -> Self {
        Self {
            face,
            fingerprint,
            face_threshold: MatchThreshold::FACE_DEFAULT,
            fingerprint_threshold: MatchThreshold::FINGERPRINT_DEFAULT,
        }
    }

    /// Replace the thresholds used by `authenticate_by_face` and
    /// `authenticate_by_fingerprint`.
    pub fn with_thresholds(mut self, face: MatchThreshold, fingerprint: MatchThreshold) -> Self {
        self.set_thresholds(face, fingerprint);
        self
    }

    pub fn set_thresholds(&mut self, face: MatchThreshold, fingerprint: MatchThreshold) {
        self.face_threshold = face;
        self.fingerprint_threshold = fingerprint;
    }

    pub fn threshold(&self, modality: Modality) -> MatchThreshold {
        match modality {
            Modality::Face => self.face_threshold,
            Modality::Fingerprint => self.fingerprint_threshold,
        }
    }

    /// Store whichever signals are supplied. Supplying neither does nothing.
    ///
    /// Returns the modalities actually enrolled.
    #[instrument(skip(self, face, fingerprint), fields(%worker_id))]
    pub fn enroll(
        &mut self,
        worker_id: WorkerId,
        face: Option<FaceSignature>,
        fingerprint: Option<FingerprintTemplate>,
    ) -> Vec<Modality> {
        let mut enrolled = Vec::with_capacity(2);
        if let Some(signature) = face {
            self.face.enroll(worker_id.clone(), signature);
            enrolled.push(Modality::Face);
        }
        if let Some(template) = fingerprint {
            self.fingerprint.enroll(worker_id, template);
            enrolled.push(Modality::Fingerprint);
        }
        if !enrolled.is_empty() {
            info!(modalities = ?enrolled, "worker enrolled");
        }
        enrolled
    }

    /// Worker matching `signature` at the configured face threshold.
    pub fn authenticate_by_face(&self, signature: &FaceSignature) -> Option<WorkerId> {
        self.authenticate_by_face_with(signature, self.face_threshold)
    }

    pub fn authenticate_by_face_with(
        &self,
        signature: &FaceSignature,
        threshold: MatchThreshold,
    ) -> Option<WorkerId> {
        let verdict = self.identify_by_face(signature, threshold);
        info!(
            matched = verdict.is_some(),
            score = verdict.as_ref().map(|m| m.score),
            "face authentication"
        );
        verdict.map(|m| m.worker_id)
    }

    /// Like `authenticate_by_face_with`, but keeps the score.
    pub fn identify_by_face(
        &self,
        signature: &FaceSignature,
        threshold: MatchThreshold,
    ) -> Option<MatchResult> {
        self.face.find_match(signature, threshold)
    }

    /// Worker matching `template` at the configured fingerprint threshold.
    pub fn authenticate_by_fingerprint(&self, template: &FingerprintTemplate) -> Option<WorkerId> {
        self.authenticate_by_fingerprint_with(template, self.fingerprint_threshold)
    }

    pub fn authenticate_by_fingerprint_with(
        &self,
        template: &FingerprintTemplate,
        threshold: MatchThreshold,
    ) -> Option<WorkerId> {
        let verdict = self.identify_by_fingerprint(template, threshold);
        info!(
            matched = verdict.is_some(),
            score = verdict.as_ref().map(|m| m.score),
            "fingerprint authentication"
        );
        verdict.map(|m| m.worker_id)
    }

    pub fn identify_by_fingerprint(
        &self,
        template: &FingerprintTemplate,
        threshold: MatchThreshold,
    ) -> Option<MatchResult> {
        self.fingerprint.find_match(template, threshold)
    }

    /// Wipe both registries.
    pub fn clear_all(&mut self) {
        self.face.clear();
        self.fingerprint.clear();
        info!("all enrollments cleared");
    }

    /// Number of workers enrolled for `modality`.
    pub fn enrolled_count(&self, modality: Modality) -> usize {
        match modality {
            Modality::Face => self.face.store().len(),
            Modality::Fingerprint => self.fingerprint.store().len(),
        }
    }

    pub fn face_matcher(&self) -> &FaceMatcher<F> {
        &self.face
    }

    pub fn fingerprint_matcher(&self) -> &FingerprintMatcher<P> {
        &self.fingerprint
    }
}
