// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Face matcher: Pearson correlation between a live signature and every
// enrolled signature.

use kioskid_core::{FaceSignature, MatchResult, MatchThreshold, WorkerId};
use tracing::{debug, instrument};

use crate::registry::{InMemoryStore, TemplateStore};
use crate::scoring::best_match;

/// Pearson correlation coefficient of two equal-length vectors.
///
/// ```text
/// r = (Σxy − Σx·Σy/n) / √((Σx² − (Σx)²/n) · (Σy² − (Σy)²/n))
/// ```
///
/// Returns 0.0 for vectors of different length, for empty vectors, and
/// whenever the denominator is zero (a constant vector has no variance).
pub fn pearson_correlation(live: &[f64], stored: &[f64]) -> f64 {
    if live.len() != stored.len() || live.is_empty() {
        return 0.0;
    }

    let n = live.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx, mut sum_yy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in live.iter().zip(stored) {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
        sum_yy += y * y;
    }

    let numerator = sum_xy - sum_x * sum_y / n;
    let denominator = ((sum_xx - sum_x * sum_x / n) * (sum_yy - sum_y * sum_y / n)).sqrt();
    // Rounding can push a near-zero variance negative; sqrt then yields NaN.
    if denominator.is_nan() || denominator <= 0.0 {
        return 0.0;
    }

    (numerator / denominator).clamp(-1.0, 1.0)
}

/// Identifies workers by face signature.
#[derive(Debug, Clone, Default)]
pub struct FaceMatcher<S = InMemoryStore<FaceSignature>> {
    store: S,
}

impl FaceMatcher {
    /// A matcher over a fresh, empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: TemplateStore<FaceSignature>> FaceMatcher<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Register (or replace) `worker_id`'s face signature.
    pub fn enroll(&mut self, worker_id: WorkerId, signature: FaceSignature) {
        debug!(%worker_id, len = signature.len(), "face signature enrolled");
        self.store.store(worker_id, signature);
    }

    /// Best-scoring enrolled worker at or above `threshold`, if any.
    ///
    /// Entries whose length differs from `live` score 0.0 and so never pass.
    #[instrument(skip_all, fields(len = live.len(), threshold = threshold.value()))]
    pub fn find_match(&self, live: &FaceSignature, threshold: MatchThreshold) -> Option<MatchResult> {
        let result = best_match(self.store.entries(), threshold, |stored: &FaceSignature| {
            pearson_correlation(live.values(), stored.values())
        });
        match &result {
            Some(m) => debug!(worker_id = %m.worker_id, score = m.score, "face matched"),
            None => debug!(candidates = self.store.len(), "no face match"),
        }
        result
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(values: &[f64]) -> FaceSignature {
        FaceSignature::new(values.to_vec())
    }

    fn threshold(v: f64) -> MatchThreshold {
        MatchThreshold::new(v).unwrap()
    }

    #[test]
    fn self_correlation_is_exactly_one() {
        let samples = [
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.013, 0.2, 0.0007, 0.41, 0.33],
            vec![-5.5, 1e-3, 42.0, 7.25, -0.125, 3.0],
        ];
        for values in samples {
            assert_eq!(pearson_correlation(&values, &values), 1.0, "{values:?}");
        }
    }

    #[test]
    fn proportional_vectors_correlate_perfectly() {
        let r = pearson_correlation(&[1.0, 2.0, 3.0, 4.0], &[2.0, 4.0, 6.0, 8.0]);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reversed_vectors_anticorrelate() {
        let r = pearson_correlation(&[4.0, 3.0, 2.0, 1.0], &[1.0, 2.0, 3.0, 4.0]);
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_length_scores_zero() {
        assert_eq!(pearson_correlation(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 4.0]), 0.0);
        assert_eq!(pearson_correlation(&[], &[]), 0.0);
    }

    #[test]
    fn constant_vector_scores_zero() {
        assert_eq!(pearson_correlation(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn matches_enrolled_worker_at_exact_threshold() {
        let mut matcher = FaceMatcher::new();
        matcher.enroll(WorkerId::from("A"), sig(&[0.1, 0.5, 0.2, 0.9, 0.3]));
        matcher.enroll(WorkerId::from("B"), sig(&[0.9, 0.1, 0.7, 0.2, 0.6]));

        let result = matcher
            .find_match(&sig(&[0.1, 0.5, 0.2, 0.9, 0.3]), MatchThreshold::EXACT)
            .expect("self match");
        assert_eq!(result.worker_id.as_str(), "A");
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn proportional_scenario() {
        let mut matcher = FaceMatcher::new();
        matcher.enroll(WorkerId::from("A"), sig(&[1.0, 2.0, 3.0, 4.0]));

        let hit = matcher.find_match(&sig(&[2.0, 4.0, 6.0, 8.0]), threshold(0.5));
        assert_eq!(hit.map(|m| m.worker_id), Some(WorkerId::from("A")));

        assert!(
            matcher
                .find_match(&sig(&[4.0, 3.0, 2.0, 1.0]), threshold(0.5))
                .is_none()
        );
    }

    #[test]
    fn empty_registry_never_matches() {
        let matcher = FaceMatcher::new();
        for t in [0.01, 0.5, 1.0] {
            assert!(matcher.find_match(&sig(&[1.0, 2.0]), threshold(t)).is_none());
        }
    }

    #[test]
    fn other_lengths_are_ignored() {
        let mut matcher = FaceMatcher::new();
        matcher.enroll(WorkerId::from("short"), sig(&[1.0, 2.0, 3.0]));
        matcher.enroll(WorkerId::from("long"), sig(&[1.0, 2.0, 3.0, 4.0, 5.0]));

        let result = matcher
            .find_match(&sig(&[1.0, 2.0, 3.0, 4.0, 5.0]), threshold(0.01))
            .unwrap();
        assert_eq!(result.worker_id.as_str(), "long");
    }

    #[test]
    fn tie_goes_to_earlier_enrollment() {
        let mut matcher = FaceMatcher::new();
        let shared = sig(&[0.3, 0.1, 0.8, 0.4]);
        matcher.enroll(WorkerId::from("first"), shared.clone());
        matcher.enroll(WorkerId::from("second"), shared.clone());

        let result = matcher.find_match(&shared, threshold(0.6)).unwrap();
        assert_eq!(result.worker_id.as_str(), "first");
    }

    #[test]
    fn re_enrollment_replaces_signature() {
        let mut matcher = FaceMatcher::new();
        matcher.enroll(WorkerId::from("A"), sig(&[1.0, 2.0, 3.0]));
        matcher.enroll(WorkerId::from("A"), sig(&[3.0, 1.0, 2.0]));

        assert_eq!(matcher.store().len(), 1);
        assert_eq!(
            matcher.store().lookup(&WorkerId::from("A")),
            Some(&sig(&[3.0, 1.0, 2.0]))
        );
    }
}
