// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fingerprint matcher: positional byte agreement between templates.

use kioskid_core::{FingerprintTemplate, MatchResult, MatchThreshold, WorkerId};
use tracing::{debug, instrument};

use crate::registry::{InMemoryStore, TemplateStore};
use crate::scoring::best_match;

/// Fraction of byte positions at which `live` and `stored` agree exactly.
///
/// Templates of different length are not comparable and score 0.0, as do
/// two empty templates.
pub fn positional_agreement(live: &[u8], stored: &[u8]) -> f64 {
    if live.len() != stored.len() || live.is_empty() {
        return 0.0;
    }
    let matches = live.iter().zip(stored).filter(|(a, b)| a == b).count();
    matches as f64 / live.len() as f64
}

/// Identifies workers by fingerprint template.
#[derive(Debug, Clone, Default)]
pub struct FingerprintMatcher<S = InMemoryStore<FingerprintTemplate>> {
    store: S,
}

impl FingerprintMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: TemplateStore<FingerprintTemplate>> FingerprintMatcher<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    pub fn enroll(&mut self, worker_id: WorkerId, template: FingerprintTemplate) {
        debug!(%worker_id, len = template.len(), "fingerprint template enrolled");
        self.store.store(worker_id, template);
    }

    /// Best-scoring enrolled worker at or above `threshold`, if any.
    #[instrument(skip_all, fields(len = live.len(), threshold = threshold.value()))]
    pub fn find_match(
        &self,
        live: &FingerprintTemplate,
        threshold: MatchThreshold,
    ) -> Option<MatchResult> {
        let result = best_match(self.store.entries(), threshold, |stored: &FingerprintTemplate| {
            positional_agreement(live.as_bytes(), stored.as_bytes())
        });
        if let Some(m) = &result {
            debug!(worker_id = %m.worker_id, score = m.score, "fingerprint matched");
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
