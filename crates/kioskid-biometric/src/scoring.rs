// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Best-candidate selection shared by both matchers.

use kioskid_core::{MatchResult, MatchThreshold, WorkerId};
use tracing::trace;

/// Scan `entries` in order and return the best candidate at or above
/// `threshold`.
///
/// A later candidate displaces the current best only if its score is
/// strictly greater, so on exact ties the earliest-inserted entry wins.
pub(crate) fn best_match<'a, T: 'a>(
    entries: impl Iterator<Item = (&'a WorkerId, &'a T)>,
    threshold: MatchThreshold,
    score: impl Fn(&T) -> f64,
) -> Option<MatchResult> {
    let mut best: Option<(&WorkerId, f64)> = None;

    for (worker_id, stored) in entries {
        let s = score(stored);
        trace!(%worker_id, score = s, "candidate scored");
        if s.is_nan() || s < threshold.value() {
            continue;
        }
        if best.is_none_or(|(_, best_score)| s > best_score) {
            best = Some((worker_id, s));
        }
    }

    best.map(|(worker_id, score)| MatchResult {
        worker_id: worker_id.clone(),
        score,
    })
}
