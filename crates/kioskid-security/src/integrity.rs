// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 digests used to correlate encrypted payloads in the audit trail.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest of an encoded (base64) payload as handed to the caller.
///
/// Only ciphertext is ever hashed; plaintext templates never reach this
/// function.
pub fn payload_digest(encoded_payload: &str) -> String {
    hash_bytes(encoded_payload.as_bytes())
}
