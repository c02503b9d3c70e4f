// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for capture sealing and audit logging in the
// kioskid-security crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use kioskid_security::{AuditAction, AuditLog, SessionCipher, payload_digest};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Seal a scanner-sized template and encode it for transport.
///
/// 512 bytes is in the range typical fingerprint modules return for a
/// single capture.
fn bench_seal_template(c: &mut Criterion) {
    let cipher = SessionCipher::generate().expect("keygen");
    let template = vec![0x5Au8; 512];

    c.bench_function("seal_and_encode (512 B)", |b| {
        b.iter(|| {
            let payload = cipher.seal(black_box(&template)).expect("seal failed");
            black_box(payload.to_base64());
        });
    });
}

/// Decode and open a sealed template.
fn bench_open_template(c: &mut Criterion) {
    let cipher = SessionCipher::generate().expect("keygen");
    let encoded = cipher.seal(&[0x5Au8; 512]).expect("seal").to_base64();

    c.bench_function("decode_and_open (512 B)", |b| {
        b.iter(|| {
            let plaintext = cipher.open_base64(black_box(&encoded)).expect("open failed");
            black_box(plaintext);
        });
    });
}

/// Record a capture event keyed by payload digest in an in-memory log.
fn bench_audit_record(c: &mut Criterion) {
    let log = AuditLog::open_in_memory().expect("open in-memory audit log");
    let digest = payload_digest("c2VhbGVkLXBheWxvYWQ=");

    c.bench_function("audit_record (in-memory SQLite)", |b| {
        b.iter(|| {
            log.record(
                black_box(AuditAction::ScannerCapture),
                black_box(&digest),
                black_box(true),
                None,
            )
            .expect("record failed");
        });
    });
}

criterion_group!(
    benches,
    bench_seal_template,
    bench_open_template,
    bench_audit_record,
);
criterion_main!(benches);
