//! Benchmarks for credential parsing and identity resolution.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gate_auth::{
    Hs256Verifier, IdentityResolver, Unverified, encode_unsigned, parse_credential,
};
use gate_core::ManualClock;
use gate_store::{MemoryStore, StoreHandle};
use serde_json::json;

const NOW: i64 = 1_700_000_000;

fn bench_parse_credential(c: &mut Criterion) {
    let small = encode_unsigned(&json!({"userId": "u-1"}));
    let large = encode_unsigned(&json!({
        "userId": "u-1",
        "email": "someone@example.com",
        "exp": NOW + 3600,
        "roles": ["reader", "writer", "auditor"],
        "org": {"id": "org-7", "name": "Example Org", "tier": "enterprise"},
    }));

    let mut group = c.benchmark_group("parse_credential");
    for (name, token) in [("small", &small), ("large", &large)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), token, |b, t| {
            b.iter(|| parse_credential(black_box(t), &Unverified, NOW))
        });
    }
    group.finish();
}

fn bench_hs256(c: &mut Criterion) {
    let verifier = Hs256Verifier::new("bench-secret");
    let header = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";
    let payload = encode_unsigned(&json!({"userId": "u-1"}));
    let body = payload.split('.').nth(1).unwrap_or_default();
    let signed = format!("{header}.{body}");
    let token = format!("{signed}.{}", verifier.sign(&signed).unwrap());

    c.bench_function("hs256_verify", |b| {
        b.iter(|| parse_credential(black_box(&token), &verifier, NOW))
    });
}

fn bench_resolve(c: &mut Criterion) {
    let store = Arc::new(MemoryStore::with_entries([(
        "user:u-1",
        r#"{"id":"u-1","email":"a@b.c","username":"a","isVip":false,"vipExpiresAt":0}"#,
    )]));
    let resolver = IdentityResolver::new(
        StoreHandle::memory(store),
        Arc::new(ManualClock::at_unix(NOW)),
    );
    let hit = encode_unsigned(&json!({"userId": "u-1"}));
    let miss = encode_unsigned(&json!({"userId": "u-2", "email": "x@y.z"}));
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("resolve");
    group.bench_function("store_hit", |b| {
        b.iter(|| rt.block_on(resolver.resolve(black_box(&hit))))
    });
    group.bench_function("claims_fallback", |b| {
        b.iter(|| rt.block_on(resolver.resolve(black_box(&miss))))
    });
    group.finish();
}

criterion_group!(benches, bench_parse_credential, bench_hs256, bench_resolve);
criterion_main!(benches);
