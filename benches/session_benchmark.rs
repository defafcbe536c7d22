use criterion::{criterion_group, criterion_main, Criterion};
use crypto_dashboard::middleware::auth::{SessionClaims, SessionKeys};
use crypto_dashboard::services::oauth::{sign_state, verify_state};
use std::hint::black_box;
use uuid::Uuid;

fn benchmark_session_tokens(c: &mut Criterion) {
    let keys = SessionKeys::derive(b"benchmark_session_secret_32_bytes!")
        .expect("Failed to derive keys");
    let claims = SessionClaims::new(Uuid::new_v4(), true);
    let token = keys.sign(&claims).expect("Failed to sign token");

    let mut group = c.benchmark_group("session_tokens");

    group.bench_function("sign", |b| b.iter(|| keys.sign(black_box(&claims))));

    group.bench_function("verify_valid", |b| {
        b.iter(|| keys.verify(black_box(&token)))
    });

    group.bench_function("verify_garbage", |b| {
        b.iter(|| keys.verify(black_box("not.a.token")))
    });

    group.finish();
}

fn benchmark_oauth_state(c: &mut Criterion) {
    let keys = SessionKeys::derive(b"benchmark_session_secret_32_bytes!")
        .expect("Failed to derive keys");
    let state = sign_state("/prices", keys.oauth_state_key()).expect("Failed to sign state");

    c.bench_function("oauth_state_verify", |b| {
        b.iter(|| verify_state(black_box(&state), keys.oauth_state_key()))
    });
}

criterion_group!(benches, benchmark_session_tokens, benchmark_oauth_state);
criterion_main!(benches);
