//! Token validation benchmarks
//!
//! Validation runs on every inbound request, so it bounds the gateway's
//! per-request overhead.

use criterion::{criterion_group, criterion_main, Criterion};
use runner_gateway::auth::paseto::{generate_asymmetric_key_pair, generate_symmetric_key};
use runner_gateway::auth::{build_provider, TokenClaims, TokenVersion};
use runner_gateway::config::PasetoSettings;
use std::hint::black_box;
use std::time::Duration;

fn bench_token_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_validation");
    group.significance_level(0.05);

    for version in [TokenVersion::V2, TokenVersion::V4] {
        let dir = tempfile::tempdir().expect("temporary key directory");
        let pair = generate_asymmetric_key_pair(version).expect("key pair");
        let key_path = dir.path().join("paseto.key");
        let public_path = dir.path().join("paseto.pub");
        std::fs::write(&key_path, &pair.private_key).expect("private key written");
        std::fs::write(&public_path, &pair.public_key).expect("public key written");

        let provider = build_provider(&PasetoSettings {
            version,
            expiration_seconds: 3600,
            key_path,
            public_path,
            secret_key: generate_symmetric_key(version).expect("symmetric key"),
        })
        .expect("provider");

        let claims = TokenClaims::issued_now(Duration::from_secs(3600));
        let local = provider.encrypt_token(&claims).expect("local token");
        let public = provider.sign_token(&claims).expect("public token");

        group.bench_function(format!("{version}_local"), |b| {
            b.iter(|| black_box(provider.validate_token(black_box(&local))))
        });
        group.bench_function(format!("{version}_public"), |b| {
            b.iter(|| black_box(provider.validate_token(black_box(&public))))
        });
        group.bench_function(format!("{version}_rejected"), |b| {
            b.iter(|| black_box(provider.validate_token(black_box("v4.local.AAAA"))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_token_validation);
criterion_main!(benches);
