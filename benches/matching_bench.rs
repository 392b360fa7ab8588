use criterion::{criterion_group, criterion_main, Criterion, black_box};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use cipherface::bfv::{bfv_mul, decrypt, encrypt_pk_with_rng, relinearize};
use cipherface::enroll::TemplateEncryptor;
use cipherface::keys::FullKeySet;
use cipherface::matching::{rotate_and_sum, MatchingEngine};
use cipherface::params::presets::compact;
use cipherface::score::ScoreDecoder;

const PRECISION: f64 = 125.0;

fn keygen(c: &mut Criterion) {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(0);

    c.bench_function("full_key_set", |b| {
        b.iter(|| FullKeySet::generate_with_rng(black_box(&ctx), &mut rng))
    });
}

fn encrypt_decrypt(c: &mut Criterion) {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();
    let features = [0.1f32, -0.2, 0.3, -0.4, 0.5, -0.6, 0.7, -0.8];

    c.bench_function("encrypt_template", |b| {
        b.iter(|| enc.encrypt_with_rng(black_box(&features), &mut rng))
    });

    let ct = enc.encrypt_with_rng(&features, &mut rng).unwrap();
    c.bench_function("decrypt", |b| {
        b.iter(|| decrypt(black_box(ct.ciphertext()), keys.secret_key()))
    });
}

fn homomorphic_ops(c: &mut Criterion) {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let public = keys.public_keys();
    let pt = ctx.encoder().encode_signed(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let ct_a = encrypt_pk_with_rng(&pt, &public.public, &mut rng).unwrap();
    let ct_b = encrypt_pk_with_rng(&pt, &public.public, &mut rng).unwrap();

    c.bench_function("bfv_mul", |b| {
        b.iter(|| bfv_mul(black_box(&ct_a), black_box(&ct_b)))
    });

    let product = bfv_mul(&ct_a, &ct_b).unwrap();
    c.bench_function("relinearize", |b| {
        b.iter(|| relinearize(black_box(&product), &public.relin))
    });

    c.bench_function("rotate_and_sum", |b| {
        b.iter(|| rotate_and_sum(black_box(&ct_a), &public.rotation))
    });
}

fn full_match(c: &mut Criterion) {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();
    let engine = MatchingEngine::new(keys.public_keys()).unwrap();
    let decoder = ScoreDecoder::new(keys.secret_key(), PRECISION).unwrap();
    let probe = enc.encrypt_with_rng(&[0.6, 0.8], &mut rng).unwrap();
    let entry = enc.encrypt_with_rng(&[0.8, 0.6], &mut rng).unwrap();

    c.bench_function("match_pair", |b| {
        b.iter(|| engine.match_pair((0, 0), black_box(&probe), black_box(&entry)))
    });

    let score = engine.match_pair((0, 0), &probe, &entry).unwrap();
    c.bench_function("decode_score", |b| {
        b.iter(|| decoder.decode(black_box(&score)))
    });
}

criterion_group!(benches, keygen, encrypt_decrypt, homomorphic_ops, full_match);
criterion_main!(benches);
