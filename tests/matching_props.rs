use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use cipherface::bfv::{decrypt, encrypt_pk_with_rng, gen_secret_key_with_rng, noise_budget};
use cipherface::codec::{dequantize_component, quantize};
use cipherface::enroll::{GalleryStore, TemplateEncryptor};
use cipherface::error::MatchError;
use cipherface::io::FeatureMatrix;
use cipherface::keys::{FullKeySet, PublicKeySet, SECRET_KEY_FILE};
use cipherface::matching::{rotate_and_sum, MatchingEngine};
use cipherface::params::presets::{compact, face_matching};
use cipherface::score::ScoreDecoder;

const PRECISION: f64 = 125.0;

fn plain_dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}

fn random_unit_vector<R: Rng>(dim: usize, rng: &mut R) -> Vec<f32> {
    let v: Vec<f64> = (0..dim).map(|_| rng.random::<f64>() * 2.0 - 1.0).collect();
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    v.iter().map(|x| (x / norm) as f32).collect()
}

proptest! {
    #[test]
    fn prop_quantization_roundtrip(
        values in proptest::collection::vec(-1.0f32..1.0f32, 0..=8),
        precision in 1.0f64..1000.0f64,
    ) {
        let slots = quantize(&values, precision, 8).unwrap();
        for (j, &v) in values.iter().enumerate() {
            let back = dequantize_component(slots.values()[j], precision);
            prop_assert!((back - v as f64).abs() <= 0.5 / precision + 1e-9);
        }
        prop_assert!(slots.values()[values.len()..].iter().all(|&v| v == 0));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_homomorphic_score_matches_plaintext(
        (probe, entry) in (1usize..=8).prop_flat_map(|dim| (
            proptest::collection::vec(-1.0f32..1.0f32, dim),
            proptest::collection::vec(-1.0f32..1.0f32, dim),
        )),
        seed in any::<u64>(),
    ) {
        let ctx = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
        let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();
        let engine = MatchingEngine::new(keys.public_keys()).unwrap();
        let decoder = ScoreDecoder::new(keys.secret_key(), PRECISION).unwrap();

        let ct_probe = enc.encrypt_with_rng(&probe, &mut rng).unwrap();
        let ct_entry = enc.encrypt_with_rng(&entry, &mut rng).unwrap();
        let encrypted = engine.match_pair((0, 0), &ct_probe, &ct_entry).unwrap();

        // The raw slot is exactly the integer dot product of the quantized vectors.
        let qp = quantize(&probe, PRECISION, ctx.row_size()).unwrap();
        let qe = quantize(&entry, PRECISION, ctx.row_size()).unwrap();
        prop_assert_eq!(i128::from(decoder.decode_raw(&encrypted).unwrap()), qp.dot(&qe));

        let score = decoder.decode(&encrypted).unwrap();
        let tolerance = probe.len() as f64 * 1.01 / PRECISION;
        prop_assert!((score - plain_dot(&probe, &entry)).abs() <= tolerance);
    }

    #[test]
    fn prop_self_match_is_squared_norm(
        values in proptest::collection::vec(-1.0f32..1.0f32, 1..=8),
        seed in any::<u64>(),
    ) {
        let ctx = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
        let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();
        let engine = MatchingEngine::new(keys.public_keys()).unwrap();
        let decoder = ScoreDecoder::new(keys.secret_key(), PRECISION).unwrap();

        let ct = enc.encrypt_with_rng(&values, &mut rng).unwrap();
        let score = decoder.decode(&engine.match_pair((0, 0), &ct, &ct).unwrap()).unwrap();
        let tolerance = values.len() as f64 * 1.01 / PRECISION;
        prop_assert!((score - plain_dot(&values, &values)).abs() <= tolerance);
    }
}

#[test]
fn zero_gallery_entry_scores_exactly_zero() {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(100);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();
    let engine = MatchingEngine::new(keys.public_keys()).unwrap();
    let decoder = ScoreDecoder::new(keys.secret_key(), PRECISION).unwrap();

    let zero = enc.encrypt_with_rng(&[0.0; 8], &mut rng).unwrap();
    let probe = enc.encrypt_with_rng(&[0.9, -0.4, 0.1, 0.3], &mut rng).unwrap();
    let score = decoder.decode(&engine.match_pair((0, 0), &probe, &zero).unwrap()).unwrap();
    assert_eq!(score, 0.0);
}

#[test]
fn matching_needs_no_secret_key() {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(101);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let (secret, public) = keys.into_parts();

    // The matching party only ever sees this directory.
    let public_dir = tempfile::tempdir().unwrap();
    public.save_to_dir(public_dir.path()).unwrap();
    assert!(!public_dir.path().join(SECRET_KEY_FILE).exists());

    let loaded = PublicKeySet::load_from_dir(&ctx, public_dir.path()).unwrap();
    let enc = TemplateEncryptor::new(&ctx, &loaded.public, PRECISION).unwrap();
    let features = FeatureMatrix::from_rows(&[vec![0.6, 0.8], vec![0.8, -0.6]]).unwrap();
    let gallery = enc.enroll(&features).unwrap();
    let probe = enc.encrypt(&[0.6, 0.8]).unwrap();

    let engine = MatchingEngine::new(&loaded).unwrap();
    let scores = engine.match_gallery(2, &probe, &gallery).unwrap();

    let decoder = ScoreDecoder::new(&secret, PRECISION).unwrap();
    let results = decoder.decode_all(&scores).unwrap();
    let pairs: Vec<(usize, usize)> = results.iter().map(|r| (r.probe, r.gallery)).collect();
    assert_eq!(pairs, vec![(2, 0), (2, 1)]);
    assert!((results[0].score - 1.0).abs() < 1e-9);
    assert_eq!(results[1].score, 0.0);
}

#[test]
fn foreign_secret_key_cannot_read_scores() {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(102);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let other = gen_secret_key_with_rng(&ctx, &mut rng).unwrap();

    let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();
    let engine = MatchingEngine::new(keys.public_keys()).unwrap();
    let ct = enc.encrypt_with_rng(&[0.6, 0.8], &mut rng).unwrap();
    let encrypted = engine.match_pair((0, 0), &ct, &ct).unwrap();

    let decoder = ScoreDecoder::new(&other, PRECISION).unwrap();
    match decoder.decode_raw(&encrypted) {
        Err(MatchError::NoiseBudgetExhausted { .. }) => {}
        Ok(raw) => assert_ne!(raw, 15625),
        Err(e) => panic!("unexpected error: {e}"),
    }
}

#[test]
fn dimension_guard_rejects_before_encrypting() {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(103);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();

    assert!(matches!(
        enc.encrypt(&[0.1; 9]),
        Err(MatchError::DimensionOverflow { dim: 9, row_size: 8 })
    ));
    let mut gallery = GalleryStore::new(&ctx);
    let features = FeatureMatrix::from_rows(&[vec![0.1; 8], vec![0.2; 8]]).unwrap();
    for entry in enc.enroll(&features).unwrap().entries() {
        gallery.push(entry.clone()).unwrap();
    }
    assert_eq!(gallery.len(), 2);
}

#[test]
fn rotate_and_sum_in_isolation() {
    let ctx = compact().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(104);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    assert_eq!(ctx.row_size(), 8);

    let pt = ctx.encoder().encode_signed(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let ct = encrypt_pk_with_rng(&pt, &keys.public_keys().public, &mut rng).unwrap();
    let summed = rotate_and_sum(&ct, &keys.public_keys().rotation).unwrap();
    let slots = ctx.encoder().decode_signed(&decrypt(&summed, keys.secret_key()).unwrap()).unwrap();
    assert!(slots[..8].iter().all(|&v| v == 36));
}

#[test]
fn face_preset_matches_512_dim_embeddings() {
    let ctx = face_matching().unwrap();
    let dim = 512;
    let mut rng = ChaCha20Rng::seed_from_u64(105);
    let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
    let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, PRECISION).unwrap();
    let engine = MatchingEngine::new(keys.public_keys()).unwrap();
    let decoder = ScoreDecoder::new(keys.secret_key(), PRECISION).unwrap();

    let probe = random_unit_vector(dim, &mut rng);
    let entry = random_unit_vector(dim, &mut rng);
    let ct_probe = enc.encrypt_with_rng(&probe, &mut rng).unwrap();
    let ct_entry = enc.encrypt_with_rng(&entry, &mut rng).unwrap();

    // One multiplication and log2(2048) = 11 rotations.
    let cross = engine.match_pair((0, 0), &ct_probe, &ct_entry).unwrap();
    let own = engine.match_pair((0, 1), &ct_probe, &ct_probe).unwrap();
    for score in [&cross, &own] {
        let remaining = noise_budget(score.ciphertext(), keys.secret_key()).unwrap();
        assert!(remaining >= ctx.min_noise_budget, "remaining budget {remaining}");
    }

    let qp = quantize(&probe, PRECISION, ctx.row_size()).unwrap();
    let qe = quantize(&entry, PRECISION, ctx.row_size()).unwrap();
    assert_eq!(i128::from(decoder.decode_raw(&cross).unwrap()), qp.dot(&qe));

    // Per-component rounding error is at most 0.5 / precision.
    let step = 0.5 / PRECISION;
    let tolerance = 2.0 * (dim as f64).sqrt() * step + dim as f64 * step * step;
    let score = decoder.decode(&cross).unwrap();
    assert!((score - plain_dot(&probe, &entry)).abs() <= tolerance);
    let self_score = decoder.decode(&own).unwrap();
    assert!((self_score - 1.0).abs() <= tolerance);
}
