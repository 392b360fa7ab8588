//! Decryption and dequantization of encrypted match scores.

use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::bfv::{decrypt, noise_budget, SecretKey};
use crate::codec::dequantize_scalar;
use crate::error::{MatchError, Result};
use crate::matching::EncryptedScore;

/// A decrypted similarity score for one (probe, gallery) pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub probe: usize,
    pub gallery: usize,
    pub score: f64,
}

/// Turns encrypted scores into floats. Holds the secret key.
pub struct ScoreDecoder<'a> {
    secret: &'a SecretKey,
    precision: f64,
}

impl<'a> ScoreDecoder<'a> {
    pub fn new(secret: &'a SecretKey, precision: f64) -> Result<Self> {
        if !precision.is_finite() || precision <= 0.0 {
            return Err(MatchError::InvalidParam(format!(
                "precision must be finite and positive, got {precision}"
            )));
        }
        Ok(Self { secret, precision })
    }

    /// Slot 0 as a centered integer in (-t/2, t/2].
    ///
    /// Refuses with `NoiseBudgetExhausted` when the ciphertext has less
    /// budget left than the context requires.
    pub fn decode_raw(&self, score: &EncryptedScore) -> Result<i64> {
        let ct = score.ciphertext();
        let context = &ct.context;
        let remaining = noise_budget(ct, self.secret)?;
        let required = context.min_noise_budget;
        if remaining < required {
            warn!(probe = score.probe, gallery = score.gallery, remaining, required, "noise budget exhausted");
            return Err(MatchError::NoiseBudgetExhausted { remaining, required });
        }
        let pt = decrypt(ct, self.secret)?;
        let slots = context.encoder().decode_signed(&pt)?;
        Ok(slots[0])
    }

    pub fn decode(&self, score: &EncryptedScore) -> Result<f64> {
        Ok(dequantize_scalar(self.decode_raw(score)?, self.precision))
    }

    pub fn decode_all(&self, scores: &[EncryptedScore]) -> Result<Vec<MatchResult>> {
        scores.par_iter()
            .map(|s| Ok(MatchResult {
                probe: s.probe,
                gallery: s.gallery,
                score: self.decode(s)?,
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use crate::bfv::BfvCiphertext;
    use crate::enroll::TemplateEncryptor;
    use crate::keys::FullKeySet;
    use crate::matching::MatchingEngine;
    use crate::params::presets::compact;
    use crate::sampling::sample_uniform_poly;

    #[test]
    fn test_decode_dot_product() {
        let ctx = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(60);
        let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
        let enc = TemplateEncryptor::new(&ctx, &keys.public_keys().public, 125.0).unwrap();
        let engine = MatchingEngine::new(keys.public_keys()).unwrap();

        let a = enc.encrypt(&[0.6, 0.8]).unwrap();
        let b = enc.encrypt(&[0.8, -0.6]).unwrap();
        let decoder = ScoreDecoder::new(keys.secret_key(), 125.0).unwrap();

        let self_score = decoder.decode(&engine.match_pair((0, 0), &a, &a).unwrap()).unwrap();
        assert!((self_score - 1.0).abs() < 1e-9);
        let orth = decoder.decode(&engine.match_pair((0, 1), &a, &b).unwrap()).unwrap();
        assert_eq!(orth, 0.0);
    }

    #[test]
    fn test_exhausted_budget_is_refused() {
        let ctx = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(61);
        let keys = FullKeySet::generate_with_rng(&ctx, &mut rng).unwrap();
        let c0 = sample_uniform_poly(&ctx.ct_basis, &mut rng).unwrap();
        let c1 = sample_uniform_poly(&ctx.ct_basis, &mut rng).unwrap();
        let junk = EncryptedScore::new(0, 0, BfvCiphertext { c: vec![c0, c1], context: ctx.clone() });

        let decoder = ScoreDecoder::new(keys.secret_key(), 125.0).unwrap();
        assert!(matches!(
            decoder.decode(&junk),
            Err(MatchError::NoiseBudgetExhausted { required: 1, .. })
        ));
    }
}
