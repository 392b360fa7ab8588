use std::sync::Arc;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::error::{MatchError, Result};
use crate::params::EncryptionContext;
use crate::ring::modular::mod_mul;
use crate::ring::ntt::NttPoly;
use crate::ring::poly::CoeffPoly;
use crate::ring::rns::RnsPoly;
use crate::bfv::{BfvCiphertext, same_context, keygen::{SecretKey, PublicKey}};
use crate::sampling::{sample_ternary_poly, sample_uniform_poly};

/// Encrypt a plaintext polynomial using the public key.
///
/// ct = (pk0·u + e1 + Δ·m, pk1·u + e2)
/// where Δ = ⌊Q/t⌋, u is ternary, e1,e2 are Gaussian errors.
pub fn encrypt_pk_with_rng<R: rand::Rng + ?Sized>(
    plaintext: &CoeffPoly,
    pk: &PublicKey,
    rng: &mut R,
) -> Result<BfvCiphertext> {
    let context = &pk.context;
    let basis = &context.ct_basis;

    let delta_m = scale_plaintext(plaintext, context)?;

    let u = sample_ternary_poly(basis, rng)?;
    let e1 = context.gaussian.sample_poly(basis, rng)?;
    let e2 = context.gaussian.sample_poly(basis, rng)?;

    // c0 = pk0·u + e1 + Δ·m
    let c0 = pk.pk0.mul(&u)?.add(&e1)?.add(&delta_m)?;
    // c1 = pk1·u + e2
    let c1 = pk.pk1.mul(&u)?.add(&e2)?;

    Ok(BfvCiphertext {
        c: vec![c0, c1],
        context: context.clone(),
    })
}

/// Encrypt using the secret key (symmetric encryption).
///
/// ct = (-a·s + e + Δ·m, a)
pub fn encrypt_sk_with_rng<R: rand::Rng + ?Sized>(
    plaintext: &CoeffPoly,
    sk: &SecretKey,
    rng: &mut R,
) -> Result<BfvCiphertext> {
    let context = &sk.context;
    let basis = &context.ct_basis;

    let delta_m = scale_plaintext(plaintext, context)?;
    let a = sample_uniform_poly(basis, rng)?;
    let e = context.gaussian.sample_poly(basis, rng)?;

    // c0 = -a·s + e + Δ·m
    let c0 = a.mul(&sk.poly)?.neg().add(&e)?.add(&delta_m)?;

    Ok(BfvCiphertext {
        c: vec![c0, a],
        context: context.clone(),
    })
}

/// Decrypt a BFV ciphertext of any degree.
///
/// m = ⌊t · (c0 + c1·s + c2·s² + ...) / Q⌉ mod t, computed exactly on the
/// CRT-reconstructed phase.
pub fn decrypt(ct: &BfvCiphertext, sk: &SecretKey) -> Result<CoeffPoly> {
    let context = &ct.context;
    let t = context.plain_modulus;
    let q_big = BigInt::from(context.ct_basis.product().clone());
    let half_q = &q_big >> 1;
    let t_big = BigInt::from(t);

    let phase = phase(ct, sk)?.to_bigint_centered(&context.ct_basis);
    let coeffs = scale_round(&phase, t, &q_big, &half_q)
        .into_iter()
        .map(|v| {
            let mut r = v % &t_big;
            if r.is_negative() {
                r += &t_big;
            }
            r.to_u64().ok_or_else(|| MatchError::InvalidParam(
                "decryption coefficient does not fit in u64".into()
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CoeffPoly { coeffs, modulus: t })
}

/// c0 + c1·s + c2·s² + ... in R_Q.
pub(crate) fn phase(ct: &BfvCiphertext, sk: &SecretKey) -> Result<RnsPoly> {
    same_context(&ct.context, &sk.context)?;
    let first = ct.c.first()
        .ok_or_else(|| MatchError::MalformedInput("ciphertext has no components".into()))?;

    let mut phase = first.clone();
    let mut s_power = sk.poly.clone();
    for (i, ci) in ct.c.iter().enumerate().skip(1) {
        phase.add_assign(&ci.mul(&s_power)?)?;
        if i + 1 < ct.c.len() {
            s_power = s_power.mul(&sk.poly)?;
        }
    }
    Ok(phase)
}

/// round(t·x / Q) for each signed coefficient, rounding half away from zero.
pub(crate) fn scale_round(coeffs: &[BigInt], t: u64, q_big: &BigInt, half_q: &BigInt) -> Vec<BigInt> {
    let t_big = BigInt::from(t);
    coeffs.iter().map(|x| {
        let num = &t_big * x;
        if num.is_negative() {
            -(((-num) + half_q) / q_big)
        } else {
            (num + half_q) / q_big
        }
    }).collect()
}

/// Scale plaintext by Δ = ⌊Q/t⌋ (Q = ∏q_i) and convert to RNS-NTT form.
pub(crate) fn scale_plaintext(plaintext: &CoeffPoly, context: &Arc<EncryptionContext>) -> Result<RnsPoly> {
    if plaintext.modulus != context.plain_modulus {
        return Err(MatchError::ModulusMismatch);
    }
    if plaintext.len() != context.ring_degree {
        return Err(MatchError::DimensionMismatch {
            expected: context.ring_degree,
            got: plaintext.len(),
        });
    }
    let basis = &context.ct_basis;
    let mut components = Vec::with_capacity(basis.num_moduli());

    for (idx, (&qi, plan)) in basis.moduli.iter().zip(basis.plans.iter()).enumerate() {
        let delta_i = context.delta_residues[idx];
        let bk = basis.barrett_ks[idx];

        let coeffs: Vec<u64> = plaintext.coeffs.iter()
            .map(|&m| mod_mul(m % qi, delta_i, qi, bk))
            .collect();

        let cp = CoeffPoly { coeffs, modulus: qi };
        components.push(NttPoly::from_coeff_poly(&cp, plan.clone())?);
    }

    Ok(RnsPoly {
        components,
        ring_degree: context.ring_degree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use crate::bfv::keygen::{gen_public_key_with_rng, gen_secret_key_with_rng};
    use crate::params::presets::compact;

    #[test]
    fn test_encrypt_decrypt_pk() {
        let ctx = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let sk = gen_secret_key_with_rng(&ctx, &mut rng).unwrap();
        let pk = gen_public_key_with_rng(&sk, &mut rng).unwrap();

        let pt = CoeffPoly::from_coeffs((0..16).map(|i| i * 64_000).collect(), ctx.plain_modulus);
        let ct = encrypt_pk_with_rng(&pt, &pk, &mut rng).unwrap();
        assert_eq!(decrypt(&ct, &sk).unwrap(), pt);
    }

    #[test]
    fn test_encrypt_decrypt_sk() {
        let ctx = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(43);
        let sk = gen_secret_key_with_rng(&ctx, &mut rng).unwrap();

        let pt = CoeffPoly::from_coeffs(vec![ctx.plain_modulus - 1; 16], ctx.plain_modulus);
        let ct = encrypt_sk_with_rng(&pt, &sk, &mut rng).unwrap();
        assert_eq!(decrypt(&ct, &sk).unwrap(), pt);
    }

    #[test]
    fn test_wrong_key_does_not_decrypt() {
        let ctx = compact().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(44);
        let sk = gen_secret_key_with_rng(&ctx, &mut rng).unwrap();
        let other = gen_secret_key_with_rng(&ctx, &mut rng).unwrap();
        let pk = gen_public_key_with_rng(&sk, &mut rng).unwrap();

        let pt = CoeffPoly::from_coeffs(vec![7; 16], ctx.plain_modulus);
        let ct = encrypt_pk_with_rng(&pt, &pk, &mut rng).unwrap();
        assert_ne!(decrypt(&ct, &other).unwrap(), pt);
    }

    #[test]
    fn test_plaintext_modulus_checked() {
        let ctx = compact().unwrap();
        let pt = CoeffPoly::zero(16, 17);
        assert!(matches!(scale_plaintext(&pt, &ctx), Err(MatchError::ModulusMismatch)));
    }

    #[test]
    fn test_scale_round_symmetric() {
        let q = BigInt::from(10);
        let half = BigInt::from(5);
        let xs = vec![BigInt::from(5), BigInt::from(-5), BigInt::from(4)];
        // t = 3: 15/10 -> 2, -15/10 -> -2, 12/10 -> 1
        let r = scale_round(&xs, 3, &q, &half);
        assert_eq!(r, vec![BigInt::from(2), BigInt::from(-2), BigInt::from(1)]);
    }
}
