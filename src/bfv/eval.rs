use num_bigint::BigInt;

use crate::error::{MatchError, Result};
use crate::ring::rns::RnsPoly;
use crate::bfv::{BfvCiphertext, same_context, keygen::{GaloisKey, RelinKey, RotationKeys}};
use crate::bfv::encrypt::scale_round;
use crate::bfv::keyswitch::{key_switch, relinearize};

/// Homomorphic addition: ct_out = ct1 + ct2.
/// Component-wise addition of ciphertext polynomials.
pub fn bfv_add(ct1: &BfvCiphertext, ct2: &BfvCiphertext) -> Result<BfvCiphertext> {
    ct1.check_compatible(ct2)?;
    let max_len = ct1.c.len().max(ct2.c.len());
    let mut c = Vec::with_capacity(max_len);

    for i in 0..max_len {
        match (ct1.c.get(i), ct2.c.get(i)) {
            (Some(a), Some(b)) => c.push(a.add(b)?),
            (Some(a), None) => c.push(a.clone()),
            (None, Some(b)) => c.push(b.clone()),
            (None, None) => break,
        }
    }

    Ok(BfvCiphertext {
        c,
        context: ct1.context.clone(),
    })
}

/// Homomorphic subtraction: ct_out = ct1 - ct2.
pub fn bfv_sub(ct1: &BfvCiphertext, ct2: &BfvCiphertext) -> Result<BfvCiphertext> {
    ct1.check_compatible(ct2)?;
    let max_len = ct1.c.len().max(ct2.c.len());
    let mut c = Vec::with_capacity(max_len);

    for i in 0..max_len {
        match (ct1.c.get(i), ct2.c.get(i)) {
            (Some(a), Some(b)) => c.push(a.sub(b)?),
            (Some(a), None) => c.push(a.clone()),
            (None, Some(b)) => c.push(b.neg()),
            (None, None) => break,
        }
    }

    Ok(BfvCiphertext {
        c,
        context: ct1.context.clone(),
    })
}

/// Negate a ciphertext.
pub fn bfv_neg(ct: &BfvCiphertext) -> BfvCiphertext {
    let c = ct.c.iter().map(|ci| ci.neg()).collect();
    BfvCiphertext {
        c,
        context: ct.context.clone(),
    }
}

/// Homomorphic multiplication followed by relinearization.
pub fn bfv_mul_and_relin(
    ct1: &BfvCiphertext,
    ct2: &BfvCiphertext,
    rlk: &RelinKey,
) -> Result<BfvCiphertext> {
    let ct_mul = bfv_mul(ct1, ct2)?;
    relinearize(&ct_mul, rlk)
}

/// Homomorphic multiplication WITHOUT relinearization.
/// Returns a degree-2 ciphertext (3 components).
///
/// For ct1 = (c0, c1), ct2 = (d0, d1):
///   - r0 = round(t/Q · c0·d0)
///   - r1 = round(t/Q · (c0·d1 + c1·d0))
///   - r2 = round(t/Q · c1·d1)
///
/// Operands are lifted to their centered representatives and extended
/// exactly into the basis Q·P, where the tensor product is computed with
/// NTTs and cannot wrap. Each tensor coefficient is then reconstructed,
/// rescaled by t/Q with exact rounding, and reduced back to Q.
pub fn bfv_mul(ct1: &BfvCiphertext, ct2: &BfvCiphertext) -> Result<BfvCiphertext> {
    ct1.check_compatible(ct2)?;
    if ct1.c.len() != 2 || ct2.c.len() != 2 {
        return Err(MatchError::InvalidParam(
            "multiplication requires degree-1 ciphertexts".into()
        ));
    }

    let context = &ct1.context;
    let ct_basis = &context.ct_basis;
    let ext_basis = &context.ext_basis;
    let t = context.plain_modulus;

    let extend = |p: &RnsPoly| p.switch_basis(ct_basis, ext_basis);
    let c0 = extend(&ct1.c[0])?;
    let c1 = extend(&ct1.c[1])?;
    let d0 = extend(&ct2.c[0])?;
    let d1 = extend(&ct2.c[1])?;

    let t0 = c0.mul(&d0)?;
    let t1 = c0.mul(&d1)?.add(&c1.mul(&d0)?)?;
    let t2 = c1.mul(&d1)?;

    let q_big = BigInt::from(ct_basis.product().clone());
    let half_q = &q_big >> 1;

    let rescale = |tensor: &RnsPoly| -> Result<RnsPoly> {
        let exact = tensor.to_bigint_centered(ext_basis);
        let scaled = scale_round(&exact, t, &q_big, &half_q);
        RnsPoly::from_bigint(&scaled, ct_basis)
    };

    Ok(BfvCiphertext {
        c: vec![rescale(&t0)?, rescale(&t1)?, rescale(&t2)?],
        context: context.clone(),
    })
}

/// Apply the Galois automorphism of `gk` to a degree-1 ciphertext.
///
/// σ(c0) + σ(c1)·σ(s) decrypts to σ(m); the σ(c1) part is key-switched
/// from σ(s) back to s:
///   c0' = σ(c0) + Σ d_i·gk0_i
///   c1' = Σ d_i·gk1_i
/// With g = 3^k mod 2N this rotates both slot rows left by k.
pub fn bfv_rotate_rows(ct: &BfvCiphertext, gk: &GaloisKey) -> Result<BfvCiphertext> {
    same_context(&ct.context, &gk.context)?;
    if ct.c.len() != 2 {
        return Err(MatchError::InvalidParam(
            "rotation requires a degree-1 ciphertext".into()
        ));
    }

    let c0_auto = ct.c[0].automorphism(gk.element)?;
    let c1_auto = ct.c[1].automorphism(gk.element)?;
    let (k0, k1) = key_switch(&c1_auto, &gk.ksk, &ct.context)?;

    Ok(BfvCiphertext {
        c: vec![c0_auto.add(&k0)?, k1],
        context: ct.context.clone(),
    })
}

/// Rotate rows left by `steps` using the matching key from `keys`.
pub fn bfv_rotate_rows_by(ct: &BfvCiphertext, steps: usize, keys: &RotationKeys) -> Result<BfvCiphertext> {
    bfv_rotate_rows(ct, keys.get(steps)?)
}
