use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::error::{MatchError, Result};
use crate::params::EncryptionContext;
use crate::ring::rns::RnsPoly;
use crate::bfv::{BfvCiphertext, same_context, keygen::{KeySwitchKey, RelinKey}};

/// Balanced digits of one signed coefficient: c = Σ d_i · base^i with each
/// d_i in [-base/2, base/2).
fn balanced_digits(c: &BigInt, base: u64, num_digits: usize) -> Result<Vec<i64>> {
    let base_big = BigInt::from(base);
    let half_base = (base / 2) as i64;
    let base_i = base as i64;

    let mut remaining = c.clone();
    let mut digits = Vec::with_capacity(num_digits);
    for _ in 0..num_digits {
        // `%` keeps the sign of the dividend, so rem is in (-base, base).
        let mut rem = (&remaining % &base_big).to_i64()
            .ok_or_else(|| MatchError::InvalidParam("gadget digit overflow".into()))?;
        if rem < -half_base {
            rem += base_i;
        } else if rem >= half_base {
            rem -= base_i;
        }
        digits.push(rem);
        remaining = (remaining - rem) / &base_big;
    }
    if !remaining.is_zero() {
        return Err(MatchError::InvalidParam(
            "coefficient does not fit the gadget decomposition".into()
        ));
    }
    Ok(digits)
}

/// Gadget decomposition of a polynomial over the full modulus Q.
///
/// Each coefficient is CRT-reconstructed to its centered representative and
/// written in balanced base-B digits. Digit polynomial i holds the i-th digit
/// of every coefficient, lifted into every RNS prime.
pub fn gadget_decompose(poly: &RnsPoly, context: &EncryptionContext) -> Result<Vec<RnsPoly>> {
    let basis = &context.ct_basis;
    let n = context.ring_degree;
    let num_digits = context.gadget_digits;

    let centered = poly.to_bigint_centered(basis);
    let mut digit_coeffs = vec![vec![0i64; n]; num_digits];
    for (pos, c) in centered.iter().enumerate() {
        let digits = balanced_digits(c, context.gadget_base, num_digits)?;
        for (d, value) in digits.into_iter().enumerate() {
            digit_coeffs[d][pos] = value;
        }
    }

    digit_coeffs.iter()
        .map(|coeffs| RnsPoly::from_signed(coeffs, basis))
        .collect()
}

/// Switch `poly` (multiplying some s') to the key `s`.
///
/// Returns (Σ d_i·k0_i, Σ d_i·k1_i), a pair whose phase under s approximates
/// poly·s'.
pub fn key_switch(
    poly: &RnsPoly,
    ksk: &KeySwitchKey,
    context: &EncryptionContext,
) -> Result<(RnsPoly, RnsPoly)> {
    if ksk.keys.len() != context.gadget_digits {
        return Err(MatchError::DimensionMismatch {
            expected: context.gadget_digits,
            got: ksk.keys.len(),
        });
    }
    let digits = gadget_decompose(poly, context)?;

    let mut acc0 = RnsPoly::zero(&context.ct_basis);
    let mut acc1 = RnsPoly::zero(&context.ct_basis);
    for (digit, (k0, k1)) in digits.iter().zip(ksk.keys.iter()) {
        acc0.add_assign(&digit.mul(k0)?)?;
        acc1.add_assign(&digit.mul(k1)?)?;
    }
    Ok((acc0, acc1))
}

/// Relinearize a degree-2 ciphertext (c0, c1, c2) to degree-1 (c0', c1').
///
/// c0' = c0 + Σ_i decompose_i(c2) · rlk0_i
/// c1' = c1 + Σ_i decompose_i(c2) · rlk1_i
pub fn relinearize(ct: &BfvCiphertext, rlk: &RelinKey) -> Result<BfvCiphertext> {
    same_context(&ct.context, &rlk.context)?;
    match ct.c.len() {
        2 => return Ok(ct.clone()),
        3 => {}
        _ => {
            return Err(MatchError::InvalidParam(
                "relinearization only supports degree-2 ciphertexts".into()
            ))
        }
    }

    let (k0, k1) = key_switch(&ct.c[2], &rlk.ksk, &ct.context)?;
    Ok(BfvCiphertext {
        c: vec![ct.c[0].add(&k0)?, ct.c[1].add(&k1)?],
        context: ct.context.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::presets::compact;

    fn recompose(digits: &[i64], base: u64) -> BigInt {
        digits.iter().rev().fold(BigInt::zero(), |acc, &d| acc * base + d)
    }

    #[test]
    fn test_balanced_digits_small() {
        // 42 = (-6) + 3*16
        assert_eq!(balanced_digits(&BigInt::from(42), 16, 2).unwrap(), vec![-6, 3]);
        // -1 = -1 + 0*16
        assert_eq!(balanced_digits(&BigInt::from(-1), 16, 2).unwrap(), vec![-1, 0]);
    }

    #[test]
    fn test_balanced_digits_reconstruct_wide() {
        let base = 1u64 << 16;
        let values = [
            BigInt::from(1u128 << 107) - 1,
            -(BigInt::from(1u128 << 107) - 12345i32),
            BigInt::from(0x7fff_ffff_ffffu64),
        ];
        for v in &values {
            let digits = balanced_digits(v, base, 7).unwrap();
            assert!(digits.iter().all(|&d| d >= -(1 << 15) && d < (1 << 15)));
            assert_eq!(&recompose(&digits, base), v);
        }
    }

    #[test]
    fn test_too_few_digits_rejected() {
        assert!(balanced_digits(&BigInt::from(1u64 << 40), 16, 2).is_err());
    }

    #[test]
    fn test_gadget_decompose_poly_recomposes() {
        let ctx = compact().unwrap();
        let basis = &ctx.ct_basis;
        let coeffs: Vec<BigInt> = (0..16)
            .map(|i| (BigInt::from(1u128 << 100) + i) * if i % 2 == 0 { 1 } else { -1 })
            .collect();
        let poly = RnsPoly::from_bigint(&coeffs, basis).unwrap();
        let digits = gadget_decompose(&poly, &ctx).unwrap();
        assert_eq!(digits.len(), ctx.gadget_digits);

        let mut acc = RnsPoly::zero(basis);
        for d in digits.iter().rev() {
            acc = acc.scalar_mul(ctx.gadget_base).add(d).unwrap();
        }
        assert_eq!(acc.to_bigint_centered(basis), coeffs);
    }
}
