use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};

use crate::error::Result;
use crate::bfv::{BfvCiphertext, encrypt::phase, keygen::SecretKey};

/// Invariant noise budget in bits.
///
/// Writing t/Q·(c0 + c1·s + ...) = m + v with |v| < 1/2 whenever decryption
/// is correct, the budget is -log2(2·||v||), computed exactly as
/// bits(Q) - bits(||[t·phase]_Q||) - 1 and floored at 0. Zero means the
/// plaintext can no longer be trusted.
pub fn noise_budget(ct: &BfvCiphertext, sk: &SecretKey) -> Result<u32> {
    let context = &ct.context;
    let basis = &context.ct_basis;
    let q_big = BigInt::from_biguint(Sign::Plus, basis.product().clone());
    let half_q = &q_big >> 1;
    let t_big = BigInt::from(context.plain_modulus);

    let phase = phase(ct, sk)?.to_bigint_centered(basis);

    let mut max_noise = BigInt::zero();
    for c in phase {
        let mut v = (&t_big * c) % &q_big;
        if v.is_negative() {
            v += &q_big;
        }
        if v > half_q {
            v -= &q_big;
        }
        let abs = v.abs();
        if abs > max_noise {
            max_noise = abs;
        }
    }

    let q_bits = q_big.bits() as i64;
    let noise_bits = max_noise.bits() as i64;
    Ok((q_bits - noise_bits - 1).max(0) as u32)
}
