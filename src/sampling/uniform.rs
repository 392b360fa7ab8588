use rand::Rng;

use crate::error::Result;
use crate::ring::ntt::NttPoly;
use crate::ring::rns::{RnsBasis, RnsPoly};

/// Uniform value in [0, modulus) by rejection sampling on a bit mask.
pub fn sample_uniform_mod<R: Rng + ?Sized>(modulus: u64, rng: &mut R) -> u64 {
    let mask = if modulus.is_power_of_two() {
        modulus - 1
    } else {
        u64::MAX >> modulus.leading_zeros()
    };
    loop {
        let val = rng.random::<u64>() & mask;
        if val < modulus {
            break val;
        }
    }
}

/// Uniformly random element of R_Q.
///
/// Sampled independently per prime, directly in the evaluation domain: the
/// NTT is a bijection, so uniform evaluations are uniform coefficients.
pub fn sample_uniform_poly<R: Rng + ?Sized>(basis: &RnsBasis, rng: &mut R) -> Result<RnsPoly> {
    let n = basis.ring_degree;
    let components = basis.moduli.iter()
        .zip(basis.plans.iter())
        .map(|(&q, plan)| {
            let evals = (0..n).map(|_| sample_uniform_mod(q, rng)).collect();
            NttPoly::from_evals(evals, n, plan.clone())
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RnsPoly { components, ring_degree: n })
}

/// Ternary coefficients, each of {-1, 0, 1} with probability 1/3.
pub fn sample_ternary<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<i64> {
    (0..n)
        .map(|_| {
            // Rejection sampling on 2 bits for uniform {0,1,2}
            let val = loop {
                let r = rng.random::<u8>() & 0x03;
                if r < 3 { break r; }
            };
            val as i64 - 1
        })
        .collect()
}

pub fn sample_ternary_poly<R: Rng + ?Sized>(basis: &RnsBasis, rng: &mut R) -> Result<RnsPoly> {
    let coeffs = sample_ternary(basis.ring_degree, rng);
    RnsPoly::from_signed(&coeffs, basis)
}
