use std::sync::Arc;
use concrete_ntt::prime64::Plan;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{MatchError, Result};
use crate::ring::modular::{barrett_constant, mod_inv, mod_mul, reduce_signed};
use crate::ring::ntt::{make_plan, NttPoly};
use crate::ring::poly::CoeffPoly;

/// Polynomial in RNS (Residue Number System) representation.
///
/// Stores one NttPoly per RNS prime. The polynomial lives in Z_Q[X]/(X^n+1)
/// where Q = ∏ q_i.
#[derive(Clone, Debug)]
pub struct RnsPoly {
    pub components: Vec<NttPoly>,
    pub ring_degree: usize,
}

/// Precomputed data for an RNS basis.
#[derive(Clone, Debug)]
pub struct RnsBasis {
    pub moduli: Vec<u64>,
    pub plans: Vec<Arc<Plan>>,
    pub ring_degree: usize,
    pub barrett_ks: Vec<u64>,
    /// q_star_inv_i = (Q/q_i)^{-1} mod q_i.
    pub q_star_inv: Vec<u64>,
    product: BigUint,
    /// (Q/q_i) · q_star_inv_i, the CRT idempotents.
    crt_terms: Vec<BigUint>,
}

impl RnsBasis {
    /// Create a new RNS basis from distinct NTT-friendly primes.
    pub fn new(moduli: Vec<u64>, ring_degree: usize) -> Result<Self> {
        if moduli.is_empty() {
            return Err(MatchError::InvalidParam("RNS basis needs at least one modulus".into()));
        }
        let plans: Vec<Arc<Plan>> = moduli.iter()
            .map(|&q| make_plan(ring_degree, q))
            .collect::<Result<Vec<_>>>()?;

        let barrett_ks: Vec<u64> = moduli.iter()
            .map(|&q| barrett_constant(q))
            .collect();

        let q_star_inv: Vec<u64> = (0..moduli.len()).map(|i| {
            let mut prod = 1u64;
            for (j, &qj) in moduli.iter().enumerate() {
                if i != j {
                    prod = mod_mul(prod, qj % moduli[i], moduli[i], barrett_ks[i]);
                }
            }
            mod_inv(prod, moduli[i]).ok_or_else(|| MatchError::InvalidParam(
                format!("RNS moduli must be pairwise coprime, {} is not", moduli[i])
            ))
        }).collect::<Result<Vec<_>>>()?;

        let product = moduli.iter().fold(BigUint::one(), |acc, &q| acc * q);
        let crt_terms = moduli.iter()
            .zip(q_star_inv.iter())
            .map(|(&q, &inv)| (&product / q) * inv)
            .collect();

        Ok(Self {
            moduli,
            plans,
            ring_degree,
            barrett_ks,
            q_star_inv,
            product,
            crt_terms,
        })
    }

    /// Basis over the union of both prime sets.
    pub fn extend(&self, other: &RnsBasis) -> Result<Self> {
        if self.ring_degree != other.ring_degree {
            return Err(MatchError::DimensionMismatch {
                expected: self.ring_degree,
                got: other.ring_degree,
            });
        }
        let mut moduli = self.moduli.clone();
        moduli.extend_from_slice(&other.moduli);
        Self::new(moduli, self.ring_degree)
    }

    pub fn num_moduli(&self) -> usize {
        self.moduli.len()
    }

    /// Q = ∏ q_i
    pub fn product(&self) -> &BigUint {
        &self.product
    }

    /// CRT-reconstruct one coefficient from its residues, centered in (-Q/2, Q/2].
    fn reconstruct_centered(&self, residues: impl Iterator<Item = u64>, half: &BigUint) -> BigInt {
        let mut x = BigUint::zero();
        for (term, r) in self.crt_terms.iter().zip(residues) {
            x += term * r;
        }
        x %= &self.product;
        if &x > half {
            BigInt::from_biguint(Sign::Minus, &self.product - x)
        } else {
            BigInt::from(x)
        }
    }
}

impl RnsPoly {
    pub fn zero(basis: &RnsBasis) -> Self {
        let components = basis.moduli.iter()
            .zip(basis.plans.iter())
            .map(|(&q, plan)| NttPoly::zero(basis.ring_degree, q, plan.clone()))
            .collect();
        Self {
            components,
            ring_degree: basis.ring_degree,
        }
    }

    /// Lift a polynomial with non-negative integer coefficients into every RNS prime.
    pub fn from_coeff_poly(poly: &CoeffPoly, basis: &RnsBasis) -> Result<Self> {
        if poly.len() != basis.ring_degree {
            return Err(MatchError::DimensionMismatch {
                expected: basis.ring_degree,
                got: poly.len(),
            });
        }
        let components = basis.moduli.iter()
            .zip(basis.plans.iter())
            .map(|(&q, plan)| {
                let reduced = CoeffPoly::from_coeffs(
                    poly.coeffs.iter().map(|&c| c % q).collect(),
                    q,
                );
                NttPoly::from_coeff_poly(&reduced, plan.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            components,
            ring_degree: basis.ring_degree,
        })
    }

    /// Lift a polynomial with small signed coefficients (secrets, errors, digits).
    pub fn from_signed(coeffs: &[i64], basis: &RnsBasis) -> Result<Self> {
        if coeffs.len() != basis.ring_degree {
            return Err(MatchError::DimensionMismatch {
                expected: basis.ring_degree,
                got: coeffs.len(),
            });
        }
        let components = basis.moduli.iter()
            .zip(basis.plans.iter())
            .map(|(&q, plan)| {
                let cp = CoeffPoly {
                    coeffs: coeffs.iter().map(|&c| reduce_signed(c, q)).collect(),
                    modulus: q,
                };
                NttPoly::from_coeff_poly(&cp, plan.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            components,
            ring_degree: basis.ring_degree,
        })
    }

    /// Reduce arbitrary-size integer coefficients into the basis.
    pub fn from_bigint(coeffs: &[BigInt], basis: &RnsBasis) -> Result<Self> {
        if coeffs.len() != basis.ring_degree {
            return Err(MatchError::DimensionMismatch {
                expected: basis.ring_degree,
                got: coeffs.len(),
            });
        }
        let mut components = Vec::with_capacity(basis.num_moduli());
        for (&q, plan) in basis.moduli.iter().zip(basis.plans.iter()) {
            let q_big = BigInt::from(q);
            let reduced = coeffs.iter().map(|c| {
                let mut r = c % &q_big;
                if r.is_negative() {
                    r += &q_big;
                }
                r.to_u64().ok_or_else(|| MatchError::InvalidParam(
                    "residue does not fit in u64".into()
                ))
            }).collect::<Result<Vec<_>>>()?;
            let cp = CoeffPoly { coeffs: reduced, modulus: q };
            components.push(NttPoly::from_coeff_poly(&cp, plan.clone())?);
        }
        Ok(Self {
            components,
            ring_degree: basis.ring_degree,
        })
    }

    /// Rebuild from raw NTT-domain residues, one vector per prime.
    pub fn from_residues(residues: Vec<Vec<u64>>, basis: &RnsBasis) -> Result<Self> {
        if residues.len() != basis.num_moduli() {
            return Err(MatchError::DimensionMismatch {
                expected: basis.num_moduli(),
                got: residues.len(),
            });
        }
        let components = residues.into_iter()
            .zip(basis.plans.iter())
            .map(|(evals, plan)| NttPoly::from_evals(evals, basis.ring_degree, plan.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            components,
            ring_degree: basis.ring_degree,
        })
    }

    /// NTT-domain residues, one vector per prime.
    pub fn residues(&self) -> Vec<Vec<u64>> {
        self.components.iter().map(|c| c.evals.clone()).collect()
    }

    /// Exact CRT reconstruction of every coefficient, centered in (-Q/2, Q/2].
    pub fn to_bigint_centered(&self, basis: &RnsBasis) -> Vec<BigInt> {
        let coeff_components: Vec<CoeffPoly> = self.components.iter()
            .map(|ntt| ntt.to_coeff_poly())
            .collect();
        let half = basis.product() >> 1;

        (0..self.ring_degree)
            .map(|j| basis.reconstruct_centered(
                coeff_components.iter().map(|cp| cp.coeffs[j]),
                &half,
            ))
            .collect()
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.components.len() != other.components.len() {
            return Err(MatchError::DimensionMismatch {
                expected: self.components.len(),
                got: other.components.len(),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        out.add_assign(other)?;
        Ok(out)
    }

    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        for (a, b) in self.components.iter_mut().zip(other.components.iter()) {
            a.add_assign(b)?;
        }
        Ok(())
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let components = self.components.iter()
            .zip(other.components.iter())
            .map(|(a, b)| a.sub(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, ring_degree: self.ring_degree })
    }

    pub fn neg(&self) -> Self {
        let components = self.components.iter().map(|a| a.neg()).collect();
        Self { components, ring_degree: self.ring_degree }
    }

    /// Negacyclic product, prime by prime.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let components = self.components.iter()
            .zip(other.components.iter())
            .map(|(a, b)| a.mul(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, ring_degree: self.ring_degree })
    }

    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let components = self.components.iter()
            .map(|c| c.scalar_mul(scalar))
            .collect();
        Self { components, ring_degree: self.ring_degree }
    }

    /// Apply X -> X^k. The automorphism commutes with reduction mod each q_i,
    /// so it is applied prime by prime without CRT.
    pub fn automorphism(&self, k: usize) -> Result<Self> {
        let components = self.components.iter()
            .map(|c| {
                let permuted = c.to_coeff_poly().automorphism(k);
                NttPoly::from_coeff_poly(&permuted, c.plan.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components, ring_degree: self.ring_degree })
    }

    /// Re-express the polynomial over another basis using its centered
    /// representative. Exact as long as the centered coefficients fit the
    /// target basis.
    pub fn switch_basis(&self, from: &RnsBasis, to: &RnsBasis) -> Result<Self> {
        let centered = self.to_bigint_centered(from);
        Self::from_bigint(&centered, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_N: usize = 16;
    const Q0: u64 = 18014398508400641;
    const Q1: u64 = 18014398508138497;
    const P0: u64 = 2305843009213317121;

    fn basis() -> RnsBasis {
        RnsBasis::new(vec![Q0, Q1], TEST_N).unwrap()
    }

    #[test]
    fn test_basis_rejects_repeated_prime() {
        assert!(RnsBasis::new(vec![Q0, Q0], TEST_N).is_err());
        assert!(RnsBasis::new(vec![], TEST_N).is_err());
    }

    #[test]
    fn test_signed_roundtrip_through_crt() {
        let basis = basis();
        let coeffs: Vec<i64> = (0..TEST_N as i64).map(|i| if i % 2 == 0 { -i * 1000 } else { i }).collect();
        let poly = RnsPoly::from_signed(&coeffs, &basis).unwrap();
        let back = poly.to_bigint_centered(&basis);
        let expected: Vec<BigInt> = coeffs.iter().map(|&c| BigInt::from(c)).collect();
        assert_eq!(back, expected);
    }

    #[test]
    fn test_bigint_roundtrip_wide_values() {
        let basis = basis();
        // Values beyond 64 bits but well inside Q/2 (~2^107).
        let big = BigInt::from(1u128 << 100);
        let coeffs: Vec<BigInt> = (0..TEST_N)
            .map(|i| if i % 3 == 0 { -big.clone() - i } else { big.clone() + i })
            .collect();
        let poly = RnsPoly::from_bigint(&coeffs, &basis).unwrap();
        assert_eq!(poly.to_bigint_centered(&basis), coeffs);
    }

    #[test]
    fn test_rns_mul_matches_signed_schoolbook() {
        let basis = basis();
        let mut a = vec![0i64; TEST_N];
        let mut b = vec![0i64; TEST_N];
        a[0] = 3; a[15] = -2;
        b[1] = 5; b[2] = -7;
        let pa = RnsPoly::from_signed(&a, &basis).unwrap();
        let pb = RnsPoly::from_signed(&b, &basis).unwrap();
        let prod = pa.mul(&pb).unwrap().to_bigint_centered(&basis);

        // 3·5X + 3·(-7)X^2 + (-2)·5·X^16 + (-2)(-7)X^17 with X^16 = -1
        let mut expected = vec![BigInt::zero(); TEST_N];
        expected[0] = BigInt::from(10);
        expected[1] = BigInt::from(15 - 14);
        expected[2] = BigInt::from(-21);
        assert_eq!(prod, expected);
    }

    #[test]
    fn test_switch_basis_preserves_centered_value() {
        let basis_q = basis();
        let basis_qp = basis_q.extend(&RnsBasis::new(vec![P0], TEST_N).unwrap()).unwrap();
        let coeffs: Vec<i64> = (0..TEST_N as i64).map(|i| (i - 8) * 123_456_789).collect();
        let poly = RnsPoly::from_signed(&coeffs, &basis_q).unwrap();
        let extended = poly.switch_basis(&basis_q, &basis_qp).unwrap();
        assert_eq!(extended.num_components(), 3);
        let expected: Vec<BigInt> = coeffs.iter().map(|&c| BigInt::from(c)).collect();
        assert_eq!(extended.to_bigint_centered(&basis_qp), expected);
    }

    #[test]
    fn test_automorphism_per_prime_matches_coefficient_map() {
        let basis = basis();
        let mut coeffs = vec![0i64; TEST_N];
        coeffs[1] = 4;
        coeffs[6] = -9;
        let poly = RnsPoly::from_signed(&coeffs, &basis).unwrap();
        let rotated = poly.automorphism(3).unwrap().to_bigint_centered(&basis);

        // X -> X^3: X^1 -> X^3, X^6 -> X^18 = -X^2
        let mut expected = vec![BigInt::zero(); TEST_N];
        expected[3] = BigInt::from(4);
        expected[2] = BigInt::from(9);
        assert_eq!(rotated, expected);
    }

    #[test]
    fn test_residues_roundtrip() {
        let basis = basis();
        let coeffs: Vec<i64> = (0..TEST_N as i64).collect();
        let poly = RnsPoly::from_signed(&coeffs, &basis).unwrap();
        let rebuilt = RnsPoly::from_residues(poly.residues(), &basis).unwrap();
        assert_eq!(rebuilt.components, poly.components);
        assert!(RnsPoly::from_residues(vec![vec![0; TEST_N]], &basis).is_err());
    }
}
