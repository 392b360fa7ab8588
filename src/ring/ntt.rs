use std::sync::Arc;
use concrete_ntt::prime64::Plan;

use crate::error::{MatchError, Result};
use crate::ring::modular::{barrett_constant, mod_add, mod_mul, mod_neg, mod_sub};
use crate::ring::poly::CoeffPoly;

/// Polynomial in NTT (evaluation) representation over Z_q[X]/(X^n + 1).
///
/// The evaluation order is whatever `concrete-ntt` produces; only pointwise
/// operations are performed in this domain, so the order never leaks out.
#[derive(Clone, Debug)]
pub struct NttPoly {
    pub evals: Vec<u64>,
    pub modulus: u64,
    pub plan: Arc<Plan>,
}

/// Build an NTT plan for (n, q). `q` must be prime with q ≡ 1 (mod 2n).
pub fn make_plan(n: usize, modulus: u64) -> Result<Arc<Plan>> {
    if !n.is_power_of_two() || n < 16 {
        return Err(MatchError::InvalidRingDegree(n));
    }
    let plan = Plan::try_new(n, modulus)
        .ok_or_else(|| MatchError::InvalidParam(
            format!("cannot create NTT plan for n={n}, q={modulus} (need prime q ≡ 1 mod {})", 2 * n)
        ))?;
    Ok(Arc::new(plan))
}

impl NttPoly {
    pub fn zero(n: usize, modulus: u64, plan: Arc<Plan>) -> Self {
        Self {
            evals: vec![0u64; n],
            modulus,
            plan,
        }
    }

    /// Wrap evaluations that are already in NTT form (e.g. read back from disk).
    pub fn from_evals(evals: Vec<u64>, n: usize, plan: Arc<Plan>) -> Result<Self> {
        let modulus = plan.modulus();
        if evals.len() != n {
            return Err(MatchError::DimensionMismatch {
                expected: n,
                got: evals.len(),
            });
        }
        if evals.iter().any(|&e| e >= modulus) {
            return Err(MatchError::ModulusMismatch);
        }
        Ok(Self { evals, modulus, plan })
    }

    /// Forward NTT.
    pub fn from_coeff_poly(poly: &CoeffPoly, plan: Arc<Plan>) -> Result<Self> {
        if poly.modulus != plan.modulus() {
            return Err(MatchError::ModulusMismatch);
        }
        let mut evals = poly.coeffs.clone();
        plan.fwd(&mut evals);
        Ok(Self {
            evals,
            modulus: poly.modulus,
            plan,
        })
    }

    /// Inverse NTT, normalized by 1/n.
    pub fn to_coeff_poly(&self) -> CoeffPoly {
        let mut coeffs = self.evals.clone();
        self.plan.inv(&mut coeffs);
        self.plan.normalize(&mut coeffs);
        CoeffPoly {
            coeffs,
            modulus: self.modulus,
        }
    }

    pub fn len(&self) -> usize {
        self.evals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evals.is_empty()
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.len() != other.len() || self.modulus != other.modulus {
            return Err(MatchError::ModulusMismatch);
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
        let q = self.modulus;
        for (a, &b) in self.evals.iter_mut().zip(other.evals.iter()) {
            *a = mod_add(*a, b, q);
        }
        Ok(())
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let q = self.modulus;
        let evals = self.evals.iter()
            .zip(other.evals.iter())
            .map(|(&a, &b)| mod_sub(a, b, q))
            .collect();
        Ok(Self { evals, modulus: q, plan: self.plan.clone() })
    }

    pub fn neg(&self) -> Self {
        let evals = self.evals.iter().map(|&a| mod_neg(a, self.modulus)).collect();
        Self { evals, modulus: self.modulus, plan: self.plan.clone() }
    }

    /// Pointwise product (= negacyclic polynomial product).
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let bk = barrett_constant(self.modulus);
        let evals = self.evals.iter()
            .zip(other.evals.iter())
            .map(|(&a, &b)| mod_mul(a, b, self.modulus, bk))
            .collect();
        Ok(Self { evals, modulus: self.modulus, plan: self.plan.clone() })
    }

    pub fn scalar_mul(&self, scalar: u64) -> Self {
        let s = scalar % self.modulus;
        let bk = barrett_constant(self.modulus);
        let evals = self.evals.iter()
            .map(|&a| mod_mul(a, s, self.modulus, bk))
            .collect();
        Self { evals, modulus: self.modulus, plan: self.plan.clone() }
    }
}

impl PartialEq for NttPoly {
    fn eq(&self, other: &Self) -> bool {
        self.modulus == other.modulus && self.evals == other.evals
    }
}
