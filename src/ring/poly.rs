use crate::error::{MatchError, Result};
use crate::ring::modular::{barrett_constant, mod_add, mod_mul, mod_sub};

/// Polynomial in coefficient representation over Z_q[X]/(X^n + 1).
#[derive(Clone, Debug)]
pub struct CoeffPoly {
    pub coeffs: Vec<u64>,
    pub modulus: u64,
}

impl CoeffPoly {
    /// Create a zero polynomial of degree < n in Z_q.
    pub fn zero(n: usize, modulus: u64) -> Self {
        Self {
            coeffs: vec![0u64; n],
            modulus,
        }
    }

    /// Create a polynomial from coefficients (reduced mod q).
    pub fn from_coeffs(coeffs: Vec<u64>, modulus: u64) -> Self {
        let mut p = Self { coeffs, modulus };
        p.reduce();
        p
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Reduce all coefficients mod q.
    pub fn reduce(&mut self) {
        for c in self.coeffs.iter_mut() {
            *c %= self.modulus;
        }
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(MatchError::DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        if self.modulus != other.modulus {
            return Err(MatchError::ModulusMismatch);
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let coeffs = self.coeffs.iter()
            .zip(other.coeffs.iter())
            .map(|(&a, &b)| mod_add(a, b, self.modulus))
            .collect();
        Ok(Self { coeffs, modulus: self.modulus })
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let coeffs = self.coeffs.iter()
            .zip(other.coeffs.iter())
            .map(|(&a, &b)| mod_sub(a, b, self.modulus))
            .collect();
        Ok(Self { coeffs, modulus: self.modulus })
    }

    /// Schoolbook multiply in Z_q[X]/(X^n+1).
    /// Reference implementation for tests; the NTT path is used everywhere else.
    pub fn mul_naive(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let n = self.len();
        let bk = barrett_constant(self.modulus);
        let mut result = vec![0u64; n];

        for i in 0..n {
            if self.coeffs[i] == 0 {
                continue;
            }
            for j in 0..n {
                if other.coeffs[j] == 0 {
                    continue;
                }
                let prod = mod_mul(self.coeffs[i], other.coeffs[j], self.modulus, bk);
                let idx = i + j;
                if idx < n {
                    result[idx] = mod_add(result[idx], prod, self.modulus);
                } else {
                    // X^n ≡ -1
                    result[idx - n] = mod_sub(result[idx - n], prod, self.modulus);
                }
            }
        }

        Ok(Self { coeffs: result, modulus: self.modulus })
    }

    /// Apply the automorphism X -> X^k.
    ///
    /// X^i maps to X^{ik} reduced modulo X^n + 1, so the result is a signed
    /// permutation of the coefficients. `k` must be odd.
    pub fn automorphism(&self, k: usize) -> Self {
        let n = self.len();
        let q = self.modulus;
        let mut result = vec![0u64; n];

        for (i, &c) in self.coeffs.iter().enumerate() {
            if c == 0 {
                continue;
            }
            let new_exp = (i * k) % (2 * n);
            if new_exp < n {
                result[new_exp] = mod_add(result[new_exp], c, q);
            } else {
                // X^{n+j} = -X^j
                let j = new_exp - n;
                result[j] = mod_sub(result[j], c, q);
            }
        }

        Self { coeffs: result, modulus: q }
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0)
    }
}

impl PartialEq for CoeffPoly {
    fn eq(&self, other: &Self) -> bool {
        self.modulus == other.modulus && self.coeffs == other.coeffs
    }
}
