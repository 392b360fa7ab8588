use rand::Rng;

use crate::error::{MatchError, Result};
use crate::ring::rns::{RnsBasis, RnsPoly};

/// Discrete Gaussian sampler over Z, centered at 0.
///
/// Uses a constant-time CDT (cumulative distribution table) scan. The table
/// covers [-6σ, 6σ]; for σ = 3.2 that is [-20, 20] and the mass beyond it
/// is negligible.
#[derive(Clone, Debug)]
pub struct DiscreteGaussian {
    sigma: f64,
    tail: i64,
    cdf: Vec<f64>,
}

impl DiscreteGaussian {
    pub fn new(sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(MatchError::InvalidParam(format!("gaussian sigma must be positive, got {sigma}")));
        }
        let tail = (6.0 * sigma).ceil() as i64;
        let two_sigma_sq = 2.0 * sigma * sigma;

        // Unnormalized; sample() scales the uniform draw by the last entry.
        let mut cdf = Vec::with_capacity((2 * tail + 1) as usize);
        let mut cumulative = 0.0f64;
        for x in -tail..=tail {
            cumulative += (-((x * x) as f64) / two_sigma_sq).exp();
            cdf.push(cumulative);
        }

        Ok(Self { sigma, tail, cdf })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn tail(&self) -> i64 {
        self.tail
    }

    /// Draw one sample.
    ///
    /// The scan is branchless: every CDF entry is visited and a conditional
    /// select on integer masks picks the lowest index with u < cdf[i].
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let total = self.cdf[self.cdf.len() - 1];
        let u: f64 = rng.random::<f64>() * total;

        let mut result = self.tail;
        for i in (0..self.cdf.len()).rev() {
            let mask = ((u < self.cdf[i]) as i64).wrapping_neg();
            let candidate = -self.tail + i as i64;
            result = (candidate & mask) | (result & !mask);
        }
        result
    }

    pub fn sample_vec<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<i64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }

    /// Gaussian error polynomial, the same small integer lifted into every prime.
    pub fn sample_poly<R: Rng + ?Sized>(&self, basis: &RnsBasis, rng: &mut R) -> Result<RnsPoly> {
        let coeffs = self.sample_vec(basis.ring_degree, rng);
        RnsPoly::from_signed(&coeffs, basis)
    }
}
