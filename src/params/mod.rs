pub mod presets;

use std::fmt;
use std::sync::Arc;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::bfv::encoding::BatchEncoder;
use crate::error::{MatchError, Result};
use crate::ring::modular::is_prime;
use crate::ring::rns::RnsBasis;
use crate::sampling::DiscreteGaussian;

/// Immutable BFV parameter set shared by every party and pipeline stage.
///
/// Built once through [`ContextBuilder`] and passed around as
/// `Arc<EncryptionContext>`.
#[derive(Clone, Debug)]
pub struct EncryptionContext {
    /// Ring degree N (power of 2, at least 16).
    pub ring_degree: usize,
    /// Plaintext modulus t (prime, t ≡ 1 mod 2N).
    pub plain_modulus: u64,
    /// RNS basis for ciphertext modulus Q = ∏ q_i.
    pub ct_basis: Arc<RnsBasis>,
    /// Auxiliary basis P used only while multiplying.
    pub aux_basis: Arc<RnsBasis>,
    /// Q ∪ P, the basis the tensor product is computed in.
    pub ext_basis: Arc<RnsBasis>,
    /// Gaussian noise standard deviation.
    pub sigma: f64,
    /// Gadget decomposition base (for key switching).
    pub gadget_base: u64,
    /// Number of gadget digits, smallest d with base^d ≥ 2Q.
    pub gadget_digits: usize,
    /// Decoding refuses ciphertexts with fewer bits of budget left.
    pub min_noise_budget: u32,
    /// Δ = floor(Q / t) reduced modulo each q_i.
    pub delta_residues: Vec<u64>,
    pub(crate) gaussian: DiscreteGaussian,
    pub(crate) encoder: BatchEncoder,
    descriptor: ContextDescriptor,
}

/// The parameters two parties must agree on. Embedded in every persisted key
/// and ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDescriptor {
    pub ring_degree: u64,
    pub plain_modulus: u64,
    pub ct_moduli: Vec<u64>,
    pub gadget_base: u64,
}

impl fmt::Display for ContextDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N={}, t={}, q={:?}, B={}",
            self.ring_degree, self.plain_modulus, self.ct_moduli, self.gadget_base
        )
    }
}

impl EncryptionContext {
    /// Total number of batching slots (N).
    pub fn slot_count(&self) -> usize {
        self.ring_degree
    }

    /// Slots per row (N/2). Rotations act on each row independently.
    pub fn row_size(&self) -> usize {
        self.ring_degree / 2
    }

    pub fn descriptor(&self) -> &ContextDescriptor {
        &self.descriptor
    }

    /// Fail with `ContextMismatch` unless `other` was produced under these parameters.
    pub fn check_descriptor(&self, other: &ContextDescriptor) -> Result<()> {
        if &self.descriptor != other {
            return Err(MatchError::ContextMismatch(format!(
                "expected {}, found {}",
                self.descriptor, other
            )));
        }
        Ok(())
    }

    pub fn encoder(&self) -> &BatchEncoder {
        &self.encoder
    }

    /// Galois element 3^steps mod 2N; X -> X^g rotates both rows left by `steps`.
    pub fn galois_element(&self, steps: usize) -> usize {
        let two_n = 2 * self.ring_degree;
        let mut g = 1usize;
        for _ in 0..steps % self.row_size() {
            g = (g * 3) % two_n;
        }
        g
    }

    /// Rotation steps a full row reduction needs: 1, 2, 4, ..., row_size/2.
    pub fn reduction_steps(&self) -> Vec<usize> {
        let levels = self.row_size().trailing_zeros();
        (0..levels).map(|k| 1usize << k).collect()
    }

    /// bits(Q)
    pub fn ct_modulus_bits(&self) -> u32 {
        self.ct_basis.product().bits() as u32
    }

    /// Whether an inner product of `dim` components, each with magnitude at
    /// most `max_abs` before quantization at `precision`, can never wrap
    /// around the plaintext modulus.
    pub fn supports_inner_product(&self, dim: usize, precision: f64, max_abs: f64) -> bool {
        if dim > self.row_size() {
            return false;
        }
        let per_slot = (precision * max_abs).round();
        let bound = dim as f64 * per_slot * per_slot;
        bound < (self.plain_modulus / 2) as f64
    }

    /// Parameter summary for startup logs.
    pub fn summary(&self) -> ContextSummary<'_> {
        ContextSummary { ctx: self }
    }
}

/// Display adapter returned by [`EncryptionContext::summary`].
pub struct ContextSummary<'a> {
    ctx: &'a EncryptionContext,
}

impl fmt::Display for ContextSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        let bit_sizes: Vec<String> = ctx.ct_basis.moduli.iter()
            .map(|q| (64 - q.leading_zeros()).to_string())
            .collect();
        writeln!(f, "/ Encryption parameters:")?;
        writeln!(f, "| scheme: BFV")?;
        writeln!(f, "| poly_modulus_degree: {}", ctx.ring_degree)?;
        writeln!(
            f,
            "| coeff_modulus size: {} ({}) bits",
            ctx.ct_modulus_bits(),
            bit_sizes.join(" + ")
        )?;
        writeln!(f, "| plain_modulus: {}", ctx.plain_modulus)?;
        writeln!(f, "| gadget: base 2^{} x {} digits", ctx.gadget_base.trailing_zeros(), ctx.gadget_digits)?;
        write!(f, "\\ slots: {} ({} x {})", ctx.slot_count(), 2, ctx.row_size())
    }
}

/// Builder for EncryptionContext.
#[derive(Clone, Debug)]
pub struct ContextBuilder {
    ring_degree: usize,
    plain_modulus: u64,
    ct_moduli: Vec<u64>,
    aux_moduli: Vec<u64>,
    sigma: f64,
    gadget_base: u64,
    min_noise_budget: u32,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            ring_degree: 4096,
            plain_modulus: presets::PLAIN_MODULUS,
            ct_moduli: Vec::new(),
            aux_moduli: Vec::new(),
            sigma: 3.2,
            gadget_base: 1 << 16,
            min_noise_budget: 1,
        }
    }

    pub fn ring_degree(mut self, n: usize) -> Self {
        self.ring_degree = n;
        self
    }

    pub fn plain_modulus(mut self, t: u64) -> Self {
        self.plain_modulus = t;
        self
    }

    pub fn ct_moduli(mut self, moduli: Vec<u64>) -> Self {
        self.ct_moduli = moduli;
        self
    }

    pub fn aux_moduli(mut self, moduli: Vec<u64>) -> Self {
        self.aux_moduli = moduli;
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn gadget_base(mut self, base: u64) -> Self {
        self.gadget_base = base;
        self
    }

    pub fn min_noise_budget(mut self, bits: u32) -> Self {
        self.min_noise_budget = bits;
        self
    }

    pub fn build(self) -> Result<Arc<EncryptionContext>> {
        let n = self.ring_degree;
        if !n.is_power_of_two() || n < 16 {
            return Err(MatchError::InvalidRingDegree(n));
        }
        let two_n = 2 * n as u64;

        let t = self.plain_modulus;
        if !is_prime(t) {
            return Err(MatchError::InvalidParam(format!("plaintext modulus {t} is not prime")));
        }
        if t % two_n != 1 {
            return Err(MatchError::InvalidParam(format!(
                "plaintext modulus {t} does not support batching (need t ≡ 1 mod {two_n})"
            )));
        }

        if self.ct_moduli.is_empty() {
            return Err(MatchError::InvalidParam("must specify at least one ciphertext modulus".into()));
        }
        if self.aux_moduli.is_empty() {
            return Err(MatchError::InvalidParam("must specify at least one auxiliary modulus".into()));
        }
        for &q in self.ct_moduli.iter().chain(self.aux_moduli.iter()) {
            if !is_prime(q) || q % two_n != 1 {
                return Err(MatchError::InvalidParam(format!(
                    "modulus {q} is not an NTT-friendly prime for N={n}"
                )));
            }
            if q >= 1 << 62 {
                return Err(MatchError::InvalidParam(format!("modulus {q} exceeds 62 bits")));
            }
        }
        let mut all: Vec<u64> = self.ct_moduli.iter().chain(self.aux_moduli.iter()).copied().collect();
        all.sort_unstable();
        if all.windows(2).any(|w| w[0] == w[1]) {
            return Err(MatchError::InvalidParam("moduli must be distinct".into()));
        }
        if self.gadget_base < 2 {
            return Err(MatchError::InvalidParam("gadget base must be >= 2".into()));
        }

        let ct_basis = Arc::new(RnsBasis::new(self.ct_moduli.clone(), n)?);
        let aux_basis = Arc::new(RnsBasis::new(self.aux_moduli.clone(), n)?);
        let ext_basis = Arc::new(ct_basis.extend(&aux_basis)?);

        let q_big = ct_basis.product();
        if q_big <= &BigUint::from(t) {
            return Err(MatchError::InvalidParam("ciphertext modulus must exceed plaintext modulus".into()));
        }
        // Tensor coefficients are bounded by N·Q²/2 in absolute value; Q·P
        // must hold twice that.
        if aux_basis.product() <= &(q_big * (2 * n as u64)) {
            return Err(MatchError::InvalidParam(
                "auxiliary modulus too small for exact multiplication (need P > 2NQ)".into(),
            ));
        }

        let delta = q_big / t;
        let delta_residues = ct_basis.moduli.iter()
            .map(|&q| (&delta % q).to_u64().unwrap_or(0))
            .collect();

        let gadget_digits = compute_gadget_digits(q_big, self.gadget_base);
        let gaussian = DiscreteGaussian::new(self.sigma)?;
        let encoder = BatchEncoder::new(n, t)?;

        let descriptor = ContextDescriptor {
            ring_degree: n as u64,
            plain_modulus: t,
            ct_moduli: self.ct_moduli.clone(),
            gadget_base: self.gadget_base,
        };

        Ok(Arc::new(EncryptionContext {
            ring_degree: n,
            plain_modulus: t,
            ct_basis,
            aux_basis,
            ext_basis,
            sigma: self.sigma,
            gadget_base: self.gadget_base,
            gadget_digits,
            min_noise_budget: self.min_noise_budget,
            delta_residues,
            gaussian,
            encoder,
            descriptor,
        }))
    }
}

/// Smallest d with base^d ≥ 2Q, enough for a balanced decomposition of any
/// centered residue including the final carry.
fn compute_gadget_digits(q_big: &BigUint, base: u64) -> usize {
    let bound = q_big << 1;
    let base_big = BigUint::from(base);
    let mut pow = BigUint::one();
    let mut digits = 0usize;
    while pow < bound {
        pow *= &base_big;
        digits += 1;
    }
    digits.max(1)
}
