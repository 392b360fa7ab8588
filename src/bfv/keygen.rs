use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroize;

use crate::error::{MatchError, Result};
use crate::params::EncryptionContext;
use crate::ring::rns::RnsPoly;
use crate::sampling::{sample_ternary, sample_uniform_poly};

/// BFV secret key: s ∈ R_q (ternary polynomial, stored in NTT/RNS form).
pub struct SecretKey {
    /// s in RNS-NTT form.
    pub poly: RnsPoly,
    /// Signed coefficients of s, each in {-1, 0, 1}.
    coeffs: Vec<i64>,
    pub context: Arc<EncryptionContext>,
}

impl SecretKey {
    /// Rebuild a secret key from its ternary coefficients.
    pub fn from_coeffs(context: &Arc<EncryptionContext>, coeffs: Vec<i64>) -> Result<Self> {
        if coeffs.len() != context.ring_degree {
            return Err(MatchError::DimensionMismatch {
                expected: context.ring_degree,
                got: coeffs.len(),
            });
        }
        if coeffs.iter().any(|c| !(-1..=1).contains(c)) {
            return Err(MatchError::MalformedInput("secret key coefficients must be ternary".into()));
        }
        let poly = RnsPoly::from_signed(&coeffs, &context.ct_basis)?;
        Ok(Self {
            poly,
            coeffs,
            context: context.clone(),
        })
    }

    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        // Zero out secret key material
        for comp in &mut self.poly.components {
            comp.evals.zeroize();
        }
        self.coeffs.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("ring_degree", &self.poly.ring_degree)
            .finish_non_exhaustive()
    }
}

/// BFV public key: pk = (pk0, pk1) where pk0 = -(a·s + e), pk1 = a.
#[derive(Clone, Debug)]
pub struct PublicKey {
    pub pk0: RnsPoly,
    pub pk1: RnsPoly,
    pub context: Arc<EncryptionContext>,
}

/// Gadget key-switching key from some s' to s.
///
/// Entry i is (-(a_i·s + e_i) + B^i·s', a_i), so that
/// Σ_i d_i·(k0_i + k1_i·s) ≈ (Σ_i d_i·B^i)·s' for small digits d_i.
#[derive(Clone, Debug)]
pub struct KeySwitchKey {
    pub keys: Vec<(RnsPoly, RnsPoly)>,
}

/// Relinearization key: switches s² to s.
#[derive(Clone, Debug)]
pub struct RelinKey {
    pub ksk: KeySwitchKey,
    pub context: Arc<EncryptionContext>,
}

/// Galois key for automorphism X → X^k (for rotations).
#[derive(Clone, Debug)]
pub struct GaloisKey {
    /// Key-switch key from s(X^k) to s(X).
    pub ksk: KeySwitchKey,
    /// The Galois element k.
    pub element: usize,
    pub context: Arc<EncryptionContext>,
}

/// Galois keys indexed by row-rotation step.
#[derive(Clone, Debug)]
pub struct RotationKeys {
    pub keys: BTreeMap<usize, GaloisKey>,
    pub context: Arc<EncryptionContext>,
}

impl RotationKeys {
    /// Key rotating rows left by `steps`, or `MissingKey`.
    pub fn get(&self, steps: usize) -> Result<&GaloisKey> {
        self.keys.get(&steps)
            .ok_or_else(|| MatchError::MissingKey(format!("rotation by {steps} slots")))
    }

    pub fn steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Generate a secret key (ternary distribution).
pub fn gen_secret_key_with_rng<R: rand::Rng + ?Sized>(
    context: &Arc<EncryptionContext>,
    rng: &mut R,
) -> Result<SecretKey> {
    let coeffs = sample_ternary(context.ring_degree, rng);
    SecretKey::from_coeffs(context, coeffs)
}

/// Generate a public key from a secret key.
pub fn gen_public_key_with_rng<R: rand::Rng + ?Sized>(
    sk: &SecretKey,
    rng: &mut R,
) -> Result<PublicKey> {
    let context = &sk.context;
    let basis = &context.ct_basis;

    let a = sample_uniform_poly(basis, rng)?;
    let e = context.gaussian.sample_poly(basis, rng)?;

    // pk0 = -(a·s + e) mod q
    let pk0 = a.mul(&sk.poly)?.add(&e)?.neg();

    Ok(PublicKey {
        pk0,
        pk1: a,
        context: context.clone(),
    })
}

/// Key-switching key from `target` to the secret `sk`.
fn gen_key_switch_key<R: rand::Rng + ?Sized>(
    sk: &SecretKey,
    target: &RnsPoly,
    rng: &mut R,
) -> Result<KeySwitchKey> {
    let context = &sk.context;
    let basis = &context.ct_basis;

    let mut keys = Vec::with_capacity(context.gadget_digits);
    let mut gadget_target = target.clone(); // base^0 * target

    for i in 0..context.gadget_digits {
        let a = sample_uniform_poly(basis, rng)?;
        let e = context.gaussian.sample_poly(basis, rng)?;

        // k0_i = -(a_i·s + e_i) + B^i·target
        let k0 = a.mul(&sk.poly)?.add(&e)?.neg().add(&gadget_target)?;
        keys.push((k0, a));

        if i + 1 < context.gadget_digits {
            gadget_target = gadget_target.scalar_mul(context.gadget_base);
        }
    }

    Ok(KeySwitchKey { keys })
}

/// Generate a relinearization key.
pub fn gen_relin_key_with_rng<R: rand::Rng + ?Sized>(
    sk: &SecretKey,
    rng: &mut R,
) -> Result<RelinKey> {
    let s_sq = sk.poly.mul(&sk.poly)?;
    Ok(RelinKey {
        ksk: gen_key_switch_key(sk, &s_sq, rng)?,
        context: sk.context.clone(),
    })
}

/// Generate a Galois key for automorphism X → X^element.
pub fn gen_galois_key_with_rng<R: rand::Rng + ?Sized>(
    sk: &SecretKey,
    element: usize,
    rng: &mut R,
) -> Result<GaloisKey> {
    if element % 2 == 0 {
        return Err(MatchError::InvalidParam(format!("Galois element {element} must be odd")));
    }
    let s_auto = sk.poly.automorphism(element)?;
    Ok(GaloisKey {
        ksk: gen_key_switch_key(sk, &s_auto, rng)?,
        element,
        context: sk.context.clone(),
    })
}

/// Galois keys for the given row-rotation steps.
pub fn gen_rotation_keys_with_rng<R: rand::Rng + ?Sized>(
    sk: &SecretKey,
    steps: &[usize],
    rng: &mut R,
) -> Result<RotationKeys> {
    let context = &sk.context;
    let mut keys = BTreeMap::new();
    for &step in steps {
        let element = context.galois_element(step);
        keys.insert(step, gen_galois_key_with_rng(sk, element, rng)?);
    }
    Ok(RotationKeys {
        keys,
        context: context.clone(),
    })
}
