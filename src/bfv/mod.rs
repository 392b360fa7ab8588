pub mod keygen;
pub mod encrypt;
pub mod eval;
pub mod encoding;
pub mod keyswitch;
pub mod noise;

pub use keygen::{SecretKey, PublicKey, RelinKey, GaloisKey, RotationKeys, KeySwitchKey};
pub use keygen::{
    gen_secret_key_with_rng, gen_public_key_with_rng, gen_relin_key_with_rng,
    gen_galois_key_with_rng, gen_rotation_keys_with_rng,
};
pub use encrypt::{encrypt_pk_with_rng, encrypt_sk_with_rng, decrypt};
pub use eval::{bfv_add, bfv_sub, bfv_neg, bfv_mul, bfv_mul_and_relin, bfv_rotate_rows, bfv_rotate_rows_by};
pub use encoding::BatchEncoder;
pub use keyswitch::{gadget_decompose, key_switch, relinearize};
pub use noise::noise_budget;

use std::sync::Arc;
use crate::error::{MatchError, Result};
use crate::params::EncryptionContext;
use crate::ring::rns::RnsPoly;

/// A BFV ciphertext: (c0, c1, ..., c_k) where k=1 for fresh, k=2 after mul (before relin).
#[derive(Clone, Debug)]
pub struct BfvCiphertext {
    /// Ciphertext components. Typically 2 (c0, c1) or 3 after multiplication.
    pub c: Vec<RnsPoly>,
    /// Context the ciphertext was produced under.
    pub context: Arc<EncryptionContext>,
}

impl BfvCiphertext {
    pub fn degree(&self) -> usize {
        self.c.len().saturating_sub(1)
    }

    /// Fail with `ContextMismatch` unless both ciphertexts share parameters.
    pub fn check_compatible(&self, other: &BfvCiphertext) -> Result<()> {
        same_context(&self.context, &other.context)
    }
}

/// `ContextMismatch` unless the two contexts carry the same descriptor.
pub(crate) fn same_context(a: &Arc<EncryptionContext>, b: &Arc<EncryptionContext>) -> Result<()> {
    if Arc::ptr_eq(a, b) || a.descriptor() == b.descriptor() {
        return Ok(());
    }
    Err(MatchError::ContextMismatch(format!(
        "operands were created under different parameters ({} vs {})",
        a.descriptor(),
        b.descriptor()
    )))
}
