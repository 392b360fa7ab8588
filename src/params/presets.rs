use std::sync::Arc;
use crate::error::Result;
use crate::params::{ContextBuilder, EncryptionContext};

/// 20-bit batching prime: 1032193 = 63·2^14 + 1, so t ≡ 1 (mod 2N) for every N ≤ 8192.
pub const PLAIN_MODULUS: u64 = 1032193;

/// Two 54-bit NTT-friendly primes (≡ 1 mod 2^14), Q ≈ 2^108.
pub const CT_MODULI: &[u64] = &[
    18014398508400641,
    18014398508138497,
];

/// Three 61-bit NTT-friendly primes (≡ 1 mod 2^14), P ≈ 2^183 > 2·8192·Q.
pub const AUX_MODULI: &[u64] = &[
    2305843009213317121,
    2305843009213120513,
    2305843009212694529,
];

/// Deployment parameters for face-embedding matching.
///
/// N = 4096 gives 2048 slots per row, enough for common embedding sizes.
/// With Q ≈ 2^108 a fresh ciphertext carries roughly 60 bits of noise
/// budget, comfortably more than one multiplication plus eleven rotations
/// consume.
pub fn face_matching() -> Result<Arc<EncryptionContext>> {
    ContextBuilder::new()
        .ring_degree(4096)
        .plain_modulus(PLAIN_MODULUS)
        .ct_moduli(CT_MODULI.to_vec())
        .aux_moduli(AUX_MODULI.to_vec())
        .sigma(3.2)
        .gadget_base(1 << 16)
        .build()
}

/// Compact parameters for fast tests and examples: N = 16, row size 8.
/// Not secure.
pub fn compact() -> Result<Arc<EncryptionContext>> {
    ContextBuilder::new()
        .ring_degree(16)
        .plain_modulus(PLAIN_MODULUS)
        .ct_moduli(CT_MODULI.to_vec())
        .aux_moduli(AUX_MODULI.to_vec())
        .sigma(3.2)
        .gadget_base(1 << 16)
        .build()
}
