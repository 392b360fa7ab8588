//! # cipherface: encrypted 1:1 face-template matching
//!
//! Face embeddings are quantized to fixed point, packed into the slots of a
//! BFV plaintext, and encrypted under a public key. A matching party holding
//! only public key material multiplies a probe with a gallery template,
//! relinearizes, and folds the product with log2(row_size) rotations so that
//! slot 0 carries the scaled inner product. Only the holder of the secret key
//! can read the score.
//!
//! The BFV scheme is implemented here directly: RNS polynomial arithmetic
//! with `concrete-ntt`, exact big-integer rescaling for multiplication, and
//! gadget key switching for relinearization and rotations.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cipherface::prelude::*;
//!
//! let ctx = cipherface::params::presets::compact().unwrap();
//! let keys = FullKeySet::generate(&ctx).unwrap();
//!
//! let encryptor = TemplateEncryptor::new(&ctx, &keys.public_keys().public, 125.0).unwrap();
//! let gallery_entry = encryptor.encrypt(&[0.6, 0.8]).unwrap();
//! let probe = encryptor.encrypt(&[0.8, 0.6]).unwrap();
//!
//! let engine = MatchingEngine::new(keys.public_keys()).unwrap();
//! let encrypted = engine.match_pair((0, 0), &probe, &gallery_entry).unwrap();
//!
//! let decoder = ScoreDecoder::new(keys.secret_key(), 125.0).unwrap();
//! let score = decoder.decode(&encrypted).unwrap();
//! assert!((score - 0.96).abs() < 0.02);
//! ```

pub mod error;
pub mod params;
pub mod ring;
pub mod sampling;
pub mod bfv;
pub mod codec;
pub mod persist;
pub mod keys;
pub mod io;
pub mod enroll;
pub mod matching;
pub mod score;

/// Convenient re-exports for common types and functions.
pub mod prelude {
    pub use crate::error::{MatchError, Result};
    pub use crate::params::{ContextBuilder, ContextDescriptor, EncryptionContext};
    pub use crate::bfv::{BfvCiphertext, SecretKey, PublicKey, RelinKey, RotationKeys};
    pub use crate::codec::{quantize, dequantize_component, dequantize_scalar, QuantizedSlots};
    pub use crate::keys::{FullKeySet, PublicKeySet};
    pub use crate::io::{read_feature_file, write_feature_file, FeatureMatrix};
    pub use crate::enroll::{EncryptedTemplate, GalleryStore, TemplateEncryptor};
    pub use crate::matching::{rotate_and_sum, EncryptedScore, MatchingEngine};
    pub use crate::score::{MatchResult, ScoreDecoder};
    pub use crate::persist::Persist;
}
