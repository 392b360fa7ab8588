//! Key lifecycle: generation, role-separated key sets, per-file persistence.
//!
//! [`FullKeySet`] is held only by the party that decrypts scores.
//! [`PublicKeySet`] is everything the encrypting and matching parties need
//! and has no path back to the secret key.

use std::path::Path;
use std::sync::Arc;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::bfv::keygen::{
    gen_public_key_with_rng, gen_relin_key_with_rng, gen_rotation_keys_with_rng,
    gen_secret_key_with_rng,
};
use crate::bfv::{PublicKey, RelinKey, RotationKeys, SecretKey, same_context};
use crate::error::Result;
use crate::params::EncryptionContext;
use crate::persist::Persist;

pub const PUBLIC_KEY_FILE: &str = "public_key_bfv_1_to_1.bin";
pub const SECRET_KEY_FILE: &str = "secret_key_bfv_1_to_1.bin";
pub const RELIN_KEY_FILE: &str = "relin_key_bfv_1_to_1.bin";
pub const GALOIS_KEY_FILE: &str = "galois_key_bfv_1_to_1.bin";

/// Keys that may be handed to the enrollment and matching parties.
#[derive(Clone, Debug)]
pub struct PublicKeySet {
    pub public: PublicKey,
    pub relin: RelinKey,
    pub rotation: RotationKeys,
}

/// The secret key together with its public counterparts.
#[derive(Debug)]
pub struct FullKeySet {
    secret: SecretKey,
    public: PublicKeySet,
}

impl PublicKeySet {
    /// Assemble a set, checking that all three keys share one context.
    pub fn new(public: PublicKey, relin: RelinKey, rotation: RotationKeys) -> Result<Self> {
        same_context(&public.context, &relin.context)?;
        same_context(&public.context, &rotation.context)?;
        Ok(Self { public, relin, rotation })
    }

    pub fn context(&self) -> &Arc<EncryptionContext> {
        &self.public.context
    }

    /// Write the public, relinearization and Galois key files. Never touches
    /// the secret key file.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        self.public.save(&dir.join(PUBLIC_KEY_FILE))?;
        self.relin.save(&dir.join(RELIN_KEY_FILE))?;
        self.rotation.save(&dir.join(GALOIS_KEY_FILE))?;
        debug!(dir = %dir.display(), "saved public key set");
        Ok(())
    }

    /// Load the three public key files; fails with `ContextMismatch` if any
    /// was generated under different parameters.
    pub fn load_from_dir(context: &Arc<EncryptionContext>, dir: &Path) -> Result<Self> {
        let public = PublicKey::load(&dir.join(PUBLIC_KEY_FILE), context)?;
        let relin = RelinKey::load(&dir.join(RELIN_KEY_FILE), context)?;
        let rotation = RotationKeys::load(&dir.join(GALOIS_KEY_FILE), context)?;
        debug!(dir = %dir.display(), rotations = rotation.len(), "loaded public key set");
        Self::new(public, relin, rotation)
    }
}

impl SecretKey {
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        self.save(&dir.join(SECRET_KEY_FILE))
    }

    pub fn load_from_dir(context: &Arc<EncryptionContext>, dir: &Path) -> Result<Self> {
        SecretKey::load(&dir.join(SECRET_KEY_FILE), context)
    }
}

impl FullKeySet {
    /// Fresh keys from an OS-seeded ChaCha20 generator.
    pub fn generate(context: &Arc<EncryptionContext>) -> Result<Self> {
        let mut rng = ChaCha20Rng::from_os_rng();
        Self::generate_with_rng(context, &mut rng)
    }

    /// Secret key, public key, relinearization key and rotation keys for
    /// every step of the row reduction (1, 2, 4, ..., row_size/2).
    pub fn generate_with_rng<R: rand::Rng + ?Sized>(
        context: &Arc<EncryptionContext>,
        rng: &mut R,
    ) -> Result<Self> {
        let secret = gen_secret_key_with_rng(context, rng)?;
        let public = gen_public_key_with_rng(&secret, rng)?;
        let relin = gen_relin_key_with_rng(&secret, rng)?;
        let steps = context.reduction_steps();
        let rotation = gen_rotation_keys_with_rng(&secret, &steps, rng)?;
        info!(
            ring_degree = context.ring_degree,
            rotation_keys = steps.len(),
            gadget_digits = context.gadget_digits,
            "generated key set"
        );
        Ok(Self {
            secret,
            public: PublicKeySet { public, relin, rotation },
        })
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_keys(&self) -> &PublicKeySet {
        &self.public
    }

    pub fn context(&self) -> &Arc<EncryptionContext> {
        &self.secret.context
    }

    /// Split into the secret key and the shareable public set.
    pub fn into_parts(self) -> (SecretKey, PublicKeySet) {
        (self.secret, self.public)
    }

    /// Write all four key files.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        self.public.save_to_dir(dir)?;
        self.secret.save_to_dir(dir)?;
        info!(dir = %dir.display(), "saved key files");
        Ok(())
    }

    pub fn load_from_dir(context: &Arc<EncryptionContext>, dir: &Path) -> Result<Self> {
        let secret = SecretKey::load_from_dir(context, dir)?;
        let public = PublicKeySet::load_from_dir(context, dir)?;
        Ok(Self { secret, public })
    }
}
