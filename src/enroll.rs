//! Enrollment: quantize, batch-encode and encrypt feature vectors.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::bfv::{encrypt_pk_with_rng, same_context, BfvCiphertext, PublicKey};
use crate::codec::quantize;
use crate::error::{MatchError, Result};
use crate::io::FeatureMatrix;
use crate::params::EncryptionContext;
use crate::persist::{BlobKind, CiphertextWire, Persist};

/// File name of the i-th encrypted gallery entry.
pub fn gallery_file_name(index: usize) -> String {
    format!("encrypted_gallery_bfv_1_to_1_{index}.bin")
}

/// An encrypted, batch-encoded template: row 0 holds the quantized
/// components, every other slot is zero. Immutable once created.
#[derive(Clone, Debug)]
pub struct EncryptedTemplate {
    ct: BfvCiphertext,
}

impl EncryptedTemplate {
    pub fn ciphertext(&self) -> &BfvCiphertext {
        &self.ct
    }

    pub fn context(&self) -> &Arc<EncryptionContext> {
        &self.ct.context
    }
}

impl Persist for EncryptedTemplate {
    const KIND: BlobKind = BlobKind::Ciphertext;
    type Wire = CiphertextWire;

    fn context(&self) -> &Arc<EncryptionContext> {
        &self.ct.context
    }

    fn to_wire(&self) -> CiphertextWire {
        self.ct.to_wire()
    }

    fn from_wire(wire: CiphertextWire, context: &Arc<EncryptionContext>) -> Result<Self> {
        let ct = BfvCiphertext::from_wire(wire, context)?;
        if ct.c.len() != 2 {
            return Err(MatchError::MalformedInput(format!(
                "template ciphertext must have 2 components, found {}", ct.c.len()
            )));
        }
        Ok(Self { ct })
    }
}

/// Turns plaintext feature vectors into [`EncryptedTemplate`]s under a public key.
#[derive(Clone, Debug)]
pub struct TemplateEncryptor {
    context: Arc<EncryptionContext>,
    public_key: PublicKey,
    precision: f64,
}

impl TemplateEncryptor {
    pub fn new(context: &Arc<EncryptionContext>, public_key: &PublicKey, precision: f64) -> Result<Self> {
        same_context(context, &public_key.context)?;
        if !precision.is_finite() || precision <= 0.0 {
            return Err(MatchError::InvalidParam(format!(
                "precision must be finite and positive, got {precision}"
            )));
        }
        Ok(Self {
            context: context.clone(),
            public_key: public_key.clone(),
            precision,
        })
    }

    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn context(&self) -> &Arc<EncryptionContext> {
        &self.context
    }

    /// Encrypt one vector with fresh OS randomness.
    pub fn encrypt(&self, vector: &[f32]) -> Result<EncryptedTemplate> {
        let mut rng = ChaCha20Rng::from_os_rng();
        self.encrypt_with_rng(vector, &mut rng)
    }

    pub fn encrypt_with_rng<R: rand::Rng + ?Sized>(
        &self,
        vector: &[f32],
        rng: &mut R,
    ) -> Result<EncryptedTemplate> {
        let slots = quantize(vector, self.precision, self.context.row_size())?;
        // Row 0 only; row 1 stays zero.
        let pt = self.context.encoder().encode_signed(slots.values())?;
        let ct = encrypt_pk_with_rng(&pt, &self.public_key, rng)?;
        Ok(EncryptedTemplate { ct })
    }

    fn check_dim(&self, features: &FeatureMatrix) -> Result<()> {
        let row_size = self.context.row_size();
        if features.dim() > row_size {
            return Err(MatchError::DimensionOverflow {
                dim: features.dim(),
                row_size,
            });
        }
        Ok(())
    }

    /// Encrypt every row in parallel, preserving order.
    pub fn enroll(&self, features: &FeatureMatrix) -> Result<GalleryStore> {
        self.check_dim(features)?;
        let entries = (0..features.count())
            .into_par_iter()
            .map(|i| {
                let row = features.row(i).unwrap_or_default();
                self.encrypt(row)
            })
            .collect::<Result<Vec<_>>>()?;
        info!(entries = entries.len(), dim = features.dim(), "enrolled gallery");
        Ok(GalleryStore {
            context: self.context.clone(),
            entries,
        })
    }

    /// Deterministic variant of [`enroll`](Self::enroll): row i draws from
    /// stream i of a ChaCha20 generator seeded with `seed`.
    pub fn enroll_with_seed(&self, features: &FeatureMatrix, seed: u64) -> Result<GalleryStore> {
        self.check_dim(features)?;
        let entries = (0..features.count())
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha20Rng::seed_from_u64(seed);
                rng.set_stream(i as u64);
                let row = features.row(i).unwrap_or_default();
                self.encrypt_with_rng(row, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;
        info!(entries = entries.len(), dim = features.dim(), seed, "enrolled gallery");
        Ok(GalleryStore {
            context: self.context.clone(),
            entries,
        })
    }
}

/// Ordered, append-only collection of encrypted templates.
#[derive(Clone, Debug)]
pub struct GalleryStore {
    context: Arc<EncryptionContext>,
    entries: Vec<EncryptedTemplate>,
}

impl GalleryStore {
    pub fn new(context: &Arc<EncryptionContext>) -> Self {
        Self {
            context: context.clone(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: EncryptedTemplate) -> Result<()> {
        same_context(&self.context, entry.context())?;
        self.entries.push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EncryptedTemplate> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[EncryptedTemplate] {
        &self.entries
    }

    pub fn context(&self) -> &Arc<EncryptionContext> {
        &self.context
    }

    /// Write one file per entry; returns the paths written.
    pub fn save_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            let path = dir.join(gallery_file_name(i));
            entry.save(&path)?;
            debug!(path = %path.display(), "saved gallery entry");
            paths.push(path);
        }
        Ok(paths)
    }

    /// Read entries 0..count back from `dir`.
    pub fn load_from_dir(context: &Arc<EncryptionContext>, dir: &Path, count: usize) -> Result<Self> {
        let entries = (0..count)
            .map(|i| EncryptedTemplate::load(&dir.join(gallery_file_name(i)), context))
            .collect::<Result<Vec<_>>>()?;
        debug!(entries = entries.len(), dir = %dir.display(), "loaded gallery");
        Ok(Self {
            context: context.clone(),
            entries,
        })
    }
}
