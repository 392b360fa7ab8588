//! Homomorphic matching: encrypted inner products between templates.

use std::sync::Arc;
use rayon::prelude::*;
use tracing::debug;

use crate::bfv::{bfv_add, bfv_mul_and_relin, bfv_rotate_rows, same_context, BfvCiphertext, RelinKey, RotationKeys};
use crate::enroll::{EncryptedTemplate, GalleryStore};
use crate::error::{MatchError, Result};
use crate::keys::PublicKeySet;
use crate::params::EncryptionContext;
use crate::persist::{BlobKind, CiphertextWire, Persist};

/// Encrypted result of one comparison; slot 0 holds
/// precision² · <probe, gallery> (every row-0 slot does, in fact).
#[derive(Clone, Debug)]
pub struct EncryptedScore {
    pub probe: usize,
    pub gallery: usize,
    ct: BfvCiphertext,
}

impl EncryptedScore {
    pub fn new(probe: usize, gallery: usize, ct: BfvCiphertext) -> Self {
        Self { probe, gallery, ct }
    }

    pub fn ciphertext(&self) -> &BfvCiphertext {
        &self.ct
    }
}

impl Persist for EncryptedScore {
    const KIND: BlobKind = BlobKind::Ciphertext;
    type Wire = CiphertextWire;

    fn context(&self) -> &Arc<EncryptionContext> {
        &self.ct.context
    }

    fn to_wire(&self) -> CiphertextWire {
        self.ct.to_wire()
    }

    fn from_wire(wire: CiphertextWire, context: &Arc<EncryptionContext>) -> Result<Self> {
        Ok(Self::new(0, 0, BfvCiphertext::from_wire(wire, context)?))
    }
}

/// Sum every row's slots into every slot of that row.
///
/// After rotating by 2^k and adding for k = 0 .. log2(row_size) - 1, slot i
/// holds Σ_j slot[(i + j) mod row_size], i.e. the full row sum.
pub fn rotate_and_sum(ct: &BfvCiphertext, keys: &RotationKeys) -> Result<BfvCiphertext> {
    let row_size = ct.context.row_size();
    let mut acc = ct.clone();
    let mut step = 1;
    while step < row_size {
        let rotated = bfv_rotate_rows(&acc, keys.get(step)?)?;
        acc = bfv_add(&acc, &rotated)?;
        step <<= 1;
    }
    Ok(acc)
}

/// Inner products of encrypted templates using only public key material.
#[derive(Clone, Debug)]
pub struct MatchingEngine {
    relin: RelinKey,
    rotation: RotationKeys,
}

impl MatchingEngine {
    /// Fails with `MissingKey` unless every reduction step has a rotation key.
    pub fn new(keys: &PublicKeySet) -> Result<Self> {
        let context = keys.context();
        same_context(context, &keys.relin.context)?;
        same_context(context, &keys.rotation.context)?;
        for step in context.reduction_steps() {
            keys.rotation.get(step)?;
        }
        Ok(Self {
            relin: keys.relin.clone(),
            rotation: keys.rotation.clone(),
        })
    }

    pub fn context(&self) -> &Arc<EncryptionContext> {
        &self.relin.context
    }

    fn score(&self, probe: &EncryptedTemplate, entry: &EncryptedTemplate) -> Result<BfvCiphertext> {
        same_context(self.context(), probe.context())?;
        same_context(self.context(), entry.context())?;
        let product = bfv_mul_and_relin(probe.ciphertext(), entry.ciphertext(), &self.relin)?;
        rotate_and_sum(&product, &self.rotation)
    }

    /// Multiply, relinearize, rotate-and-sum one pair. The score is labelled
    /// with `(probe_index, gallery_index)`.
    pub fn match_pair(
        &self,
        (probe_index, gallery_index): (usize, usize),
        probe: &EncryptedTemplate,
        entry: &EncryptedTemplate,
    ) -> Result<EncryptedScore> {
        Ok(EncryptedScore::new(probe_index, gallery_index, self.score(probe, entry)?))
    }

    /// Score probe number `probe_index` against every gallery entry, in
    /// gallery order.
    pub fn match_gallery(
        &self,
        probe_index: usize,
        probe: &EncryptedTemplate,
        gallery: &GalleryStore,
    ) -> Result<Vec<EncryptedScore>> {
        same_context(self.context(), gallery.context())?;
        gallery.entries()
            .par_iter()
            .enumerate()
            .map(|(g, entry)| Ok(EncryptedScore::new(probe_index, g, self.score(probe, entry)?)))
            .collect()
    }

    /// Score every probe against every entry; results are ordered probe-major.
    pub fn match_all(&self, probes: &[EncryptedTemplate], gallery: &GalleryStore) -> Result<Vec<EncryptedScore>> {
        same_context(self.context(), gallery.context())?;
        let pairs: Vec<(usize, usize)> = (0..probes.len())
            .flat_map(|p| (0..gallery.len()).map(move |g| (p, g)))
            .collect();
        debug!(pairs = pairs.len(), "matching all pairs");

        pairs.par_iter()
            .map(|&(p, g)| {
                let entry = gallery.get(g)
                    .ok_or_else(|| MatchError::DimensionMismatch { expected: gallery.len(), got: g })?;
                Ok(EncryptedScore::new(p, g, self.score(&probes[p], entry)?))
            })
            .collect()
    }
}
