//! Versioned binary envelopes for keys and ciphertexts.
//!
//! Every blob is a bincode-encoded [`BlobHeader`] followed by the payload.
//! The header carries the [`ContextDescriptor`] of the context that produced
//! the object, so loading under different parameters is caught before the
//! payload is even parsed.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::bfv::{BfvCiphertext, GaloisKey, KeySwitchKey, PublicKey, RelinKey, RotationKeys, SecretKey};
use crate::error::{MatchError, Result};
use crate::params::{ContextDescriptor, EncryptionContext};
use crate::ring::rns::{RnsBasis, RnsPoly};

pub const MAGIC: [u8; 4] = *b"CFBV";
pub const FORMAT_VERSION: u16 = 1;

/// Upper bound on a single blob, far above the largest rotation key set.
const MAX_BLOB_BYTES: u64 = 1 << 30;

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_BLOB_BYTES)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobKind {
    PublicKey,
    SecretKey,
    RelinKey,
    GaloisKeys,
    Ciphertext,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub kind: BlobKind,
    pub descriptor: ContextDescriptor,
}

/// NTT-domain residues of an RNS polynomial, one vector per prime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolyWire {
    pub residues: Vec<Vec<u64>>,
}

#[derive(Serialize, Deserialize)]
pub struct CiphertextWire {
    pub components: Vec<PolyWire>,
}

#[derive(Serialize, Deserialize)]
pub struct PublicKeyWire {
    pub pk0: PolyWire,
    pub pk1: PolyWire,
}

#[derive(Serialize, Deserialize)]
pub struct SecretKeyWire {
    pub coeffs: Vec<i64>,
}

impl Drop for SecretKeyWire {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.coeffs);
    }
}

#[derive(Serialize, Deserialize)]
pub struct KeySwitchWire {
    pub keys: Vec<(PolyWire, PolyWire)>,
}

#[derive(Serialize, Deserialize)]
pub struct RelinKeyWire {
    pub ksk: KeySwitchWire,
}

#[derive(Serialize, Deserialize)]
pub struct GaloisKeyWire {
    pub steps: u64,
    pub element: u64,
    pub ksk: KeySwitchWire,
}

#[derive(Serialize, Deserialize)]
pub struct GaloisKeysWire {
    pub keys: Vec<GaloisKeyWire>,
}

/// Context-bound binary persistence.
pub trait Persist: Sized {
    const KIND: BlobKind;
    type Wire: Serialize + DeserializeOwned;

    fn context(&self) -> &Arc<EncryptionContext>;
    fn to_wire(&self) -> Self::Wire;
    fn from_wire(wire: Self::Wire, context: &Arc<EncryptionContext>) -> Result<Self>;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = BlobHeader {
            magic: MAGIC,
            version: FORMAT_VERSION,
            kind: Self::KIND,
            descriptor: self.context().descriptor().clone(),
        };
        let mut bytes = wire_options().serialize(&header)?;
        bytes.extend(wire_options().serialize(&self.to_wire())?);
        Ok(bytes)
    }

    /// Parse a blob, rejecting foreign parameters with `ContextMismatch` and
    /// anything structurally wrong with `MalformedInput`.
    fn from_bytes(bytes: &[u8], context: &Arc<EncryptionContext>) -> Result<Self> {
        let mut cursor = bytes;
        let header: BlobHeader = wire_options()
            .deserialize_from(&mut cursor)
            .map_err(|e| MatchError::MalformedInput(format!("unreadable header: {e}")))?;
        if header.magic != MAGIC {
            return Err(MatchError::MalformedInput("bad magic".into()));
        }
        if header.version != FORMAT_VERSION {
            return Err(MatchError::MalformedInput(format!(
                "unsupported format version {}", header.version
            )));
        }
        if header.kind != Self::KIND {
            return Err(MatchError::MalformedInput(format!(
                "expected a {:?} blob, found {:?}", Self::KIND, header.kind
            )));
        }
        context.check_descriptor(&header.descriptor)?;

        let wire: Self::Wire = wire_options()
            .deserialize_from(&mut cursor)
            .map_err(|e| MatchError::MalformedInput(format!("unreadable payload: {e}")))?;
        if !cursor.is_empty() {
            return Err(MatchError::MalformedInput(format!("{} trailing bytes", cursor.len())));
        }
        Self::from_wire(wire, context)
    }

    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        writer.flush()?;
        Ok(())
    }

    fn read_from<R: Read>(mut reader: R, context: &Arc<EncryptionContext>) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, context)
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    fn load(path: &Path, context: &Arc<EncryptionContext>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes, context)
    }
}

fn poly_to_wire(poly: &RnsPoly) -> PolyWire {
    PolyWire { residues: poly.residues() }
}

fn poly_from_wire(wire: PolyWire, basis: &RnsBasis) -> Result<RnsPoly> {
    RnsPoly::from_residues(wire.residues, basis)
        .map_err(|e| MatchError::MalformedInput(format!("bad polynomial: {e}")))
}

fn ksk_to_wire(ksk: &KeySwitchKey) -> KeySwitchWire {
    KeySwitchWire {
        keys: ksk.keys.iter().map(|(a, b)| (poly_to_wire(a), poly_to_wire(b))).collect(),
    }
}

fn ksk_from_wire(wire: KeySwitchWire, context: &EncryptionContext) -> Result<KeySwitchKey> {
    if wire.keys.len() != context.gadget_digits {
        return Err(MatchError::MalformedInput(format!(
            "key-switching key has {} digits, expected {}",
            wire.keys.len(),
            context.gadget_digits
        )));
    }
    let keys = wire.keys.into_iter()
        .map(|(a, b)| Ok((poly_from_wire(a, &context.ct_basis)?, poly_from_wire(b, &context.ct_basis)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(KeySwitchKey { keys })
}

impl Persist for BfvCiphertext {
    const KIND: BlobKind = BlobKind::Ciphertext;
    type Wire = CiphertextWire;

    fn context(&self) -> &Arc<EncryptionContext> {
        &self.context
    }

    fn to_wire(&self) -> CiphertextWire {
        CiphertextWire {
            components: self.c.iter().map(poly_to_wire).collect(),
        }
    }

    fn from_wire(wire: CiphertextWire, context: &Arc<EncryptionContext>) -> Result<Self> {
        if !(2..=3).contains(&wire.components.len()) {
            return Err(MatchError::MalformedInput(format!(
                "ciphertext has {} components", wire.components.len()
            )));
        }
        let c = wire.components.into_iter()
            .map(|p| poly_from_wire(p, &context.ct_basis))
            .collect::<Result<Vec<_>>>()?;
        Ok(BfvCiphertext { c, context: context.clone() })
    }
}

impl Persist for PublicKey {
    const KIND: BlobKind = BlobKind::PublicKey;
    type Wire = PublicKeyWire;

    fn context(&self) -> &Arc<EncryptionContext> {
        &self.context
    }

    fn to_wire(&self) -> PublicKeyWire {
        PublicKeyWire {
            pk0: poly_to_wire(&self.pk0),
            pk1: poly_to_wire(&self.pk1),
        }
    }

    fn from_wire(wire: PublicKeyWire, context: &Arc<EncryptionContext>) -> Result<Self> {
        Ok(PublicKey {
            pk0: poly_from_wire(wire.pk0, &context.ct_basis)?,
            pk1: poly_from_wire(wire.pk1, &context.ct_basis)?,
            context: context.clone(),
        })
    }
}

impl Persist for SecretKey {
    const KIND: BlobKind = BlobKind::SecretKey;
    type Wire = SecretKeyWire;

    fn context(&self) -> &Arc<EncryptionContext> {
        &self.context
    }

    fn to_wire(&self) -> SecretKeyWire {
        SecretKeyWire { coeffs: self.coeffs().to_vec() }
    }

    fn from_wire(mut wire: SecretKeyWire, context: &Arc<EncryptionContext>) -> Result<Self> {
        let coeffs = std::mem::take(&mut wire.coeffs);
        SecretKey::from_coeffs(context, coeffs).map_err(|e| match e {
            MatchError::DimensionMismatch { expected, got } => MatchError::MalformedInput(format!(
                "secret key has {got} coefficients, expected {expected}"
            )),
            other => other,
        })
    }
}

impl Persist for RelinKey {
    const KIND: BlobKind = BlobKind::RelinKey;
    type Wire = RelinKeyWire;

    fn context(&self) -> &Arc<EncryptionContext> {
        &self.context
    }

    fn to_wire(&self) -> RelinKeyWire {
        RelinKeyWire { ksk: ksk_to_wire(&self.ksk) }
    }

    fn from_wire(wire: RelinKeyWire, context: &Arc<EncryptionContext>) -> Result<Self> {
        Ok(RelinKey {
            ksk: ksk_from_wire(wire.ksk, context)?,
            context: context.clone(),
        })
    }
}

impl Persist for RotationKeys {
    const KIND: BlobKind = BlobKind::GaloisKeys;
    type Wire = GaloisKeysWire;

    fn context(&self) -> &Arc<EncryptionContext> {
        &self.context
    }

    fn to_wire(&self) -> GaloisKeysWire {
        GaloisKeysWire {
            keys: self.keys.iter()
                .map(|(&steps, gk)| GaloisKeyWire {
                    steps: steps as u64,
                    element: gk.element as u64,
                    ksk: ksk_to_wire(&gk.ksk),
                })
                .collect(),
        }
    }

    fn from_wire(wire: GaloisKeysWire, context: &Arc<EncryptionContext>) -> Result<Self> {
        let mut keys = BTreeMap::new();
        for entry in wire.keys {
            let steps = entry.steps as usize;
            let element = context.galois_element(steps);
            if entry.element as usize != element || steps >= context.row_size() {
                return Err(MatchError::MalformedInput(format!(
                    "Galois element {} does not rotate by {steps}", entry.element
                )));
            }
            let gk = GaloisKey {
                ksk: ksk_from_wire(entry.ksk, context)?,
                element,
                context: context.clone(),
            };
            if keys.insert(steps, gk).is_some() {
                return Err(MatchError::MalformedInput(format!("duplicate rotation key for {steps}")));
            }
        }
        Ok(RotationKeys {
            keys,
            context: context.clone(),
        })
    }
}
