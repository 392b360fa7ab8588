//! Binary feature files: two native-endian `i32` (count, dim) followed by
//! `count · dim` native-endian `f32`, row-major.

use std::fs;
use std::path::Path;

use crate::error::{MatchError, Result};

pub const GALLERY_FEATURES_FILE: &str = "gallery-1-to-1.bin";
pub const PROBE_FEATURES_FILE: &str = "probe-1-to-1.bin";

const HEADER_BYTES: usize = 8;

/// `count` feature vectors of `dim` floats each.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    count: usize,
    dim: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn new(count: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        let expected = count.checked_mul(dim)
            .ok_or_else(|| MatchError::MalformedInput("feature matrix size overflows".into()))?;
        if data.len() != expected {
            return Err(MatchError::DimensionMismatch { expected, got: data.len() });
        }
        Ok(Self { count, dim, data })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let dim = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(MatchError::DimensionMismatch { expected: dim, got: bad.len() });
        }
        let data = rows.iter().flatten().copied().collect();
        Self::new(rows.len(), dim, data)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.count {
            return None;
        }
        Some(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        (0..self.count).map(move |i| &self.data[i * self.dim..(i + 1) * self.dim])
    }

    /// Parse the binary layout. Negative header values, short bodies and
    /// trailing bytes are all `MalformedInput`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES {
            return Err(MatchError::MalformedInput(format!(
                "feature file too short for header ({} bytes)", bytes.len()
            )));
        }
        let count = read_i32(&bytes[0..4]);
        let dim = read_i32(&bytes[4..8]);
        if count < 0 || dim < 0 {
            return Err(MatchError::MalformedInput(format!(
                "negative header values (count={count}, dim={dim})"
            )));
        }
        let (count, dim) = (count as usize, dim as usize);

        let body = &bytes[HEADER_BYTES..];
        let expected = count.checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| MatchError::MalformedInput("feature matrix size overflows".into()))?;
        if body.len() != expected {
            return Err(MatchError::MalformedInput(format!(
                "expected {expected} body bytes for {count}x{dim} floats, found {}",
                body.len()
            )));
        }

        let data = body.chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { count, dim, data })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = i32::try_from(self.count)
            .map_err(|_| MatchError::InvalidParam(format!("count {} exceeds i32", self.count)))?;
        let dim = i32::try_from(self.dim)
            .map_err(|_| MatchError::InvalidParam(format!("dim {} exceeds i32", self.dim)))?;
        let mut bytes = Vec::with_capacity(HEADER_BYTES + self.data.len() * 4);
        bytes.extend_from_slice(&count.to_ne_bytes());
        bytes.extend_from_slice(&dim.to_ne_bytes());
        for v in &self.data {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        Ok(bytes)
    }
}

fn read_i32(b: &[u8]) -> i32 {
    i32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

pub fn read_feature_file(path: &Path) -> Result<FeatureMatrix> {
    let bytes = fs::read(path)?;
    FeatureMatrix::from_bytes(&bytes)
}

pub fn write_feature_file(path: &Path, matrix: &FeatureMatrix) -> Result<()> {
    fs::write(path, matrix.to_bytes()?)?;
    Ok(())
}
