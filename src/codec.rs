//! Fixed-point quantization of float embeddings into integer slots.

use crate::error::{MatchError, Result};

/// One row of integer slots ready for batch encoding.
///
/// `values[j] = round(precision · v[j])` for `j < dim`, zero beyond.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedSlots {
    values: Vec<i64>,
    dim: usize,
}

impl QuantizedSlots {
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Number of slots carrying template components.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row_size(&self) -> usize {
        self.values.len()
    }

    /// Σ a_j·b_j over the slots, the quantity the encrypted pipeline computes.
    ///
    /// Accumulated in `i128`, so no quantized input can overflow a product.
    /// The sum itself saturates.
    pub fn dot(&self, other: &QuantizedSlots) -> i128 {
        self.values.iter()
            .zip(other.values.iter())
            .map(|(&a, &b)| i128::from(a) * i128::from(b))
            .fold(0i128, |acc, p| acc.saturating_add(p))
    }
}

fn check_precision(precision: f64) -> Result<()> {
    if !precision.is_finite() || precision <= 0.0 {
        return Err(MatchError::InvalidParam(format!(
            "precision must be finite and positive, got {precision}"
        )));
    }
    Ok(())
}

/// Quantize a feature vector into `row_size` slots.
///
/// Rounds half away from zero. Fails without producing anything when the
/// vector is longer than a row or holds a non-finite component.
pub fn quantize(vector: &[f32], precision: f64, row_size: usize) -> Result<QuantizedSlots> {
    check_precision(precision)?;
    if vector.len() > row_size {
        return Err(MatchError::DimensionOverflow {
            dim: vector.len(),
            row_size,
        });
    }

    let mut values = vec![0i64; row_size];
    for (j, &v) in vector.iter().enumerate() {
        if !v.is_finite() {
            return Err(MatchError::MalformedInput(format!("component {j} is not finite ({v})")));
        }
        let scaled = (precision * v as f64).round();
        if scaled.abs() >= i64::MAX as f64 {
            return Err(MatchError::MalformedInput(format!("component {j} overflows at precision {precision}")));
        }
        values[j] = scaled as i64;
    }

    Ok(QuantizedSlots {
        values,
        dim: vector.len(),
    })
}

/// Undo the scaling of a single quantized component.
pub fn dequantize_component(raw: i64, precision: f64) -> f64 {
    raw as f64 / precision
}

/// Undo the scaling of a product of two quantized values (a dot product).
pub fn dequantize_scalar(raw: i64, precision: f64) -> f64 {
    raw as f64 / (precision * precision)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_pads_and_rounds() {
        let q = quantize(&[0.5, -0.5, 0.1234, -1.0], 125.0, 8).unwrap();
        // 62.5 and -62.5 round away from zero
        assert_eq!(q.values(), &[63, -63, 15, -125, 0, 0, 0, 0]);
        assert_eq!(q.dim(), 4);
        assert_eq!(q.row_size(), 8);
    }

    #[test]
    fn test_roundtrip_error_bound() {
        let precision = 125.0;
        let v: Vec<f32> = (0..8).map(|i| (i as f32 * 0.137).sin()).collect();
        let q = quantize(&v, precision, 8).unwrap();
        for (raw, &orig) in q.values().iter().zip(v.iter()) {
            let back = dequantize_component(*raw, precision);
            assert!((back - orig as f64).abs() <= 0.5 / precision + 1e-9);
        }
    }

    #[test]
    fn test_dimension_overflow() {
        let v = vec![0.1f32; 9];
        assert!(matches!(
            quantize(&v, 125.0, 8),
            Err(MatchError::DimensionOverflow { dim: 9, row_size: 8 })
        ));
    }

    #[test]
    fn test_rejects_non_finite_and_bad_precision() {
        assert!(matches!(quantize(&[f32::NAN], 125.0, 8), Err(MatchError::MalformedInput(_))));
        assert!(matches!(quantize(&[f32::INFINITY], 125.0, 8), Err(MatchError::MalformedInput(_))));
        assert!(matches!(quantize(&[0.1], 0.0, 8), Err(MatchError::InvalidParam(_))));
        assert!(matches!(quantize(&[0.1], f64::NAN, 8), Err(MatchError::InvalidParam(_))));
    }

    #[test]
    fn test_dot_with_large_precision() {
        let a = quantize(&[1.0, 1.0], 4.0e18, 2).unwrap();
        assert_eq!(a.values(), &[4_000_000_000_000_000_000, 4_000_000_000_000_000_000]);
        assert_eq!(a.dot(&a), 2 * 16_000_000_000_000_000_000_000_000_000_000_000_000i128);

        let b = quantize(&[1.0, -1.0], 4.0e18, 2).unwrap();
        assert_eq!(a.dot(&b), 0);
    }

    #[test]
    fn test_dequantize_scalar() {
        let a = quantize(&[0.6, 0.8], 125.0, 8).unwrap();
        let raw = a.dot(&a);
        assert_eq!(raw, 75 * 75 + 100 * 100);
        assert!((dequantize_scalar(i64::try_from(raw).unwrap(), 125.0) - 1.0).abs() < 1e-12);
    }
}
