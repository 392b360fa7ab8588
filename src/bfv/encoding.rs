use crate::error::{MatchError, Result};
use crate::ring::modular::{barrett_constant, center, mod_add, mod_inv, mod_mul, mod_pow, mod_sub, reduce_signed};
use crate::ring::poly::CoeffPoly;

/// SIMD batch encoder for Z_t[X]/(X^N + 1) with t prime, t ≡ 1 (mod 2N).
///
/// X^N + 1 splits into N linear factors (X - ψ^(2j+1)) modulo t, so a
/// plaintext is determined by its N evaluations. The slots are arranged as a
/// 2 x (N/2) matrix: row 0 slot i sits at ψ^(3^i), row 1 slot i at
/// ψ^(-3^i). The automorphism X -> X^3 then moves every slot one position
/// to the left within its row, and X -> X^(2N-1) swaps the rows.
#[derive(Clone, Debug)]
pub struct BatchEncoder {
    n: usize,
    t: u64,
    bk: u64,
    /// ψ^i for i in 0..N
    psi_pows: Vec<u64>,
    /// N^{-1}·ψ^{-i} for i in 0..N
    psi_inv_pows_scaled: Vec<u64>,
    omega: u64,
    omega_inv: u64,
    /// Slot s (row-major, row 0 first) is the evaluation at ψ^(2·slot_index[s]+1).
    slot_index: Vec<usize>,
}

impl BatchEncoder {
    pub fn new(n: usize, t: u64) -> Result<Self> {
        if !n.is_power_of_two() || n < 2 {
            return Err(MatchError::InvalidRingDegree(n));
        }
        let two_n = 2 * n as u64;
        if t % two_n != 1 {
            return Err(MatchError::InvalidParam(format!(
                "plaintext modulus {t} does not support batching for N={n}"
            )));
        }
        let bk = barrett_constant(t);
        let psi = find_primitive_root(two_n, t)?;
        let psi_inv = mod_inv(psi, t)
            .ok_or_else(|| MatchError::InvalidParam("root of unity is not invertible".into()))?;
        let n_inv = mod_inv(n as u64 % t, t)
            .ok_or_else(|| MatchError::InvalidParam("N is not invertible mod t".into()))?;

        let mut psi_pows = Vec::with_capacity(n);
        let mut psi_inv_pows_scaled = Vec::with_capacity(n);
        let (mut p, mut pi) = (1u64, n_inv);
        for _ in 0..n {
            psi_pows.push(p);
            psi_inv_pows_scaled.push(pi);
            p = mod_mul(p, psi, t, bk);
            pi = mod_mul(pi, psi_inv, t, bk);
        }
        let omega = mod_mul(psi, psi, t, bk);
        let omega_inv = mod_mul(psi_inv, psi_inv, t, bk);

        let row = n / 2;
        let mut slot_index = vec![0usize; n];
        let mut g = 1usize;
        for i in 0..row {
            slot_index[i] = (g - 1) / 2;
            slot_index[row + i] = (2 * n - g - 1) / 2;
            g = (g * 3) % (2 * n);
        }

        Ok(Self {
            n,
            t,
            bk,
            psi_pows,
            psi_inv_pows_scaled,
            omega,
            omega_inv,
            slot_index,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.n
    }

    pub fn row_size(&self) -> usize {
        self.n / 2
    }

    pub fn plain_modulus(&self) -> u64 {
        self.t
    }

    /// Encode up to N slot values (already reduced mod t); missing slots are 0.
    pub fn encode(&self, values: &[u64]) -> Result<CoeffPoly> {
        if values.len() > self.n {
            return Err(MatchError::DimensionMismatch {
                expected: self.n,
                got: values.len(),
            });
        }
        if let Some(&v) = values.iter().find(|&&v| v >= self.t) {
            return Err(MatchError::InvalidParam(format!(
                "slot value {v} >= plain_modulus {}", self.t
            )));
        }

        let mut evals = vec![0u64; self.n];
        for (s, &v) in values.iter().enumerate() {
            evals[self.slot_index[s]] = v;
        }

        // Inverse cyclic transform with ω^{-1}, then untwist by N^{-1}·ψ^{-i}.
        cyclic_ntt(&mut evals, self.omega_inv, self.t, self.bk);
        let coeffs = evals.iter()
            .zip(self.psi_inv_pows_scaled.iter())
            .map(|(&a, &w)| mod_mul(a, w, self.t, self.bk))
            .collect();
        Ok(CoeffPoly { coeffs, modulus: self.t })
    }

    /// Encode signed slot values; each is reduced into [0, t).
    pub fn encode_signed(&self, values: &[i64]) -> Result<CoeffPoly> {
        let reduced: Vec<u64> = values.iter().map(|&v| reduce_signed(v, self.t)).collect();
        self.encode(&reduced)
    }

    /// Decode all N slots as residues in [0, t).
    pub fn decode(&self, poly: &CoeffPoly) -> Result<Vec<u64>> {
        if poly.len() != self.n || poly.modulus != self.t {
            return Err(MatchError::DimensionMismatch {
                expected: self.n,
                got: poly.len(),
            });
        }
        let mut evals: Vec<u64> = poly.coeffs.iter()
            .zip(self.psi_pows.iter())
            .map(|(&c, &w)| mod_mul(c % self.t, w, self.t, self.bk))
            .collect();
        cyclic_ntt(&mut evals, self.omega, self.t, self.bk);
        Ok(self.slot_index.iter().map(|&j| evals[j]).collect())
    }

    /// Decode all N slots as centered integers in (-t/2, t/2].
    pub fn decode_signed(&self, poly: &CoeffPoly) -> Result<Vec<i64>> {
        Ok(self.decode(poly)?
            .into_iter()
            .map(|v| center(v, self.t))
            .collect())
    }
}

/// Smallest-base primitive `order`-th root of unity modulo prime `t`
/// (`order` a power of two dividing t - 1).
fn find_primitive_root(order: u64, t: u64) -> Result<u64> {
    let exp = (t - 1) / order;
    for x in 2..t {
        let candidate = mod_pow(x, exp, t);
        // For a power-of-two order, ψ^(order/2) = -1 pins the order exactly.
        if mod_pow(candidate, order / 2, t) == t - 1 {
            return Ok(candidate);
        }
    }
    Err(MatchError::InvalidParam(format!("no primitive {order}-th root of unity mod {t}")))
}

/// In-place cyclic NTT over Z_t in natural order: a_j <- Σ_i a_i·root^(ij).
fn cyclic_ntt(a: &mut [u64], root: u64, t: u64, bk: u64) {
    let n = a.len();

    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            a.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let w_len = mod_pow(root, (n / len) as u64, t);
        let half = len / 2;
        for start in (0..n).step_by(len) {
            let mut w = 1u64;
            for k in 0..half {
                let u = a[start + k];
                let v = mod_mul(a[start + k + half], w, t, bk);
                a[start + k] = mod_add(u, v, t);
                a[start + k + half] = mod_sub(u, v, t);
                w = mod_mul(w, w_len, t, bk);
            }
        }
        len <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: u64 = 1032193;

    #[test]
    fn test_encode_decode_full() {
        let enc = BatchEncoder::new(16, T).unwrap();
        let values: Vec<u64> = (0..16).map(|i| (i * 1000 + 7) as u64).collect();
        let pt = enc.encode(&values).unwrap();
        assert_eq!(enc.decode(&pt).unwrap(), values);
    }

    #[test]
    fn test_signed_values_and_padding() {
        let enc = BatchEncoder::new(16, T).unwrap();
        let pt = enc.encode_signed(&[-5, 3, -125]).unwrap();
        let decoded = enc.decode_signed(&pt).unwrap();
        assert_eq!(&decoded[..3], &[-5, 3, -125]);
        assert!(decoded[3..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_constant_slots_give_constant_poly() {
        let enc = BatchEncoder::new(16, T).unwrap();
        let pt = enc.encode(&[9; 16]).unwrap();
        assert_eq!(pt.coeffs[0], 9);
        assert!(pt.coeffs[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_slot_product_is_pointwise() {
        let enc = BatchEncoder::new(16, T).unwrap();
        let a: Vec<i64> = (1..=16).collect();
        let b: Vec<i64> = (1..=16).map(|v| v * 2 - 20).collect();
        let pa = enc.encode_signed(&a).unwrap();
        let pb = enc.encode_signed(&b).unwrap();
        let prod = enc.decode_signed(&pa.mul_naive(&pb).unwrap()).unwrap();
        let expected: Vec<i64> = a.iter().zip(b.iter()).map(|(x, y)| x * y).collect();
        assert_eq!(prod, expected);
    }

    #[test]
    fn test_automorphism_rotates_rows_left() {
        let enc = BatchEncoder::new(16, T).unwrap();
        let values: Vec<u64> = (1..=16).collect();
        let pt = enc.encode(&values).unwrap();
        let rotated = enc.decode(&pt.automorphism(3)).unwrap();
        // Row 0: [2..8, 1], row 1: [10..16, 9]
        let expected: Vec<u64> = vec![2, 3, 4, 5, 6, 7, 8, 1, 10, 11, 12, 13, 14, 15, 16, 9];
        assert_eq!(rotated, expected);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(BatchEncoder::new(16, 65539).is_err());
        let enc = BatchEncoder::new(16, T).unwrap();
        assert!(enc.encode(&[0; 17]).is_err());
        assert!(enc.encode(&[T]).is_err());
    }
}
