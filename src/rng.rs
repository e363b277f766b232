// src/rng.rs
//! Quasi-Random Number Generation for Monte Carlo Simulations
//!
//! # Sobol Sequences
//!
//! Each coordinate of a Sobol point is an XOR of direction numbers. With
//! the Gray code `g(n) = n ⊕ (n >> 1)` of the sequence number `n`:
//! ```text
//! x_j(n) = ⊕ { v_j[i] : bit i of g(n) is set }
//! ```
//! Consecutive Gray codes differ in a single bit, the rightmost zero bit
//! `c` of `n`, which gives the recurrence
//! ```text
//! x_j(n + 1) = x_j(n) ⊕ v_j[c]
//! ```
//!
//! # Chunked Generation
//!
//! Iteration `k` of the kernel uses sequence number `k + 1` (the all-zero
//! origin is skipped). The first iteration of every chunk uses the
//! independent formula, so a worker can start anywhere; the rest of the
//! chunk uses the recurrence.
//!
//! Chunks start at multiples of a power of two, so for every offset `o` in
//! `1..chunk-1` the recurrence bit depends on `o` only. That bit is stored
//! once in the fix-index table.

use crate::config::SobolStrategy;
use crate::error::{validation::*, SdeError, SdeResult};
use crate::math_utils::inv_norm_cdf;
use std::ops::Range;

/// Joe–Kuo (new-joe-kuo-6) parameters `(s, a, m)` for dimensions 2..=16.
const JOE_KUO: [(u32, u32, &[u32]); 15] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
    (5, 11, &[1, 1, 5, 1, 1]),
    (5, 13, &[1, 1, 1, 3, 11]),
    (5, 14, &[1, 3, 5, 5, 31]),
    (6, 1, &[1, 3, 3, 9, 7, 49]),
    (6, 13, &[1, 1, 1, 15, 21, 21]),
    (6, 16, &[1, 3, 1, 13, 27, 49]),
];

/// Largest dimension supported by [`SobolArrays::joe_kuo`]
pub const JOE_KUO_MAX_DIM: usize = JOE_KUO.len() + 1;

/// Sobol direction vectors in both orientations plus the fix-index table.
///
/// Immutable once built; shared by reference across workers.
#[derive(Debug, Clone)]
pub struct SobolArrays {
    bits: u32,
    dim: usize,
    /// `[bits][dim]`: one row per bit, used by the recurrence
    dirvcts: Vec<u32>,
    /// `[dim][bits]`: one row per coordinate, used by the independent formula
    dirvcts_t: Vec<u32>,
    /// Recurrence bit per chunk offset
    fix_ind: Vec<u8>,
}

impl SobolArrays {
    /// Build from direction vectors in `[dim][bits]` layout, the orientation
    /// datasets ship them in.
    pub fn from_transposed(
        dirvcts_t: Vec<u32>,
        bits: u32,
        dim: usize,
        chunk: usize,
    ) -> SdeResult<Self> {
        if bits == 0 || bits > 32 {
            return Err(SdeError::InvalidConfiguration {
                field: "sobol_bits".to_string(),
                reason: format!("must be in [1, 32], found {}", bits),
            });
        }
        validate_count("sobol_dim", dim)?;
        validate_power_of_two("chunk", chunk)?;
        validate_len("sobol_dirvcts", dirvcts_t.len(), dim * bits as usize)?;

        if bits < 32 {
            if let Some(pos) = dirvcts_t.iter().position(|&v| v >> bits != 0) {
                return Err(SdeError::InvalidConfiguration {
                    field: "sobol_dirvcts".to_string(),
                    reason: format!(
                        "entry {} (dimension {}) does not fit in {} bits",
                        dirvcts_t[pos],
                        pos / bits as usize,
                        bits
                    ),
                });
            }
        }

        let nbits = bits as usize;
        let mut dirvcts = vec![0u32; dim * nbits];
        for j in 0..nbits {
            for i in 0..dim {
                dirvcts[j * dim + i] = dirvcts_t[i * nbits + j];
            }
        }

        Ok(SobolArrays {
            bits,
            dim,
            dirvcts,
            dirvcts_t,
            fix_ind: compute_fix_index(chunk),
        })
    }

    /// Direction vectors for the first `dim` Sobol dimensions from the
    /// Joe–Kuo primitive polynomials.
    pub fn joe_kuo(dim: usize, bits: u32, chunk: usize) -> SdeResult<Self> {
        if dim > JOE_KUO_MAX_DIM {
            return Err(SdeError::InvalidConfiguration {
                field: "sobol_dim".to_string(),
                reason: format!(
                    "built-in direction numbers cover {} dimensions, {} requested",
                    JOE_KUO_MAX_DIM, dim
                ),
            });
        }
        if bits == 0 || bits > 32 {
            return Err(SdeError::InvalidConfiguration {
                field: "sobol_bits".to_string(),
                reason: format!("must be in [1, 32], found {}", bits),
            });
        }

        let nbits = bits as usize;
        let mut dirvcts_t = vec![0u32; dim * nbits];
        for (d, row) in dirvcts_t.chunks_mut(nbits).enumerate() {
            if d == 0 {
                for (i, v) in row.iter_mut().enumerate() {
                    *v = 1 << (nbits - 1 - i);
                }
                continue;
            }

            let (s, a, m) = JOE_KUO[d - 1];
            let s = s as usize;
            for i in 0..nbits {
                row[i] = if i < s {
                    m[i] << (nbits - 1 - i)
                } else {
                    let mut v = row[i - s] ^ (row[i - s] >> s);
                    for k in 1..s {
                        if (a >> (s - 1 - k)) & 1 == 1 {
                            v ^= row[i - k];
                        }
                    }
                    v
                };
            }
        }

        Self::from_transposed(dirvcts_t, bits, dim, chunk)
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of offsets covered by the fix-index table (the chunk size)
    pub fn chunk(&self) -> usize {
        self.fix_ind.len()
    }

    /// Recurrence bit for chunk offset `offset`, valid for `1..chunk-1`
    ///
    /// # Panics
    ///
    /// If `offset >= chunk`.
    pub fn fix_index(&self, offset: usize) -> u32 {
        debug_assert!(offset < self.fix_ind.len(), "offset {} outside chunk", offset);
        self.fix_ind[offset] as u32
    }

    /// Sobol point for iteration `index`, computed from scratch
    pub fn generate_independent(&self, index: usize, out: &mut [u32]) {
        let n = index as u64 + 1;
        let gray = n ^ (n >> 1);
        let nbits = self.bits as usize;

        for (x, row) in out[..self.dim]
            .iter_mut()
            .zip(self.dirvcts_t.chunks_exact(nbits))
        {
            let mut acc = 0u32;
            for (i, &v) in row.iter().enumerate() {
                if (gray >> i) & 1 == 1 {
                    acc ^= v;
                }
            }
            *x = acc;
        }
    }

    /// Advance `vector` by one step of the sequence, flipping direction row `bit`
    ///
    /// # Panics
    ///
    /// If `bit >= bits` or `vector` is shorter than `dim`.
    pub fn generate_recurrent(&self, bit: u32, vector: &mut [u32]) {
        debug_assert!(bit < self.bits, "bit {} exceeds {}-bit directions", bit, self.bits);
        let row = &self.dirvcts[bit as usize * self.dim..(bit as usize + 1) * self.dim];
        for (x, &v) in vector[..self.dim].iter_mut().zip(row) {
            *x ^= v;
        }
    }

    /// Produce the vector for iteration `k` of `chunk` into `out`, which holds
    /// the vector of iteration `k - 1` whenever `k` is not the chunk head.
    pub fn next_vector(
        &self,
        strategy: SobolStrategy,
        k: usize,
        chunk: &Range<usize>,
        out: &mut [u32],
    ) {
        if k == chunk.start {
            self.generate_independent(k, out);
            return;
        }

        match strategy {
            SobolStrategy::Independent => self.generate_independent(k, out),
            SobolStrategy::Recurrent => self.generate_recurrent(recurrence_bit(k), out),
            SobolStrategy::RecurrentFixIndex => {
                let bit = if k + 1 == chunk.end {
                    recurrence_bit(k)
                } else {
                    self.fix_index(k - chunk.start)
                };
                self.generate_recurrent(bit, out)
            }
        }
    }
}

/// Bit flipped when moving from iteration `k - 1` to iteration `k`: the
/// rightmost zero bit of sequence number `k`.
pub fn recurrence_bit(k: usize) -> u32 {
    k.trailing_ones()
}

/// Trailing one bits of every offset in `1..chunk-1`; other slots stay zero.
pub fn compute_fix_index(chunk: usize) -> Vec<u8> {
    let mut fix_ind = vec![0u8; chunk];
    for (k, slot) in fix_ind
        .iter_mut()
        .enumerate()
        .take(chunk.saturating_sub(1))
        .skip(1)
    {
        *slot = k.trailing_ones() as u8;
    }
    fix_ind
}

/// Map Sobol integers to standard normals through the inverse normal CDF.
///
/// The probability is clamped half a grid step away from 0 and 1, so a zero
/// coordinate maps to a large but finite quantile.
pub fn to_gaussian(norm_fact: f64, sobol: &[u32], out: &mut [f64]) {
    let lo = 0.5 * norm_fact;
    let hi = 1.0 - lo;
    for (z, &x) in out.iter_mut().zip(sobol) {
        *z = inv_norm_cdf((x as f64 * norm_fact).clamp(lo, hi));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn random_arrays(dim: usize, bits: u32, chunk: usize, seed: u64) -> SobolArrays {
        let mut rng = StdRng::seed_from_u64(seed);
        let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        let dirs = (0..dim * bits as usize).map(|_| rng.gen::<u32>() & mask).collect();
        SobolArrays::from_transposed(dirs, bits, dim, chunk).unwrap()
    }

    #[test]
    fn test_transpose_orientations_agree() {
        let sob = random_arrays(5, 12, 8, 1);
        for j in 0..12 {
            for i in 0..5 {
                assert_eq!(sob.dirvcts[j * 5 + i], sob.dirvcts_t[i * 12 + j]);
            }
        }
    }

    #[test]
    fn test_recurrence_matches_independent() {
        let sob = random_arrays(7, 20, 16, 42);
        let mut indep = vec![0u32; 7];
        let mut rec = vec![0u32; 7];

        sob.generate_independent(0, &mut rec);
        for k in 1..5_000 {
            sob.generate_recurrent(recurrence_bit(k), &mut rec);
            sob.generate_independent(k, &mut indep);
            assert_eq!(rec, indep, "mismatch at index {}", k);
        }
    }

    #[test]
    fn test_fix_index_counts_trailing_ones() {
        let fix = compute_fix_index(64);
        assert_eq!(fix.len(), 64);
        assert_eq!(fix[1], 1);
        assert_eq!(fix[2], 0);
        assert_eq!(fix[3], 2);
        assert_eq!(fix[7], 3);
        assert_eq!(fix[62], 0);
        for (o, &f) in fix.iter().enumerate().take(63).skip(1) {
            assert_eq!(f as u32, (o as u32).trailing_ones());
        }
    }

    #[test]
    fn test_strategies_agree_within_chunks() {
        let chunk = 8;
        let sob = random_arrays(3, 16, chunk, 7);
        let total = 100;

        for strategy in [
            SobolStrategy::Independent,
            SobolStrategy::Recurrent,
            SobolStrategy::RecurrentFixIndex,
        ] {
            let mut out = vec![0u32; 3];
            let mut expected = vec![0u32; 3];
            for start in (0..total).step_by(chunk) {
                let range = start..(start + chunk).min(total);
                for k in range.clone() {
                    sob.next_vector(strategy, k, &range, &mut out);
                    sob.generate_independent(k, &mut expected);
                    assert_eq!(out, expected, "{:?} at {}", strategy, k);
                }
            }
        }
    }

    #[test]
    fn test_first_dimension_is_van_der_corput() {
        let sob = SobolArrays::joe_kuo(1, 10, 4).unwrap();
        let mut out = [0u32; 1];
        let norm = 1.0 / 1024.0;

        let expected = [0.5, 0.75, 0.25, 0.375, 0.875, 0.625, 0.125];
        for (k, &e) in expected.iter().enumerate() {
            sob.generate_independent(k, &mut out);
            assert_eq!(out[0] as f64 * norm, e);
        }
    }

    #[test]
    fn test_joe_kuo_points_are_distinct() {
        let sob = SobolArrays::joe_kuo(JOE_KUO_MAX_DIM, 16, 64).unwrap();
        let mut seen = std::collections::HashSet::new();
        let mut out = vec![0u32; JOE_KUO_MAX_DIM];
        for k in 0..1024 {
            sob.generate_independent(k, &mut out);
            assert!(out.iter().all(|&x| x != 0));
            assert!(seen.insert(out.clone()));
        }
    }

    #[test]
    fn test_joe_kuo_rejects_large_dimension() {
        assert!(SobolArrays::joe_kuo(JOE_KUO_MAX_DIM + 1, 16, 64).is_err());
    }

    #[test]
    #[should_panic]
    fn test_recurrence_bit_beyond_depth_panics() {
        let sob = SobolArrays::joe_kuo(2, 8, 4).unwrap();
        let mut v = [0u32; 2];
        sob.generate_recurrent(8, &mut v);
    }

    #[test]
    #[should_panic]
    fn test_fix_index_outside_chunk_panics() {
        let sob = SobolArrays::joe_kuo(2, 8, 4).unwrap();
        sob.fix_index(4);
    }

    #[test]
    fn test_direction_vectors_must_fit_bit_depth() {
        let dirs = vec![1u32 << 8, 1, 1, 1];
        assert!(SobolArrays::from_transposed(dirs, 2, 2, 2).is_err());
        assert!(SobolArrays::from_transposed(vec![1, 2, 3], 2, 2, 2).is_err());
    }

    #[test]
    fn test_gaussian_of_index_zero_is_reproducible() {
        let a = SobolArrays::joe_kuo(4, 30, 64).unwrap();
        let b = SobolArrays::joe_kuo(4, 30, 64).unwrap();
        let norm = 1.0 / (1u64 << 30) as f64;

        let mut sa = vec![0u32; 4];
        let mut sb = vec![0u32; 4];
        let mut za = vec![0.0; 4];
        let mut zb = vec![0.0; 4];
        a.generate_independent(0, &mut sa);
        b.generate_independent(0, &mut sb);
        to_gaussian(norm, &sa, &mut za);
        to_gaussian(norm, &sb, &mut zb);

        assert_eq!(za, zb);
        // first point of every dimension is one half
        assert!(za.iter().all(|z| z.abs() < 1e-12));
    }

    #[test]
    fn test_gaussian_of_zero_is_finite() {
        let mut z = [0.0; 2];
        to_gaussian(1.0 / 1024.0, &[0, 1023], &mut z);
        assert!(z[0].is_finite() && z[0] < -3.0);
        assert!(z[1].is_finite() && z[1] > 3.0);
    }
}
