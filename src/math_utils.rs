// src/math_utils.rs
use statrs::function::erf;
use std::f64::consts::SQRT_2;

pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf::erf(x / SQRT_2))
}

/// Inverse of the standard normal CDF.
///
/// Written in terms of `erfc_inv` so both tails keep full relative
/// precision: `Φ⁻¹(p) = -√2 · erfc⁻¹(2p)`.
pub fn inv_norm_cdf(p: f64) -> f64 {
    -SQRT_2 * erf::erfc_inv(2.0 * p)
}

/// Length rounded up past the next multiple of 64 elements, so that
/// per-worker buffers never end on a cache line another worker touches.
pub fn padded_len(n: usize) -> usize {
    (n / 64) * 64 + 64
}
