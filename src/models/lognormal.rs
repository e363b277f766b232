// src/models/lognormal.rs
//! Multi-asset log-normal path simulation
//!
//! # Math Framework
//!
//! Given bridged normal increments `z[i][l]` for date `i` and asset `l`, and a
//! lower-triangular factor `C` of the asset correlation matrix:
//! ```text
//! x[i][j] = Σ_{l ≤ j} C[j][l] · z[i][l]
//! S[i][j] = S[i-1][j] · exp(x[i][j] · σ[i][j] + μ[i][j])
//! ```
//! with `S[-1][j]` the model's start level. Volatility and drift are given
//! per date and asset, so the time-step scaling lives in the model data.

use super::model::ModelView;
use crate::error::{SdeError, SdeResult};

/// Log-normal trajectory generator for one model
pub struct LogNormalPath<'a> {
    model: ModelView<'a>,
    num_dates: usize,
    num_under: usize,
}

impl<'a> LogNormalPath<'a> {
    pub fn new(model: ModelView<'a>, num_dates: usize, num_under: usize) -> Self {
        LogNormalPath {
            model,
            num_dates,
            num_under,
        }
    }

    /// Evolve all assets over all dates, writing levels `[date][asset]` into `traj`.
    ///
    /// # Errors
    ///
    /// `NumericalInstability` when an exponential or level is not finite.
    pub fn simulate(&self, z: &[f64], traj: &mut [f64]) -> SdeResult<()> {
        let u = self.num_under;
        let ModelView {
            c,
            vols,
            drifts,
            starts,
            ..
        } = self.model;

        for i in 0..self.num_dates {
            let zi = &z[i * u..(i + 1) * u];
            for j in 0..u {
                let k = i * u + j;
                let factor = &c[j * u..j * u + j + 1];
                let x: f64 = factor.iter().zip(zi).map(|(a, b)| a * b).sum();

                let growth = (x * vols[k] + drifts[k]).exp();
                let prev = if i == 0 { starts[j] } else { traj[k - u] };
                let level = prev * growth;

                if !growth.is_finite() || !level.is_finite() {
                    return Err(SdeError::NumericalInstability {
                        method: "log-normal path".to_string(),
                        reason: format!(
                            "level of asset {} at date {} overflowed (exponent {})",
                            j,
                            i,
                            x * vols[k] + drifts[k]
                        ),
                    });
                }
                traj[k] = level;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelArrays, ModelShape};
    use approx::assert_relative_eq;

    fn models(
        c: &[f64],
        vols: &[f64],
        drifts: &[f64],
        starts: &[f64],
        dates: usize,
    ) -> ModelArrays {
        let shape = ModelShape {
            num_models: 1,
            num_dates: dates,
            num_under: starts.len(),
        };
        ModelArrays::pack(shape, c, vols, drifts, starts, &[1.0], &[]).unwrap()
    }

    #[test]
    fn test_zero_vol_zero_drift_keeps_start() {
        let md = models(&[1.0], &[0.0; 3], &[0.0; 3], &[123.0], 3);
        let path = LogNormalPath::new(md.model(0), 3, 1);
        let mut traj = [0.0; 3];
        path.simulate(&[0.7, -2.0, 1.3], &mut traj).unwrap();
        assert_eq!(traj, [123.0; 3]);
    }

    #[test]
    fn test_multiplicative_recursion() {
        let md = models(&[1.0], &[0.2, 0.2], &[0.01, -0.02], &[100.0], 2);
        let path = LogNormalPath::new(md.model(0), 2, 1);
        let mut traj = [0.0; 2];
        path.simulate(&[0.5, -1.0], &mut traj).unwrap();

        let s1 = 100.0 * (0.5 * 0.2 + 0.01f64).exp();
        let s2 = s1 * (-1.0 * 0.2 - 0.02f64).exp();
        assert_relative_eq!(traj[0], s1, max_relative = 1e-14);
        assert_relative_eq!(traj[1], s2, max_relative = 1e-14);
    }

    #[test]
    fn test_lower_triangle_only() {
        // upper entry 99.0 must be ignored
        let c = [1.0, 99.0, 0.6, 0.8];
        let md = models(&c, &[1.0, 1.0], &[0.0, 0.0], &[1.0, 1.0], 1);
        let path = LogNormalPath::new(md.model(0), 1, 2);
        let mut traj = [0.0; 2];
        path.simulate(&[0.5, 0.25], &mut traj).unwrap();

        assert_relative_eq!(traj[0], 0.5f64.exp());
        assert_relative_eq!(traj[1], (0.6 * 0.5 + 0.8 * 0.25f64).exp());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let md = models(&[1.0], &[1.0], &[800.0], &[1.0], 1);
        let path = LogNormalPath::new(md.model(0), 1, 1);
        let mut traj = [0.0; 1];
        let err = path.simulate(&[0.0], &mut traj).unwrap_err();
        assert!(matches!(err, SdeError::NumericalInstability { .. }));
    }
}
