// src/config.rs
//! Kernel configuration
//!
//! Two layers, both built once before the parallel region and only ever
//! read afterwards:
//!
//! - [`ScalarParams`]: the raw dataset header (contract id, iteration count,
//!   dimensions, Sobol bit depth, chunk size).
//! - [`LoopScalars`]: the validated, immutable form with derived values
//!   (normalisation factor, cash-flow and pricer counts).
//!
//! [`KernelOptions`] selects between interchangeable implementations of the
//! same computation (Sobol formula, trajectory buffer placement).

use crate::error::{validation::*, SdeError, SdeResult};
use crate::mc::payoffs::Contract;
use crate::models::ModelArrays;

/// Upper bound on the worker count accepted by the kernel
pub const MAX_WORKERS: usize = 1024;

/// Raw scalar parameters, as handed over by the dataset loader
#[derive(Debug, Clone)]
pub struct ScalarParams {
    pub contract: i32,
    pub num_mcits: usize,
    pub num_dates: usize,
    pub num_under: usize,
    pub num_models: usize,
    pub sobol_bits: u32,
    /// Iterations claimed per scheduling step; must be a power of two
    pub chunk: usize,
}

impl Default for ScalarParams {
    fn default() -> Self {
        ScalarParams {
            contract: 1,
            num_mcits: 1_048_576,
            num_dates: 1,
            num_under: 1,
            num_models: 1,
            sobol_bits: 30,
            chunk: 64,
        }
    }
}

impl ScalarParams {
    /// Validate the parameters that do not depend on the model arrays
    pub fn validate(&self) -> SdeResult<()> {
        Contract::try_from(self.contract)?;
        validate_count("num_mcits", self.num_mcits)?;
        validate_count("num_dates", self.num_dates)?;
        validate_count("num_under", self.num_under)?;
        validate_count("num_models", self.num_models)?;
        validate_power_of_two("chunk", self.chunk)?;

        if self.sobol_bits == 0 || self.sobol_bits > 32 {
            return Err(SdeError::InvalidConfiguration {
                field: "sobol_bits".to_string(),
                reason: format!("must be in [1, 32], found {}", self.sobol_bits),
            });
        }

        // iteration k uses Sobol point k + 1, which must stay below 2^bits
        if self.num_mcits as u64 >= 1u64 << self.sobol_bits {
            return Err(SdeError::InvalidConfiguration {
                field: "num_mcits".to_string(),
                reason: format!(
                    "{} iterations exceed the period of a {}-bit Sobol sequence",
                    self.num_mcits, self.sobol_bits
                ),
            });
        }

        Ok(())
    }
}

/// Validated, read-only loop scalars shared by every worker
#[derive(Debug, Clone)]
pub struct LoopScalars {
    contract: Contract,
    num_mcits: usize,
    num_dates: usize,
    num_under: usize,
    num_models: usize,
    sobol_bits: u32,
    chunk: usize,
    sob_norm_fact: f64,
    num_cash_flows: usize,
    num_det_pricers: usize,
}

impl LoopScalars {
    /// Build the loop scalars, deriving the cash-flow and pricer counts from
    /// the packed model arrays and checking the two agree on every dimension.
    pub fn new(params: &ScalarParams, models: &ModelArrays) -> SdeResult<Self> {
        params.validate()?;
        let contract = Contract::try_from(params.contract)?;

        validate_dim("num_models", models.num_models(), params.num_models)?;
        validate_dim("num_dates", models.num_dates(), params.num_dates)?;
        validate_dim("num_under", models.num_under(), params.num_under)?;

        contract.validate_shape(
            params.num_under,
            params.num_dates,
            models.num_cash_flows(),
            models.num_det_pricers(),
        )?;

        Ok(LoopScalars {
            contract,
            num_mcits: params.num_mcits,
            num_dates: params.num_dates,
            num_under: params.num_under,
            num_models: params.num_models,
            sobol_bits: params.sobol_bits,
            chunk: params.chunk,
            sob_norm_fact: 1.0 / (1u64 << params.sobol_bits) as f64,
            num_cash_flows: models.num_cash_flows(),
            num_det_pricers: models.num_det_pricers(),
        })
    }

    pub fn contract(&self) -> Contract {
        self.contract
    }

    pub fn num_mcits(&self) -> usize {
        self.num_mcits
    }

    pub fn num_dates(&self) -> usize {
        self.num_dates
    }

    pub fn num_under(&self) -> usize {
        self.num_under
    }

    pub fn num_models(&self) -> usize {
        self.num_models
    }

    pub fn sobol_bits(&self) -> u32 {
        self.sobol_bits
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// `1 / 2^sobol_bits`
    pub fn sob_norm_fact(&self) -> f64 {
        self.sob_norm_fact
    }

    pub fn num_cash_flows(&self) -> usize {
        self.num_cash_flows
    }

    pub fn num_det_pricers(&self) -> usize {
        self.num_det_pricers
    }

    /// Number of Sobol coordinates per iteration (`num_under * num_dates`)
    pub fn sobol_dim(&self) -> usize {
        self.num_under * self.num_dates
    }
}

/// Which Sobol formula produces the vectors inside a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SobolStrategy {
    /// Independent formula for every index
    Independent,
    /// Independent formula for the chunk head, recurrence for the rest
    #[default]
    Recurrent,
    /// Like `Recurrent`, but the recurrence bit comes from the fix-index
    /// table. Experimental; never selected by default.
    RecurrentFixIndex,
}

/// Where the simulated trajectory is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeBuffer {
    /// Dedicated trajectory buffer per worker
    #[default]
    Separate,
    /// Overwrite the Gaussian buffer, which is dead once the bridge has run
    ReuseGaussian,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KernelOptions {
    pub sobol: SobolStrategy,
    pub bridge_buffer: BridgeBuffer,
}

/// Worker count used when the caller has no preference
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelArrays, ModelShape};

    fn one_asset_models(num_models: usize) -> ModelArrays {
        let shape = ModelShape {
            num_models,
            num_dates: 1,
            num_under: 1,
        };
        ModelArrays::pack(
            shape,
            &vec![1.0; num_models],
            &vec![0.2; num_models],
            &vec![0.0; num_models],
            &vec![4000.0; num_models],
            &vec![0.95; num_models],
            &vec![1.0; num_models],
        )
        .unwrap()
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(ScalarParams::default().validate().is_ok());
    }

    #[test]
    fn test_chunk_must_be_power_of_two() {
        let params = ScalarParams {
            chunk: 48,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SdeError::InvalidConfiguration { ref field, .. }) if field == "chunk"
        ));
    }

    #[test]
    fn test_unknown_contract_rejected() {
        let params = ScalarParams {
            contract: 9,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(SdeError::UnknownContract { id: 9 })
        ));
    }

    #[test]
    fn test_iterations_bounded_by_sobol_period() {
        let params = ScalarParams {
            sobol_bits: 4,
            num_mcits: 16,
            chunk: 4,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ScalarParams {
            num_mcits: 15,
            ..params
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_loop_scalars_derive_counts() {
        let models = one_asset_models(2);
        let params = ScalarParams {
            num_models: 2,
            sobol_bits: 10,
            num_mcits: 100,
            ..Default::default()
        };
        let scals = LoopScalars::new(&params, &models).unwrap();

        assert_eq!(scals.num_cash_flows(), 1);
        assert_eq!(scals.num_det_pricers(), 1);
        assert_eq!(scals.sobol_dim(), 1);
        assert_eq!(scals.sob_norm_fact(), 1.0 / 1024.0);
    }

    #[test]
    fn test_loop_scalars_reject_model_mismatch() {
        let models = one_asset_models(1);
        let params = ScalarParams {
            num_models: 3,
            ..Default::default()
        };
        assert!(LoopScalars::new(&params, &models).is_err());
    }

    #[test]
    fn test_default_workers_in_range() {
        let workers = default_workers();
        assert!((1..=MAX_WORKERS).contains(&workers));
    }
}
