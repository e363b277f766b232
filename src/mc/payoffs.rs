// src/mc/payoffs.rs
//! Contract Payoff Functions
//!
//! # Supported Contracts
//!
//! Payoffs read a simulated trajectory laid out `[date][asset]` and return
//! the discounted value of all cash flows of one path.
//!
//! ## 1. Vanilla
//! Call on a single index (DJ Euro Stoxx 50) observed on one date:
//! `max((S - 4000) · detval, 0) · disc[0]`.
//!
//! ## 2. Basket Autocallable
//! Three indices observed on five dates. With the worst performance
//! `m(d) = min(S₀/3758.05, S₁/11840, S₂/1200)`, the contract redeems early at
//! the first date `d < 4` where `m(d) ≥ 1`, paying `1150 + 150·d`. At the last
//! date it pays 1750 above par, 1000 above 75% and `1000·m` otherwise.
//!
//! ## 3. Barrier
//! Three indices, any number of dates. A fixed coupon of 100 is paid on the
//! first cash-flow date. The redemption is 1000 unless a barrier was touched
//! on some date and an index finishes below its strike, in which case the
//! holder receives `1000·m(last)`.

use crate::error::{validation::*, SdeError, SdeResult};
use crate::models::ModelView;

const VANILLA_STRIKE: f64 = 4000.0;

/// Reference (strike) levels of the three basket indices
const BASKET_STRIKES: [f64; 3] = [3758.05, 11840.0, 1200.0];

const BASKET_DATES: usize = 5;

/// Knock-in barriers of the three indices
const BARRIERS: [f64; 3] = [2630.6349999999998, 8288.0, 840.0];

/// Enumeration of supported contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contract {
    Vanilla,
    Basket,
    Barrier,
}

impl TryFrom<i32> for Contract {
    type Error = SdeError;

    fn try_from(id: i32) -> SdeResult<Self> {
        match id {
            1 => Ok(Contract::Vanilla),
            2 => Ok(Contract::Basket),
            3 => Ok(Contract::Barrier),
            id => Err(SdeError::UnknownContract { id }),
        }
    }
}

impl Contract {
    /// Dataset identifier of the contract
    pub fn id(&self) -> i32 {
        match self {
            Contract::Vanilla => 1,
            Contract::Basket => 2,
            Contract::Barrier => 3,
        }
    }

    /// Check that the model dimensions carry everything the payoff reads
    pub fn validate_shape(
        &self,
        num_under: usize,
        num_dates: usize,
        num_cash_flows: usize,
        num_det_pricers: usize,
    ) -> SdeResult<()> {
        match self {
            Contract::Vanilla => {
                validate_dim("num_under", num_under, 1)?;
                validate_min("num_cash_flows", num_cash_flows, 1)?;
                validate_min("num_det_pricers", num_det_pricers, 1)
            }
            Contract::Basket => {
                validate_dim("num_under", num_under, 3)?;
                validate_dim("num_dates", num_dates, BASKET_DATES)?;
                validate_min("num_cash_flows", num_cash_flows, BASKET_DATES)
            }
            Contract::Barrier => {
                validate_dim("num_under", num_under, 3)?;
                validate_min("num_cash_flows", num_cash_flows, 2)
            }
        }
    }

    /// Discounted value of all cash flows along one trajectory
    pub fn discounted_payoff(&self, model: &ModelView, num_under: usize, traj: &[f64]) -> f64 {
        let disc = model.discounts;
        match self {
            Contract::Vanilla => {
                let amount = (traj[0] - VANILLA_STRIKE) * model.det_values[0];
                amount.max(0.0) * disc[0]
            }

            Contract::Basket => {
                let dates = traj.chunks_exact(num_under);
                for (d, xs) in dates.take(BASKET_DATES - 1).enumerate() {
                    if worst_performance(xs) >= 1.0 {
                        return (1150.0 + 150.0 * d as f64) * disc[d];
                    }
                }

                let last = BASKET_DATES - 1;
                let m = worst_performance(&traj[last * num_under..(last + 1) * num_under]);
                let amount = if m >= 1.0 {
                    1750.0
                } else if m > 0.75 {
                    1000.0
                } else {
                    1000.0 * m
                };
                amount * disc[last]
            }

            Contract::Barrier => {
                let coupon = 100.0 * disc[0];

                let touched = traj
                    .chunks_exact(num_under)
                    .any(|xs| xs.iter().zip(&BARRIERS).any(|(x, b)| x <= b));
                let last = &traj[traj.len() - num_under..];
                let below_strike = last.iter().zip(&BASKET_STRIKES).any(|(x, k)| x < k);

                let redemption = if touched && below_strike {
                    1000.0 * worst_performance(last)
                } else {
                    1000.0
                };
                coupon + redemption * disc[1]
            }
        }
    }
}

/// Smallest ratio of index level to its strike
fn worst_performance(xs: &[f64]) -> f64 {
    xs.iter()
        .zip(&BASKET_STRIKES)
        .map(|(x, k)| x / k)
        .fold(f64::INFINITY, f64::min)
}

/// Add the discounted payoff of `traj` to the running estimator `vhat`
pub fn aggregate_discounted_payoff(
    contract: Contract,
    model: &ModelView,
    num_under: usize,
    traj: &[f64],
    vhat: &mut f64,
) {
    *vhat += contract.discounted_payoff(model, num_under, traj);
}
