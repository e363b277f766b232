//! # fast-qmc: Parallel Quasi-Monte Carlo Option Pricing
//!
//! A Rust library pricing path-dependent, multi-asset contracts under a set
//! of log-normal market models, with Sobol quasi-random sampling and a
//! Brownian-bridge path construction.
//!
//! ## Key Features
//!
//! - **Sobol Sampling**: Gray-code Sobol vectors with an independent formula
//!   for chunk heads and a one-XOR recurrence inside chunks
//! - **Brownian Bridge**: Date correlation from a precomputed bridge table
//! - **Multi-Model Pricing**: One sample path priced under every model
//! - **Parallel Kernel**: Dynamic chunk scheduling on a fixed worker pool with
//!   cache-line padded per-worker accumulators
//!
//! ## Quick Start
//!
//! ```rust
//! use fast_qmc::brownian_bridge::BridgeArrays;
//! use fast_qmc::config::{KernelOptions, LoopScalars, ScalarParams};
//! use fast_qmc::mc::mc_engine::price;
//! use fast_qmc::models::{ModelArrays, ModelShape};
//! use fast_qmc::rng::SobolArrays;
//!
//! // One call on a single index, observed after one year
//! let shape = ModelShape { num_models: 1, num_dates: 1, num_under: 1 };
//! let sigma: f64 = 0.2;
//! let models = ModelArrays::pack(
//!     shape,
//!     &[1.0],                        // correlation factor
//!     &[sigma],                      // volatility
//!     &[0.03 - 0.5 * sigma * sigma], // drift
//!     &[4000.0],                     // start level
//!     &[(-0.03f64).exp()],           // discount factor
//!     &[1.0],                        // deterministic pricer value
//! )
//! .expect("Valid model arrays");
//!
//! let params = ScalarParams {
//!     contract: 1,
//!     num_mcits: 1 << 14,
//!     sobol_bits: 30,
//!     ..Default::default()
//! };
//! let scals = LoopScalars::new(&params, &models).expect("Valid configuration");
//! let sobol = SobolArrays::joe_kuo(1, 30, params.chunk).expect("Valid Sobol arrays");
//! let bridge = BridgeArrays::standard(&[1.0]).expect("Valid bridge");
//!
//! let prices = price(2, &scals, &sobol, &models, &bridge, &KernelOptions::default())
//!     .expect("Pricing succeeds");
//! println!("Price: {:.4}", prices[0]);
//! ```

// Module declarations
pub mod brownian_bridge;
pub mod config;
pub mod error;
pub mod math_utils;
pub mod mc;
pub mod models;
pub mod rng;

// Re-export commonly used types for convenience
pub use error::{SdeError, SdeResult};
