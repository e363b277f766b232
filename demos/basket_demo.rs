// demos/basket_demo.rs
//
// Prices the three built-in contracts under a pair of log-normal models.
// Run with `RUST_LOG=fast_qmc=debug` to see per-worker scheduling.
use fast_qmc::brownian_bridge::BridgeArrays;
use fast_qmc::config::{default_workers, KernelOptions, LoopScalars, ScalarParams};
use fast_qmc::mc::mc_engine::price_with_stats;
use fast_qmc::models::{ModelArrays, ModelShape};
use fast_qmc::rng::SobolArrays;
use fast_qmc::SdeResult;
use tracing_subscriber::EnvFilter;

/// Underlyings of the basket and barrier contracts
const STARTS: [f64; 3] = [3758.05, 11840.0, 1200.0];
const SIGMAS: [f64; 3] = [0.19, 0.21, 0.28];
const RATE: f64 = 0.02;

/// Cholesky factor of a correlation matrix with 0.6/0.4/0.3 off-diagonals
fn correlation_factor() -> Vec<f64> {
    let (r01, r02, r12) = (0.6f64, 0.4f64, 0.3f64);
    let l10 = r01;
    let l11 = (1.0 - l10 * l10).sqrt();
    let l20 = r02;
    let l21 = (r12 - l20 * l10) / l11;
    let l22 = (1.0 - l20 * l20 - l21 * l21).sqrt();
    vec![1.0, 0.0, 0.0, l10, l11, 0.0, l20, l21, l22]
}

/// Two models differing by a volatility bump, observed at `times`
fn build_models(num_under: usize, times: &[f64], num_cash_flows: usize) -> SdeResult<ModelArrays> {
    let num_models = 2;
    let num_dates = times.len();
    let shape = ModelShape {
        num_models,
        num_dates,
        num_under,
    };

    let mut c = Vec::new();
    let mut vols = Vec::new();
    let mut drifts = Vec::new();
    let mut starts = Vec::new();
    let mut discounts = Vec::new();
    for m in 0..num_models {
        let bump = 1.0 + 0.15 * m as f64;
        if num_under == 1 {
            c.push(1.0);
        } else {
            c.extend(correlation_factor());
        }
        let mut prev = 0.0;
        for &t in times {
            let dt = t - prev;
            prev = t;
            for &sigma in &SIGMAS[..num_under] {
                let s = sigma * bump;
                vols.push(s);
                drifts.push((RATE - 0.5 * s * s) * dt);
            }
        }
        starts.extend_from_slice(&STARTS[..num_under]);
        discounts.extend((0..num_cash_flows).map(|i| {
            let t = times[(i + 1) * num_dates / num_cash_flows - 1];
            (-RATE * t).exp()
        }));
    }

    ModelArrays::pack(shape, &c, &vols, &drifts, &starts, &discounts, &[1.0, 1.0])
}

fn run_contract(
    name: &str,
    contract: i32,
    num_under: usize,
    times: &[f64],
    num_cash_flows: usize,
) -> SdeResult<()> {
    let models = build_models(num_under, times, num_cash_flows)?;
    let params = ScalarParams {
        contract,
        num_mcits: 1 << 18,
        num_dates: times.len(),
        num_under,
        num_models: models.num_models(),
        sobol_bits: 30,
        chunk: 64,
    };
    let scals = LoopScalars::new(&params, &models)?;
    let sobol = SobolArrays::joe_kuo(scals.sobol_dim(), params.sobol_bits, params.chunk)?;
    // volatilities above are per unit time, so the bridge carries the date spacing
    let bridge = BridgeArrays::standard(times)?;

    let run = price_with_stats(
        default_workers(),
        &scals,
        &sobol,
        &models,
        &bridge,
        &KernelOptions::default(),
    )?;

    println!("{} ({} iterations, {} workers)", name, params.num_mcits, run.workers.len());
    for (m, p) in run.prices.iter().enumerate() {
        println!("  model {}: {:.4}", m, p);
    }
    for (w, stats) in run.workers.iter().enumerate() {
        println!(
            "  worker {:>2}: {:>5} chunks, {:>7} iterations",
            w, stats.chunks, stats.iterations
        );
    }
    println!();
    Ok(())
}

fn main() -> SdeResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Running fast-qmc pricing demo\n");

    run_contract("Vanilla call", 1, 1, &[1.0], 1)?;
    run_contract(
        "Basket autocallable",
        2,
        3,
        &[1.0 / 3.0, 2.0 / 3.0, 1.0, 4.0 / 3.0, 5.0 / 3.0],
        5,
    )?;
    run_contract("Barrier reverse convertible", 3, 3, &[0.2, 0.4, 0.6, 0.8, 1.0], 2)?;

    Ok(())
}
