// scripts/benchmark.rs
//
// Times every kernel variant on the basket contract over a range of worker
// counts and writes the results to a CSV file.
use fast_qmc::brownian_bridge::BridgeArrays;
use fast_qmc::config::{
    BridgeBuffer, KernelOptions, LoopScalars, ScalarParams, SobolStrategy,
};
use fast_qmc::mc::mc_engine::price;
use fast_qmc::models::{ModelArrays, ModelShape};
use fast_qmc::rng::SobolArrays;
use fast_qmc::SdeResult;
use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::time::Instant;

const NUM_MODELS: usize = 8;
const NUM_DATES: usize = 5;

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_cores: usize,
    rustc_flags: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_cores: num_cpus::get(),
            rustc_flags: env::var("RUSTFLAGS").unwrap_or_else(|_| "default".to_string()),
            rayon_threads: rayon::current_num_threads(),
        }
    }
}

#[derive(Debug)]
struct BenchmarkResult {
    variant: String,
    workers: usize,
    iterations: usize,
    time_ms: f64,
    throughput_its_per_sec: f64,
    price: f64,
}

/// Basket models with slightly different volatility levels
fn build_models() -> SdeResult<ModelArrays> {
    let shape = ModelShape {
        num_models: NUM_MODELS,
        num_dates: NUM_DATES,
        num_under: 3,
    };
    let c = [
        1.0,
        0.0,
        0.0,
        0.5,
        0.75f64.sqrt(),
        0.0,
        0.5,
        0.5 / 3.0f64.sqrt(),
        (2.0f64 / 3.0).sqrt(),
    ];
    let dt = 1.0 / NUM_DATES as f64;

    let mut cs = Vec::new();
    let mut vols = Vec::new();
    let mut drifts = Vec::new();
    let mut starts = Vec::new();
    let mut discounts = Vec::new();
    for m in 0..NUM_MODELS {
        let level = 0.15 + 0.02 * m as f64;
        cs.extend_from_slice(&c);
        for _ in 0..NUM_DATES * 3 {
            vols.push(level);
            drifts.push((0.02 - 0.5 * level * level) * dt);
        }
        starts.extend_from_slice(&[3758.05, 11840.0, 1200.0]);
        discounts.extend((1..=NUM_DATES).map(|i| (-0.02 * i as f64 * dt).exp()));
    }

    ModelArrays::pack(shape, &cs, &vols, &drifts, &starts, &discounts, &[1.0; NUM_MODELS])
}

fn variants() -> Vec<KernelOptions> {
    let mut out = Vec::new();
    for sobol in [
        SobolStrategy::Independent,
        SobolStrategy::Recurrent,
        SobolStrategy::RecurrentFixIndex,
    ] {
        for bridge_buffer in [BridgeBuffer::Separate, BridgeBuffer::ReuseGaussian] {
            out.push(KernelOptions {
                sobol,
                bridge_buffer,
            });
        }
    }
    out
}

fn run_benchmarks(iterations: usize) -> SdeResult<Vec<BenchmarkResult>> {
    let models = build_models()?;
    let params = ScalarParams {
        contract: 2,
        num_mcits: iterations,
        num_dates: NUM_DATES,
        num_under: 3,
        num_models: NUM_MODELS,
        sobol_bits: 30,
        chunk: 64,
    };
    let scals = LoopScalars::new(&params, &models)?;
    let sobol = SobolArrays::joe_kuo(scals.sobol_dim(), params.sobol_bits, params.chunk)?;
    let times: Vec<f64> = (1..=NUM_DATES).map(|i| i as f64 / NUM_DATES as f64).collect();
    let bridge = BridgeArrays::standard(&times)?;

    let mut worker_counts = vec![1];
    while worker_counts[worker_counts.len() - 1] * 2 <= num_cpus::get() {
        worker_counts.push(worker_counts[worker_counts.len() - 1] * 2);
    }

    let mut results = Vec::new();
    for options in variants() {
        let variant = format!("{:?}/{:?}", options.sobol, options.bridge_buffer);
        for &workers in &worker_counts {
            println!("Running {} with {} workers...", variant, workers);

            let start = Instant::now();
            let prices = price(workers, &scals, &sobol, &models, &bridge, &options)?;
            let time_ms = start.elapsed().as_secs_f64() * 1000.0;

            results.push(BenchmarkResult {
                variant: variant.clone(),
                workers,
                iterations,
                time_ms,
                throughput_its_per_sec: iterations as f64 / (time_ms / 1000.0),
                price: prices[0],
            });
        }
    }

    Ok(results)
}

fn write_results_to_csv(
    results: &[BenchmarkResult],
    system_info: &SystemInfo,
    filename: &str,
) -> io::Result<()> {
    let mut file = File::create(filename)?;

    writeln!(file, "# OS: {}", system_info.os)?;
    writeln!(file, "# CPU Cores: {}", system_info.cpu_cores)?;
    writeln!(file, "# RUSTFLAGS: {}", system_info.rustc_flags)?;
    writeln!(file, "# Models: {}, Dates: {}", NUM_MODELS, NUM_DATES)?;
    writeln!(file, "Variant,Workers,Iterations,Time_ms,Throughput_its_per_sec,Price")?;

    for r in results {
        writeln!(
            file,
            "{},{},{},{:.2},{:.0},{:.6}",
            r.variant, r.workers, r.iterations, r.time_ms, r.throughput_its_per_sec, r.price
        )?;
    }

    println!("Results written to {}", filename);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("fast-qmc Kernel Benchmark");
    println!("=========================\n");

    let iterations = env::args()
        .nth(1)
        .map(|s| s.parse::<usize>())
        .transpose()?
        .unwrap_or(1 << 20);

    let system_info = SystemInfo::gather();
    println!("System Information:");
    println!("  OS: {}", system_info.os);
    println!("  CPU Cores: {}", system_info.cpu_cores);
    println!("  RUSTFLAGS: {}", system_info.rustc_flags);
    println!("  Rayon Threads: {}", system_info.rayon_threads);
    println!();

    let results = run_benchmarks(iterations)?;

    println!("\n{:=<80}", "");
    println!(
        "{:<36} {:>8} {:>12} {:>15} {:>10}",
        "Variant", "Workers", "Time (ms)", "Throughput", "Price"
    );
    println!("{:-<80}", "");
    for r in &results {
        println!(
            "{:<36} {:>8} {:>12.2} {:>15.0} {:>10.4}",
            r.variant, r.workers, r.time_ms, r.throughput_its_per_sec, r.price
        );
    }
    println!("{:=<80}", "");

    write_results_to_csv(&results, &system_info, "benchmark_results.csv")?;

    println!("\nTo reproduce: cargo run --bin benchmark --release -- {}", iterations);
    Ok(())
}
