// src/mc/mc_engine.rs
use crate::brownian_bridge::BridgeArrays;
use crate::config::{BridgeBuffer, KernelOptions, LoopScalars, MAX_WORKERS};
use crate::error::{validation::*, SdeError, SdeResult};
use crate::math_utils::padded_len;
use crate::mc::payoffs::aggregate_discounted_payoff;
use crate::mc::scheduler::ChunkScheduler;
use crate::models::lognormal::LogNormalPath;
use crate::models::ModelArrays;
use crate::rng::{self, SobolArrays};
use std::ops::Range;
use tracing::{debug, info, warn};

const LINE_WIDTH: usize = 8;

/// One cache line of running sums
#[repr(align(64))]
#[derive(Debug, Clone, Copy, Default)]
struct CacheLine([f64; LINE_WIDTH]);

/// Per-model running sums of one worker, padded to whole cache lines so two
/// workers' accumulators never share a line.
#[derive(Debug, Clone)]
pub struct Accumulator {
    lines: Vec<CacheLine>,
    len: usize,
}

impl Accumulator {
    pub fn new(num_models: usize) -> Self {
        Accumulator {
            lines: vec![CacheLine::default(); num_models.div_ceil(LINE_WIDTH)],
            len: num_models,
        }
    }

    pub fn reset(&mut self) {
        self.lines.fill(CacheLine::default());
    }

    pub fn get(&self, m: usize) -> f64 {
        self.lines[m / LINE_WIDTH].0[m % LINE_WIDTH]
    }

    pub fn slot(&mut self, m: usize) -> &mut f64 {
        &mut self.lines[m / LINE_WIDTH].0[m % LINE_WIDTH]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len).map(|m| self.get(m)).collect()
    }
}

/// Scratch space owned by exactly one worker for the whole run.
///
/// Aligned to a cache line: the iteration counter is written on every index
/// and must not share a line with a neighbouring worker's buffer headers.
#[repr(align(64))]
#[derive(Debug)]
pub struct WorkerScratch {
    sobol: Vec<u32>,
    gauss: Vec<f64>,
    bridged: Vec<f64>,
    traj: Vec<f64>,
    acc: Accumulator,
    stats: WorkerStats,
}

impl WorkerScratch {
    pub fn new(sobol_dim: usize, num_models: usize) -> Self {
        WorkerScratch {
            sobol: padded_buffer(sobol_dim, 0),
            gauss: padded_buffer(sobol_dim, 0.0),
            bridged: padded_buffer(sobol_dim, 0.0),
            traj: padded_buffer(sobol_dim, 0.0),
            acc: Accumulator::new(num_models),
            stats: WorkerStats::default(),
        }
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.acc
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }
}

fn padded_buffer<T: Clone>(len: usize, fill: T) -> Vec<T> {
    let mut v = Vec::with_capacity(padded_len(len));
    v.resize(len, fill);
    v
}

/// What one worker did during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub chunks: usize,
    pub iterations: usize,
}

/// Prices plus per-worker diagnostics
#[derive(Debug, Clone)]
pub struct KernelRun {
    pub prices: Vec<f64>,
    pub workers: Vec<WorkerStats>,
}

/// Read-only inputs shared by every worker
#[derive(Clone, Copy)]
pub struct KernelInputs<'a> {
    pub scals: &'a LoopScalars,
    pub sobol: &'a SobolArrays,
    pub models: &'a ModelArrays,
    pub bridge: &'a BridgeArrays,
    pub options: KernelOptions,
}

impl KernelInputs<'_> {
    /// Cross-check the array bundles against the loop scalars
    pub fn validate(&self) -> SdeResult<()> {
        let scals = self.scals;
        validate_dim("sobol_dim", self.sobol.dim(), scals.sobol_dim())?;
        validate_dim("sobol_bits", self.sobol.bits() as usize, scals.sobol_bits() as usize)?;
        validate_dim("sobol_fix_ind", self.sobol.chunk(), scals.chunk())?;
        validate_dim("bb_num_dates", self.bridge.num_dates(), scals.num_dates())?;
        validate_dim("num_models", self.models.num_models(), scals.num_models())?;
        validate_dim("num_dates", self.models.num_dates(), scals.num_dates())?;
        validate_dim("num_under", self.models.num_under(), scals.num_under())?;
        validate_dim("num_cash_flows", self.models.num_cash_flows(), scals.num_cash_flows())?;
        validate_dim("num_det_pricers", self.models.num_det_pricers(), scals.num_det_pricers())
    }
}

/// Monte Carlo prices of the contract under every model
///
/// # Algorithm
///
/// For every iteration `k` in `[0, num_mcits)`:
/// 1. Sobol vector for index `k` (independent or recurrent formula)
/// 2. Inverse-normal transform to standard normals `[date][asset]`
/// 3. Brownian bridge along the dates, per asset
/// 4. Per model: log-normal trajectory and discounted payoff
///
/// Iterations are claimed in chunks by `workers` threads; each worker sums
/// payoffs per model, and the sums are combined and divided by `num_mcits`.
///
/// # Errors
///
/// Returns `SdeError` for:
/// - Inconsistent input shapes or an invalid worker count
/// - Overflow in the path recursion (the whole run is discarded)
pub fn price(
    workers: usize,
    scals: &LoopScalars,
    sobol: &SobolArrays,
    models: &ModelArrays,
    bridge: &BridgeArrays,
    options: &KernelOptions,
) -> SdeResult<Vec<f64>> {
    price_with_stats(workers, scals, sobol, models, bridge, options).map(|run| run.prices)
}

/// Like [`price`], also reporting how the work was spread over the workers
pub fn price_with_stats(
    workers: usize,
    scals: &LoopScalars,
    sobol: &SobolArrays,
    models: &ModelArrays,
    bridge: &BridgeArrays,
    options: &KernelOptions,
) -> SdeResult<KernelRun> {
    if workers == 0 || workers > MAX_WORKERS {
        return Err(SdeError::SchedulingError {
            reason: format!("worker count {} not in [1, {}]", workers, MAX_WORKERS),
        });
    }

    let inputs = KernelInputs {
        scals,
        sobol,
        models,
        bridge,
        options: *options,
    };
    inputs.validate()?;

    info!(
        contract = scals.contract().id(),
        num_mcits = scals.num_mcits(),
        num_dates = scals.num_dates(),
        num_under = scals.num_under(),
        num_models = scals.num_models(),
        chunk = scals.chunk(),
        workers,
        sobol = ?options.sobol,
        bridge_buffer = ?options.bridge_buffer,
        "starting pricing kernel"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("qmc-worker-{}", i))
        .build()
        .map_err(|e| SdeError::SchedulingError {
            reason: format!("failed to start worker pool: {}", e),
        })?;

    let sched = ChunkScheduler::new(scals.num_mcits(), scals.chunk());
    let mut scratches: Vec<WorkerScratch> = (0..workers)
        .map(|_| WorkerScratch::new(scals.sobol_dim(), scals.num_models()))
        .collect();
    let mut outcomes: Vec<SdeResult<()>> = (0..workers).map(|_| Ok(())).collect();

    {
        let inputs = &inputs;
        let sched = &sched;
        pool.scope(|s| {
            for (worker, (scratch, outcome)) in
                scratches.iter_mut().zip(outcomes.iter_mut()).enumerate()
            {
                s.spawn(move |_| *outcome = run_worker(worker, inputs, sched, scratch));
            }
        });
    }

    outcomes.into_iter().collect::<SdeResult<Vec<()>>>()?;

    let visited: usize = scratches.iter().map(|s| s.stats.iterations).sum();
    if visited != scals.num_mcits() {
        return Err(SdeError::SchedulingError {
            reason: format!(
                "workers processed {} iterations, expected {}",
                visited,
                scals.num_mcits()
            ),
        });
    }

    let partials: Vec<Vec<f64>> = scratches.iter().map(|s| s.acc.to_vec()).collect();
    let prices = reduce_partials(&partials, scals.num_mcits());

    if let Some(m) = prices.iter().position(|p| !p.is_finite()) {
        return Err(SdeError::NumericalInstability {
            method: "Monte Carlo".to_string(),
            reason: format!("price of model {} is not finite: {}", m, prices[m]),
        });
    }

    info!(prices = ?prices, "pricing kernel finished");

    Ok(KernelRun {
        prices,
        workers: scratches.iter().map(|s| s.stats).collect(),
    })
}

/// Claim chunks until the iteration range is exhausted
fn run_worker(
    worker: usize,
    inputs: &KernelInputs,
    sched: &ChunkScheduler,
    scratch: &mut WorkerScratch,
) -> SdeResult<()> {
    scratch.acc.reset();
    scratch.stats = WorkerStats::default();

    while let Some(range) = sched.claim() {
        scratch.stats.chunks += 1;
        for k in range.clone() {
            if let Err(e) = process_index(inputs, k, &range, scratch) {
                sched.abort();
                warn!(worker, index = k, error = %e, "aborting pricing run");
                return Err(e);
            }
        }
    }

    debug!(
        worker,
        chunks = scratch.stats.chunks,
        iterations = scratch.stats.iterations,
        "worker done"
    );
    Ok(())
}

/// Run Monte Carlo iteration `k`, the `k - chunk.start`-th of its chunk, and
/// add its payoffs to the worker's accumulator.
///
/// Unless `k` is the chunk head, `scratch` must hold the Sobol vector of
/// iteration `k - 1`.
pub fn process_index(
    inputs: &KernelInputs,
    k: usize,
    chunk: &Range<usize>,
    scratch: &mut WorkerScratch,
) -> SdeResult<()> {
    let scals = inputs.scals;
    let num_under = scals.num_under();

    inputs
        .sobol
        .next_vector(inputs.options.sobol, k, chunk, &mut scratch.sobol);
    rng::to_gaussian(scals.sob_norm_fact(), &scratch.sobol, &mut scratch.gauss);
    inputs.bridge.apply(num_under, &scratch.gauss, &mut scratch.bridged);

    let traj: &mut [f64] = match inputs.options.bridge_buffer {
        BridgeBuffer::Separate => &mut scratch.traj[..],
        BridgeBuffer::ReuseGaussian => &mut scratch.gauss[..],
    };

    for m in 0..scals.num_models() {
        let model = inputs.models.model(m);
        LogNormalPath::new(model, scals.num_dates(), num_under).simulate(&scratch.bridged, traj)?;
        aggregate_discounted_payoff(
            scals.contract(),
            &model,
            num_under,
            traj,
            scratch.acc.slot(m),
        );
    }

    scratch.stats.iterations += 1;
    Ok(())
}

/// Sum per-model partial sums over workers and average over `num_mcits`
pub fn reduce_partials(partials: &[Vec<f64>], num_mcits: usize) -> Vec<f64> {
    let num_models = partials.first().map_or(0, |p| p.len());
    (0..num_models)
        .map(|m| partials.iter().map(|p| p[m]).sum::<f64>() / num_mcits as f64)
        .collect()
}
