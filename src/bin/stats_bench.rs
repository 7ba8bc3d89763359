//! stats-bench: time the densification statistics update on synthetic data
//!
//! Usage:
//!   stats-bench --points 1000000 --iters 5 --filter-ratio 0.5 --seed 0
//!   stats-bench --points 1000000 --gpu        (requires --features gpu)
//!
//! Set SPLAT_STATS_BLOCK_SIZE to change the CPU block size.

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use splat_stats::{DensificationStats, FrameStats, ScopedTimer, StatsConfig, ViewspaceGrads};

struct BenchArgs {
    points: usize,
    iters: usize,
    filter_ratio: f64,
    seed: u64,
    gpu: bool,
}

/// One synthetic frame: filter, radii and `[gx, gy, pad, pad]` gradient rows.
struct SyntheticFrame {
    filter: Vec<bool>,
    radii: Vec<f32>,
    grads: Vec<f32>,
}

impl SyntheticFrame {
    const GRAD_STRIDE: usize = 4;

    fn generate(rng: &mut StdRng, points: usize, filter_ratio: f64) -> Self {
        let filter = (0..points).map(|_| rng.gen_bool(filter_ratio)).collect();
        let radii = (0..points).map(|_| rng.gen_range(0.0..64.0f32).floor()).collect();
        let grads = (0..points * Self::GRAD_STRIDE)
            .map(|_| rng.gen_range(-1.0e-3..1.0e-3f32))
            .collect();
        Self {
            filter,
            radii,
            grads,
        }
    }

    fn as_frame(&self) -> FrameStats<'_> {
        FrameStats {
            update_filter: &self.filter,
            radii: &self.radii,
            grads: ViewspaceGrads::new(&self.grads, Self::GRAD_STRIDE),
        }
    }
}

fn parse_args() -> anyhow::Result<BenchArgs> {
    let mut args = std::env::args().skip(1);
    let mut bench = BenchArgs {
        points: 1_000_000,
        iters: 5,
        filter_ratio: 0.5,
        seed: 0,
        gpu: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--points" => {
                bench.points = args
                    .next()
                    .context("Missing --points argument")?
                    .parse()
                    .context("Invalid point count")?;
            }
            "--iters" => {
                bench.iters = args
                    .next()
                    .context("Missing --iters argument")?
                    .parse()
                    .context("Invalid iteration count")?;
            }
            "--filter-ratio" => {
                bench.filter_ratio = args
                    .next()
                    .context("Missing --filter-ratio argument")?
                    .parse()
                    .context("Invalid filter ratio")?;
                if !(0.0..=1.0).contains(&bench.filter_ratio) {
                    bail!("--filter-ratio must be in [0, 1]");
                }
            }
            "--seed" => {
                bench.seed = args
                    .next()
                    .context("Missing --seed argument")?
                    .parse()
                    .context("Invalid seed")?;
            }
            "--gpu" => bench.gpu = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                print_help();
                bail!("Unknown argument: {other}");
            }
        }
    }

    Ok(bench)
}

fn print_help() {
    println!("Usage: stats-bench [--points N] [--iters K] [--filter-ratio F] [--seed S] [--gpu]");
}

fn run_cpu(bench: &BenchArgs, frame: &SyntheticFrame) -> anyhow::Result<DensificationStats> {
    let cfg = StatsConfig::from_env();
    println!("\n=== CPU update (block size {}) ===", cfg.block_size);

    let mut stats = DensificationStats::new(bench.points);
    let mut times = Vec::with_capacity(bench.iters);
    for i in 0..bench.iters {
        let timer = ScopedTimer::start(Some(&format!("cpu iter {}", i + 1)), true);
        stats.update(&frame.as_frame(), &cfg)?;
        if let Some(ms) = timer.finish() {
            println!("  Iteration {}: {:.3} ms", i + 1, ms);
            times.push(ms);
        }
    }
    print_summary(&times);
    Ok(stats)
}

#[cfg(feature = "gpu")]
fn run_gpu(bench: &BenchArgs, frame: &SyntheticFrame) -> anyhow::Result<DensificationStats> {
    use splat_stats::gpu::{GpuDensifyStats, GpuTimer};

    println!("\n=== GPU update ===");
    let gpu = GpuDensifyStats::new()?;

    let mut stats = DensificationStats::new(bench.points);
    let mut times = Vec::with_capacity(bench.iters);
    for i in 0..bench.iters {
        let timer = GpuTimer::start(gpu.context(), Some(&format!("gpu iter {}", i + 1)), true);
        gpu.update(&mut stats, &frame.as_frame())?;
        if let Some(ms) = timer.finish() {
            println!("  Iteration {}: {:.3} ms", i + 1, ms);
            times.push(ms);
        }
    }
    print_summary(&times);
    Ok(stats)
}

#[cfg(not(feature = "gpu"))]
fn run_gpu(_bench: &BenchArgs, _frame: &SyntheticFrame) -> anyhow::Result<DensificationStats> {
    bail!("GPU support not enabled. Compile with --features gpu")
}

fn print_summary(times: &[f64]) {
    if times.is_empty() {
        return;
    }
    let mean = times.iter().sum::<f64>() / times.len() as f64;
    let min = times.iter().copied().fold(f64::INFINITY, f64::min);
    println!("  mean {mean:.3} ms, min {min:.3} ms");
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("stats-bench v{}", splat_stats::VERSION);

    let bench = parse_args()?;
    println!(
        "Points: {}  iterations: {}  filter ratio: {:.2}  seed: {}",
        bench.points, bench.iters, bench.filter_ratio, bench.seed
    );

    let mut rng = StdRng::seed_from_u64(bench.seed);
    let frame = SyntheticFrame::generate(&mut rng, bench.points, bench.filter_ratio);

    let cpu_stats = run_cpu(&bench, &frame)?;

    if bench.gpu {
        let gpu_stats = run_gpu(&bench, &frame)?;

        let max_diff = cpu_stats
            .xyz_gradient_accum
            .iter()
            .zip(&gpu_stats.xyz_gradient_accum)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        let denom_match = cpu_stats.denom == gpu_stats.denom;
        println!("\nCPU vs GPU: max |accum diff| = {max_diff:.3e}, denom match = {denom_match}");
    }

    Ok(())
}
