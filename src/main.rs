//! Benchmark runner for the transpose and symmetry kernels.
//!
//! Sweeps matrix sizes (powers of two), block sizes and worker counts,
//! runs every kernel a few times and averages its timed window.
//!
//! ```bash
//! mattrans --min-dim 64 --max-dim 2048 --threads 1,2,4,8 --processes 1,4 --runs 5
//! mattrans --csv results.csv -vv
//! mpirun -np 4 mattrans --mpi --max-dim 4096   # built with --features mpi
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mattrans::distributed::{self, ROOT};
use mattrans::{
    Communicator, DistributedKernel, Error, KernelConfig, LocalGroup, Matrix, SharedKernel,
    SymmetryKernel, sequential,
};

#[derive(Parser, Debug)]
#[command(name = "mattrans")]
#[command(about = "Benchmark matrix transpose and symmetry kernels")]
#[command(version)]
struct Args {
    /// Smallest matrix dimension (rounded up to a power of two)
    #[arg(long, default_value_t = 16)]
    min_dim: usize,

    /// Largest matrix dimension
    #[arg(long, default_value_t = 1024)]
    max_dim: usize,

    /// Smallest tile edge for the blocked kernels
    #[arg(long, default_value_t = 4)]
    min_block: usize,

    /// Largest tile edge for the blocked kernels
    #[arg(long, default_value_t = 64)]
    max_block: usize,

    /// Thread counts for the shared-memory kernels
    #[arg(long, value_delimiter = ',', default_value = "1,2,4,8")]
    threads: Vec<usize>,

    /// Rank counts for the distributed kernels
    #[arg(long, value_delimiter = ',', default_value = "1,4")]
    processes: Vec<usize>,

    /// Timed runs per configuration (after one warmup)
    #[arg(long, default_value_t = 5, env = "MATTRANS_RUNS")]
    runs: u32,

    /// Seed for the random input matrices
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Append one row per configuration to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// More output: -v phase summaries, -vv per-rank tracing
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run only the distributed kernels, on the MPI world (start under mpirun)
    #[cfg(feature = "mpi")]
    #[arg(long)]
    mpi: bool,
}

/// One averaged measurement.
struct Sample {
    n: usize,
    kernel: String,
    block: Option<usize>,
    workers: usize,
    avg: Duration,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    ensure!(args.min_dim >= 1 && args.min_dim <= args.max_dim, "empty dimension range");
    ensure!(args.min_block >= 1 && args.min_block <= args.max_block, "empty block range");
    ensure!(args.runs >= 1, "--runs must be at least 1");

    #[cfg(feature = "mpi")]
    if args.mpi {
        return bench_mpi(&args);
    }

    println!("=== Matrix Transpose Benchmark ===\n");

    let mut samples = Vec::new();
    for n in powers_of_two(args.min_dim, args.max_dim) {
        println!("Matrix: {n}×{n}");
        println!("{}", "-".repeat(60));

        let m = Matrix::random_parallel(n, args.seed);
        let sym = Matrix::random_symmetric(n, args.seed);
        let expected = sequential::transpose(&m).context("reference transpose")?;

        let start = samples.len();
        bench_shared(&args, &m, &expected, &mut samples)?;
        bench_symmetry(&args, &sym, &mut samples)?;
        bench_distributed(&args, &m, &expected, &mut samples)?;
        print_size_results(&samples[start..]);
    }

    print_summary_table(&samples);
    if let Some(path) = &args.csv {
        write_csv(path, &samples).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), rows = samples.len(), "csv written");
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

fn powers_of_two(min: usize, max: usize) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(min.next_power_of_two()), |&x| x.checked_mul(2))
        .take_while(move |&x| x <= max)
}

/// Errors that mean "this kernel doesn't take this shape", not a failure.
fn is_unsupported(err: &Error) -> bool {
    matches!(
        err,
        Error::Decomposition { .. }
            | Error::GridNotSquare { .. }
            | Error::GridIndivisible { .. }
            | Error::NotPowerOfTwo { .. }
    )
}

fn bench_shared(
    args: &Args,
    m: &Matrix,
    expected: &Matrix,
    samples: &mut Vec<Sample>,
) -> Result<()> {
    let n = m.dim();
    for kernel in SharedKernel::ALL {
        let blocks: Vec<Option<usize>> = if kernel.uses_block_size() {
            powers_of_two(args.min_block, args.max_block.min(n))
                .map(Some)
                .collect()
        } else {
            vec![None]
        };
        let threads = if kernel.is_threaded() {
            args.threads.clone()
        } else {
            vec![1]
        };

        for &block in &blocks {
            for &t in &threads {
                let cfg = KernelConfig::new(t, block.unwrap_or(1)).with_verbosity(args.verbose);
                let mut total = Duration::ZERO;
                let mut skipped = false;
                // run 0 is the warmup
                for run in 0..=args.runs {
                    match kernel.transpose(m, &cfg) {
                        Ok(res) => {
                            if res.value != *expected {
                                bail!(
                                    "{kernel} (block {block:?}, {t} threads) disagrees \
                                     with the sequential transpose at n={n}"
                                );
                            }
                            if run > 0 {
                                total += res.elapsed;
                            }
                        }
                        Err(err) if is_unsupported(&err) => {
                            warn!(%kernel, n, %err, "skipping configuration");
                            skipped = true;
                            break;
                        }
                        Err(err) => return Err(err).context(format!("{kernel} at n={n}")),
                    }
                }
                if !skipped {
                    samples.push(Sample {
                        n,
                        kernel: kernel.to_string(),
                        block,
                        workers: t,
                        avg: total / args.runs,
                    });
                }
            }
        }
    }
    Ok(())
}

fn bench_symmetry(args: &Args, sym: &Matrix, samples: &mut Vec<Sample>) -> Result<()> {
    let n = sym.dim();
    for kernel in SymmetryKernel::ALL {
        let threads = match kernel {
            SymmetryKernel::Sequential => vec![1],
            SymmetryKernel::Cooperative => args.threads.clone(),
        };
        for t in threads {
            let cfg = KernelConfig::new(t, 1).with_verbosity(args.verbose);
            let mut total = Duration::ZERO;
            for run in 0..=args.runs {
                let res = kernel.is_symmetric(sym, &cfg)?;
                ensure!(res.value, "{kernel} missed a symmetric matrix at n={n}");
                if run > 0 {
                    total += res.elapsed;
                }
            }
            samples.push(Sample {
                n,
                kernel: kernel.to_string(),
                block: None,
                workers: t,
                avg: total / args.runs,
            });
        }
    }
    Ok(())
}

fn bench_distributed(
    args: &Args,
    m: &Matrix,
    expected: &Matrix,
    samples: &mut Vec<Sample>,
) -> Result<()> {
    let n = m.dim();
    let cfg = KernelConfig::default().with_verbosity(args.verbose);
    for &p in &args.processes {
        for kernel in DistributedKernel::ALL {
            let mut total = Duration::ZERO;
            let mut skipped = false;
            for run in 0..=args.runs {
                let mut per_rank = LocalGroup::run(p, |comm| {
                    let input = (comm.rank() == ROOT).then_some(m);
                    kernel.transpose(comm, input, n, &cfg)
                })
                .with_context(|| format!("{kernel} with {p} ranks at n={n}"))?;
                // every rank reports the same decomposition error
                match per_rank.swap_remove(ROOT) {
                    Ok(res) => {
                        ensure!(
                            res.value.as_ref() == Some(expected),
                            "{kernel} with {p} ranks disagrees with the sequential \
                             transpose at n={n}"
                        );
                        if run > 0 {
                            total += res.elapsed;
                        }
                    }
                    Err(err) if is_unsupported(&err) => {
                        warn!(%kernel, n, ranks = p, %err, "skipping configuration");
                        skipped = true;
                        break;
                    }
                    Err(err) => return Err(err).context(format!("{kernel} at n={n}")),
                }
            }
            if !skipped {
                samples.push(Sample {
                    n,
                    kernel: kernel.to_string(),
                    block: None,
                    workers: p,
                    avg: total / args.runs,
                });
            }
        }

        let sym = sequential::is_symmetric(m);
        let verdicts = LocalGroup::run(p, |comm| {
            let input = (comm.rank() == ROOT).then_some(m);
            distributed::is_symmetric(comm, input, n, &cfg)
        })?;
        match verdicts.into_iter().next() {
            Some(Ok(res)) => {
                ensure!(res.value == sym, "distributed symmetry check wrong at n={n}");
                debug!(n, ranks = p, elapsed = ?res.elapsed, "distributed symmetry check");
                samples.push(Sample {
                    n,
                    kernel: "sym-row-block".to_string(),
                    block: None,
                    workers: p,
                    avg: res.elapsed,
                });
            }
            Some(Err(err)) if is_unsupported(&err) => {
                warn!(n, ranks = p, %err, "skipping distributed symmetry check");
            }
            Some(Err(err)) => return Err(err.into()),
            None => {}
        }
    }
    Ok(())
}

/// Distributed kernels with one process per rank. Rank 0 holds the input
/// and does the reporting.
#[cfg(feature = "mpi")]
fn bench_mpi(args: &Args) -> Result<()> {
    let universe = mpi::initialize().context("MPI was already initialized")?;
    let world = universe.world();
    let (rank, size) = (world.rank(), world.size());
    let cfg = KernelConfig::default().with_verbosity(args.verbose);
    info!(rank, size, "MPI world up");

    let mut samples = Vec::new();
    for n in powers_of_two(args.min_dim, args.max_dim) {
        let m = (rank == ROOT).then(|| Matrix::random_parallel(n, args.seed));
        let expected = m.as_ref().map(sequential::transpose).transpose()?;
        for kernel in DistributedKernel::ALL {
            let mut total = Duration::ZERO;
            let mut skipped = false;
            for run in 0..=args.runs {
                match kernel.transpose(&world, m.as_ref(), n, &cfg) {
                    Ok(res) => {
                        if let Some(expected) = &expected {
                            ensure!(
                                res.value.as_ref() == Some(expected),
                                "{kernel} on {size} MPI ranks disagrees with the sequential \
                                 transpose at n={n}"
                            );
                        }
                        if run > 0 {
                            total += res.elapsed;
                        }
                    }
                    Err(err) if is_unsupported(&err) => {
                        if rank == ROOT {
                            warn!(%kernel, n, ranks = size, %err, "skipping configuration");
                        }
                        skipped = true;
                        break;
                    }
                    Err(err) => return Err(err).context(format!("{kernel} at n={n}")),
                }
            }
            if !skipped {
                samples.push(Sample {
                    n,
                    kernel: kernel.to_string(),
                    block: None,
                    workers: size,
                    avg: total / args.runs,
                });
            }
        }
    }

    if rank == ROOT {
        print_summary_table(&samples);
        if let Some(path) = &args.csv {
            write_csv(path, &samples).with_context(|| format!("writing {}", path.display()))?;
        }
    }
    Ok(())
}

fn print_size_results(samples: &[Sample]) {
    let baseline = samples
        .iter()
        .find(|s| s.kernel == SharedKernel::Sequential.name())
        .map(|s| s.avg.as_secs_f64());
    for (i, s) in samples.iter().enumerate() {
        let ms = s.avg.as_secs_f64() * 1000.0;
        let speedup = baseline
            .filter(|_| s.avg > Duration::ZERO)
            .map(|b| b / s.avg.as_secs_f64());
        println!(
            "{:3}. {:16} block {:>5}  workers {:>3}  {:10.4} ms  {}",
            i + 1,
            s.kernel,
            s.block.map_or("-".to_string(), |b| b.to_string()),
            s.workers,
            ms,
            speedup.map_or(String::new(), |x| format!("({x:.1}×)"))
        );
    }
    println!();
}

/// Best time per kernel and size, one column per size.
fn print_summary_table(samples: &[Sample]) {
    let mut sizes: Vec<usize> = samples.iter().map(|s| s.n).collect();
    sizes.dedup();
    let mut kernels: Vec<&str> = Vec::new();
    for s in samples {
        if !kernels.contains(&s.kernel.as_str()) {
            kernels.push(&s.kernel);
        }
    }

    let width = 18 + 14 * sizes.len();
    println!("\n{}", "=".repeat(width));
    println!("SUMMARY (best ms per kernel)");
    println!("{}", "=".repeat(width));
    print!("\n{:<18}", "Kernel");
    for n in &sizes {
        print!(" {:>13}", format!("{n}×{n}"));
    }
    println!();
    println!("{}", "-".repeat(width));

    for kernel in kernels {
        print!("{kernel:<18}");
        for &n in &sizes {
            let best = samples
                .iter()
                .filter(|s| s.n == n && s.kernel == kernel)
                .map(|s| s.avg)
                .min();
            match best {
                Some(d) => print!(" {:>10.4} ms", d.as_secs_f64() * 1000.0),
                None => print!(" {:>13}", "-"),
            }
        }
        println!();
    }
    println!("{}", "=".repeat(width));
}

fn write_csv(path: &Path, samples: &[Sample]) -> Result<()> {
    let fresh = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if fresh {
        writeln!(file, "n,kernel,block,workers,avg_seconds")?;
    }
    for s in samples {
        writeln!(
            file,
            "{},{},{},{},{:.9}",
            s.n,
            s.kernel,
            s.block.map_or(String::new(), |b| b.to_string()),
            s.workers,
            s.avg.as_secs_f64()
        )?;
    }
    Ok(())
}
